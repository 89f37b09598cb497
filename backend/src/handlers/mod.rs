//! HTTP handlers

pub mod auth;
pub mod category;
pub mod chat;
pub mod day_session;
pub mod health;
pub mod menu;
pub mod order;
pub mod settings;
pub mod user;

pub use auth::*;
pub use category::*;
pub use chat::*;
pub use day_session::*;
pub use health::*;
pub use menu::*;
pub use order::*;
pub use settings::*;
pub use user::*;
