//! Domain models for the Restaurant Management Platform

mod category;
mod chat;
mod day_session;
mod menu;
mod order;
mod settings;
mod user;

pub use category::*;
pub use chat::*;
pub use day_session::*;
pub use menu::*;
pub use order::*;
pub use settings::*;
pub use user::*;
