//! Business logic services for the Restaurant Management Platform

pub mod auth;
pub mod category;
pub mod chat;
pub mod day_session;
pub mod menu;
pub mod order;
pub mod reporting;
pub mod settings;
pub mod user;

pub use auth::AuthService;
pub use category::CategoryService;
pub use chat::ChatService;
pub use day_session::DaySessionService;
pub use menu::MenuService;
pub use order::OrderService;
pub use reporting::ReportingService;
pub use settings::SettingsService;
pub use user::UserService;
