//! Shared types and models for the Restaurant Management Platform
//!
//! This crate contains types shared between the backend, the POS / KDS / admin
//! front-ends (via WASM), and other components of the system.

pub mod events;
pub mod models;
pub mod pricing;
pub mod types;
pub mod validation;

pub use events::*;
pub use models::*;
pub use pricing::*;
pub use types::*;
pub use validation::*;
