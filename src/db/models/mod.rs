//! Database models split into domain-specific modules.
//!
//! This module re-exports all types so callers can use `db::models::Lead`.

pub mod audit;
pub mod common;
pub mod instructor;
pub mod lead;
pub mod lesson;
pub mod review;
pub mod site;
pub mod student;
pub mod user;
pub mod vehicle;

// Re-export all types for convenient access
pub use audit::*;
pub use common::*;
pub use instructor::*;
pub use lead::*;
pub use lesson::*;
pub use review::*;
pub use site::*;
pub use student::*;
pub use user::*;
pub use vehicle::*;
