//! Domain layer: pure entities, validation rules, and port traits.
//!
//! Framework-agnostic; no SQL, no HTTP, no bus wiring lives here.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
