//! A multi-user to-do service built around an embedded event bus.
//!
//! Four binaries share this library: the Task API (HTTP surface and sole
//! writer), the Audit Consumer, the Notification Consumer, and the Recurring
//! Regenerator. Every cross-service handoff flows through the embedded,
//! SQLite-backed Bus via the write-then-publish outbox pattern.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;
