//! HTTP surface for the Task API (§6), shared by no other binary.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
