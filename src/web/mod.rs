//! Web server module
//!
//! Exposes the agent over a small JSON API.

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, QueryRequest, QueryResponse, MISSING_QUESTION, ROOT_MESSAGE};
pub use routes::create_router;
pub use state::AppState;
