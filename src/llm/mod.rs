//! OpenAI-compatible model endpoint

mod client;
mod types;

pub use client::ChatClient;
pub use types::*;
