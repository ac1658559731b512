//! Application state shared across handlers

use crate::agent::{AgentStats, ReactAgent};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The agent answering `/query`
    pub agent: Arc<ReactAgent>,
}

impl AppState {
    pub fn new(agent: ReactAgent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }

    pub fn stats(&self) -> AgentStats {
        self.agent.metrics().snapshot()
    }
}
