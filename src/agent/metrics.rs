//! Agent metrics
//!
//! Tracks answered questions, tool usage, latencies and tool error rates.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Response times kept per tool for the rolling average
const WINDOW: usize = 100;

/// Metrics shared by every run of one agent
pub struct AgentMetrics {
    /// Questions received
    pub total_queries: AtomicU64,
    /// Questions that ended in an error
    pub failed_queries: AtomicU64,
    /// Recent end-to-end query times in ms
    query_times: RwLock<Vec<u64>>,
    tool_calls: RwLock<HashMap<String, u64>>,
    tool_response_times: RwLock<HashMap<String, Vec<u64>>>,
    tool_errors: RwLock<HashMap<String, u64>>,
    tool_successes: RwLock<HashMap<String, u64>>,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self {
            total_queries: AtomicU64::new(0),
            failed_queries: AtomicU64::new(0),
            query_times: RwLock::new(Vec::new()),
            tool_calls: RwLock::new(HashMap::new()),
            tool_response_times: RwLock::new(HashMap::new()),
            tool_errors: RwLock::new(HashMap::new()),
            tool_successes: RwLock::new(HashMap::new()),
        }
    }

    /// Record a finished question
    pub fn record_query(&self, time_ms: u64, ok: bool) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
        let mut times = self.query_times.write().unwrap_or_else(PoisonError::into_inner);
        push_window(&mut times, time_ms);
    }

    /// Record one tool call and its outcome
    pub fn record_tool_call(&self, tool: &str, time_ms: u64, ok: bool) {
        {
            let mut calls = self.tool_calls.write().unwrap_or_else(PoisonError::into_inner);
            *calls.entry(tool.to_string()).or_insert(0) += 1;
        }
        {
            let mut times = self
                .tool_response_times
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            push_window(times.entry(tool.to_string()).or_default(), time_ms);
        }
        let counter = if ok { &self.tool_successes } else { &self.tool_errors };
        let mut counts = counter.write().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(tool.to_string()).or_insert(0) += 1;
    }

    pub fn get_total_queries(&self) -> u64 {
        self.total_queries.load(Ordering::Relaxed)
    }

    /// Average end-to-end query time
    pub fn get_avg_query_time(&self) -> Option<u64> {
        let times = self.query_times.read().unwrap_or_else(PoisonError::into_inner);
        average(&times)
    }

    /// Average response time for a tool
    pub fn get_avg_response_time(&self, tool: &str) -> Option<u64> {
        let times = self
            .tool_response_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        times.get(tool).and_then(|t| average(t))
    }

    /// Reliability percentage for a tool
    pub fn get_reliability(&self, tool: &str) -> f64 {
        let errors = self.tool_errors.read().unwrap_or_else(PoisonError::into_inner);
        let successes = self.tool_successes.read().unwrap_or_else(PoisonError::into_inner);

        let error_count = *errors.get(tool).unwrap_or(&0);
        let success_count = *successes.get(tool).unwrap_or(&0);

        let total = error_count + success_count;
        if total == 0 {
            100.0
        } else {
            (success_count as f64 / total as f64) * 100.0
        }
    }

    /// Snapshot for `/stats`
    pub fn snapshot(&self) -> AgentStats {
        let calls = self.tool_calls.read().unwrap_or_else(PoisonError::into_inner);
        let tools = calls
            .iter()
            .map(|(tool, count)| {
                (
                    tool.clone(),
                    ToolStats {
                        calls: *count,
                        avg_response_time: self.get_avg_response_time(tool),
                        reliability: self.get_reliability(tool),
                    },
                )
            })
            .collect();

        AgentStats {
            total_queries: self.get_total_queries(),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            avg_query_time: self.get_avg_query_time(),
            tools,
        }
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_window(times: &mut Vec<u64>, time_ms: u64) {
    if times.len() >= WINDOW {
        times.remove(0);
    }
    times.push(time_ms);
}

fn average(times: &[u64]) -> Option<u64> {
    if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<u64>() / times.len() as u64)
    }
}

/// Serializable view of [`AgentMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    /// Milliseconds
    pub avg_query_time: Option<u64>,
    pub tools: HashMap<String, ToolStats>,
}

/// Statistics for a single tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolStats {
    pub calls: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}
