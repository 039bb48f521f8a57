//! Query evaluation telemetry and metrics

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Queries slower than this are logged as slow.
const SLOW_QUERY_MS: f64 = 500.0;

/// Metrics collected while evaluating one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    pub parse_ms: f64,
    pub bind_ms: f64,
    pub proximity_build_ms: f64,
    pub evaluate_ms: f64,
    pub total_ms: f64,
    pub segments: usize,
    pub virtual_lists: usize,
    pub matched_docs: usize,
    pub result_count: usize,
    pub query_type: String,
}

/// Helper for tracking evaluation stages
pub struct QueryTelemetry {
    start: Instant,
    last_mark: Instant,
    stages: Vec<(String, f64)>,
}

impl QueryTelemetry {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_mark: now,
            stages: Vec::new(),
        }
    }

    /// Mark the completion of a stage and record its duration. Repeated stages accumulate.
    pub fn mark_stage(&mut self, stage_name: &str) {
        let now = Instant::now();
        let duration_ms = (now - self.last_mark).as_secs_f64() * 1000.0;
        self.add_stage(stage_name, duration_ms);
        self.last_mark = now;
    }

    /// Record time measured elsewhere, without moving the stage clock.
    pub fn record(&mut self, stage_name: &str, duration: Duration) {
        self.add_stage(stage_name, duration.as_secs_f64() * 1000.0);
    }

    fn add_stage(&mut self, stage_name: &str, duration_ms: f64) {
        match self.stages.iter_mut().find(|(name, _)| name == stage_name) {
            Some((_, total)) => *total += duration_ms,
            None => self.stages.push((stage_name.to_string(), duration_ms)),
        }
    }

    /// Get duration of a specific stage
    pub fn stage_duration(&self, stage_name: &str) -> f64 {
        self.stages
            .iter()
            .find(|(name, _)| name == stage_name)
            .map(|(_, duration)| *duration)
            .unwrap_or(0.0)
    }

    /// Finish telemetry and build metrics
    pub fn finish(
        self,
        query_type: &str,
        segments: usize,
        virtual_lists: usize,
        matched_docs: usize,
        result_count: usize,
    ) -> QueryMetrics {
        let total_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        QueryMetrics {
            parse_ms: self.stage_duration("parse"),
            bind_ms: self.stage_duration("bind"),
            proximity_build_ms: self.stage_duration("proximity_build"),
            evaluate_ms: self.stage_duration("evaluate"),
            total_ms,
            segments,
            virtual_lists,
            matched_docs,
            result_count,
            query_type: query_type.to_string(),
        }
    }
}

impl Default for QueryTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Log successful query evaluation
pub fn log_query_success(query: &str, metrics: &QueryMetrics) {
    info!(
        query = %query,
        query_type = %metrics.query_type,
        segments = metrics.segments,
        matched_docs = metrics.matched_docs,
        result_count = metrics.result_count,
        total_ms = metrics.total_ms,
        evaluate_ms = metrics.evaluate_ms,
        proximity_ms = metrics.proximity_build_ms,
        "Query evaluated"
    );

    if metrics.total_ms > SLOW_QUERY_MS {
        warn!(
            query = %query,
            total_ms = metrics.total_ms,
            proximity_ms = metrics.proximity_build_ms,
            virtual_lists = metrics.virtual_lists,
            "Slow query detected"
        );
    }
}

/// Log query evaluation failure
pub fn log_query_error(query: &str, error: &str) {
    error!(
        error = %error,
        query = %query,
        "Query evaluation failed"
    );
}
