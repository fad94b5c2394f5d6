//! Cumulative per-instance parse statistics.

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::Tier;

#[derive(Debug, Default)]
struct StatsInner {
    total_attempts: u64,
    successful_parses: u64,
    tier_usage: FxHashMap<Tier, u64>,
    error_breakdown: FxHashMap<&'static str, u64>,
    avg_processing_ms: f64,
}

pub(crate) struct StatsRecorder {
    inner: Mutex<StatsInner>,
}

/// Snapshot returned by [`crate::parser::SalvageParser::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct ParserStats {
    pub success_rate: f64,
    pub total_attempts: u64,
    pub successful_parses: u64,
    pub avg_processing_ms: f64,
    pub method_usage: FxHashMap<Tier, u64>,
    pub error_breakdown: FxHashMap<String, u64>,
    pub circuit_breaker_active: bool,
}

impl StatsRecorder {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
        }
    }

    /// Record one top-level parse call.
    pub(crate) fn record_call(&self, tier: Tier, success: bool, latency: Duration) {
        let mut inner = self.inner.lock();
        inner.total_attempts += 1;
        if success {
            inner.successful_parses += 1;
        }
        *inner.tier_usage.entry(tier).or_insert(0) += 1;
        // Running mean, avoids keeping a latency history around.
        let sample_ms = latency.as_secs_f64() * 1_000.0;
        let n = inner.total_attempts as f64;
        inner.avg_processing_ms += (sample_ms - inner.avg_processing_ms) / n;
    }

    /// Count one internal failure by error kind. Called for every absorbed
    /// tier failure, not just the final outcome.
    pub(crate) fn record_error(&self, kind: &'static str) {
        let mut inner = self.inner.lock();
        *inner.error_breakdown.entry(kind).or_insert(0) += 1;
    }

    pub(crate) fn snapshot(&self, circuit_breaker_active: bool) -> ParserStats {
        let inner = self.inner.lock();
        let success_rate = if inner.total_attempts == 0 {
            0.0
        } else {
            inner.successful_parses as f64 / inner.total_attempts as f64
        };
        ParserStats {
            success_rate,
            total_attempts: inner.total_attempts,
            successful_parses: inner.successful_parses,
            avg_processing_ms: inner.avg_processing_ms,
            method_usage: inner.tier_usage.clone(),
            error_breakdown: inner
                .error_breakdown
                .iter()
                .map(|(kind, count)| ((*kind).to_string(), *count))
                .collect(),
            circuit_breaker_active,
        }
    }

    pub(crate) fn reset(&self) {
        *self.inner.lock() = StatsInner::default();
    }
}
