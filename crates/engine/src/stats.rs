//! Evaluation statistics kept by each module.

use serde::Serialize;

/// Counters accumulated while evaluating the fields of one module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationStats {
    /// Requests answered from a field cache.
    pub cache_hits: u64,
    /// Requests that went to the field core.
    pub cache_misses: u64,
    /// Core evaluations that completed successfully.
    pub core_evaluations: u64,
    /// Evaluations refused because the field was already being evaluated.
    pub cycles_detected: u64,
    /// Results that came back without derivatives although they were requested.
    pub derivatives_degraded: u64,
}

impl EvaluationStats {
    /// Fraction of requests answered from cache, or `None` before any request.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        (total > 0).then(|| self.cache_hits as f64 / total as f64)
    }
}
