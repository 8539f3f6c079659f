//! Engine tuning knobs shared by every module.

use serde::{Deserialize, Serialize};

/// Numerical and bookkeeping settings for field evaluation.
///
/// Maps to the `[engine]` table of the application config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Convergence tolerance of the xi search used by `compose` fields.
    #[serde(default = "default_find_tolerance")]
    pub find_tolerance: f64,

    /// Newton iterations allowed per element during the xi search.
    #[serde(default = "default_find_max_iterations")]
    pub find_max_iterations: u32,

    /// How far outside [0, 1] a found xi may fall and still count as inside.
    #[serde(default = "default_find_xi_bounds_tolerance")]
    pub find_xi_bounds_tolerance: f64,

    /// Whether modules count cache hits, misses and core evaluations.
    #[serde(default = "default_true")]
    pub record_statistics: bool,
}

fn default_find_tolerance() -> f64 {
    1e-10
}
fn default_find_max_iterations() -> u32 {
    20
}
fn default_find_xi_bounds_tolerance() -> f64 {
    1e-6
}
fn default_true() -> bool {
    true
}

impl EngineSettings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.find_tolerance > 0.0) {
            return Err("find_tolerance must be > 0".into());
        }
        if self.find_max_iterations == 0 {
            return Err("find_max_iterations must be >= 1".into());
        }
        if !(self.find_xi_bounds_tolerance >= 0.0) {
            return Err("find_xi_bounds_tolerance must be >= 0".into());
        }
        Ok(())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            find_tolerance: default_find_tolerance(),
            find_max_iterations: default_find_max_iterations(),
            find_xi_bounds_tolerance: default_find_xi_bounds_tolerance(),
            record_statistics: true,
        }
    }
}
