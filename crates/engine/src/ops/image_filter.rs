//! Pointwise image filters.
//!
//! Each filter maps every component of its source through a fixed intensity
//! function. These operators have no derivative semantics: results never
//! carry derivatives.

use fieldgraph_core::{ConstructionError, EvaluationError, FieldValue, Location};

use super::Evaluation;
use crate::describe::CommandBuilder;

/// Which side of the thresholds a threshold filter replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Replace values below `below`.
    Below,
    /// Replace values above `above`.
    Above,
    /// Replace values outside `[below, above]`.
    Outside,
}

impl ThresholdMode {
    pub fn token(self) -> &'static str {
        match self {
            Self::Below => "below",
            Self::Above => "above",
            Self::Outside => "outside",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        [Self::Below, Self::Above, Self::Outside]
            .into_iter()
            .find(|m| m.token() == token)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageFilter {
    /// 1 inside `[lower, upper]`, 0 outside.
    BinaryThreshold { lower: f64, upper: f64 },
    /// Values on the replaced side become `outside_value`; others pass through.
    Threshold {
        mode: ThresholdMode,
        outside_value: f64,
        below: f64,
        above: f64,
    },
    /// `(maximum - minimum) / (1 + exp(-(v - beta) / alpha)) + minimum`.
    Sigmoid {
        minimum: f64,
        maximum: f64,
        alpha: f64,
        beta: f64,
    },
}

impl ImageFilter {
    pub fn binary_threshold(lower: f64, upper: f64) -> Result<Self, ConstructionError> {
        if !(lower <= upper) {
            return Err(ConstructionError::InvalidArgument(format!(
                "binary threshold lower bound {lower} exceeds upper bound {upper}"
            )));
        }
        Ok(Self::BinaryThreshold { lower, upper })
    }

    pub fn threshold(mode: ThresholdMode, outside_value: f64, below: f64, above: f64) -> Result<Self, ConstructionError> {
        if mode == ThresholdMode::Outside && !(below <= above) {
            return Err(ConstructionError::InvalidArgument(format!(
                "threshold below value {below} exceeds above value {above}"
            )));
        }
        Ok(Self::Threshold {
            mode,
            outside_value,
            below,
            above,
        })
    }

    pub fn sigmoid(minimum: f64, maximum: f64, alpha: f64, beta: f64) -> Result<Self, ConstructionError> {
        if alpha == 0.0 || !alpha.is_finite() {
            return Err(ConstructionError::InvalidArgument(
                "sigmoid alpha must be finite and non-zero".into(),
            ));
        }
        Ok(Self::Sigmoid {
            minimum,
            maximum,
            alpha,
            beta,
        })
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::BinaryThreshold { .. } => "binary_threshold_filter",
            Self::Threshold { .. } => "threshold_filter",
            Self::Sigmoid { .. } => "sigmoid_filter",
        }
    }

    /// Filter one intensity.
    pub fn apply(&self, v: f64) -> f64 {
        match *self {
            Self::BinaryThreshold { lower, upper } => {
                if v >= lower && v <= upper {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Threshold {
                mode,
                outside_value,
                below,
                above,
            } => {
                let replace = match mode {
                    ThresholdMode::Below => v < below,
                    ThresholdMode::Above => v > above,
                    ThresholdMode::Outside => v < below || v > above,
                };
                if replace { outside_value } else { v }
            }
            Self::Sigmoid {
                minimum,
                maximum,
                alpha,
                beta,
            } => (maximum - minimum) / (1.0 + (-(v - beta) / alpha).exp()) + minimum,
        }
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let source = eval.source(0)?.evaluate(&location.clone().with_derivatives(false))?;
        Ok(FieldValue::values_only(
            source.values.iter().map(|v| self.apply(*v)).collect(),
        ))
    }

    pub(crate) fn describe(&self, cmd: &mut CommandBuilder) {
        match *self {
            Self::BinaryThreshold { lower, upper } => {
                cmd.keyword("lower_threshold").value(lower);
                cmd.keyword("upper_threshold").value(upper);
            }
            Self::Threshold {
                mode,
                outside_value,
                below,
                above,
            } => {
                cmd.keyword("mode").keyword(mode.token());
                cmd.keyword("outside_value").value(outside_value);
                cmd.keyword("below_value").value(below);
                cmd.keyword("above_value").value(above);
            }
            Self::Sigmoid {
                minimum,
                maximum,
                alpha,
                beta,
            } => {
                cmd.keyword("minimum").value(minimum);
                cmd.keyword("maximum").value(maximum);
                cmd.keyword("alpha").value(alpha);
                cmd.keyword("beta").value(beta);
            }
        }
    }
}
