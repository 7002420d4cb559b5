//! Early stopping over a tracked validation metric.

use serde::{Deserialize, Serialize};

/// Outcome of an early-stopping check.
#[derive(Debug, Clone, PartialEq)]
pub enum StopDecision {
    Continue,
    /// The two most recent scores are identical.
    Stalled { previous: f64, current: f64 },
    /// None of the trailing `window` scores reached the best score.
    Plateau { best: f64, window: usize },
}

impl StopDecision {
    pub fn should_stop(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

impl std::fmt::Display for StopDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Stalled { previous, current } => {
                write!(f, "constant metric evaluations ({previous} -> {current})")
            }
            Self::Plateau { best, window } => {
                write!(f, "no improvement over best {best} in the last {window} validations")
            }
        }
    }
}

/// Append-only score history for one metric, kept apart from the
/// invocation flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    pub metric: String,
    values: Vec<f64>,
}

impl MetricHistory {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            values: Vec::new(),
        }
    }

    pub fn record(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn extend(&mut self, values: &[f64]) {
        self.values.extend_from_slice(values);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Window-based early stopping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyStopping {
    pub window: usize,
}

impl EarlyStopping {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn check(&self, history: &[f64]) -> StopDecision {
        let n = history.len();
        if n < 2 {
            return StopDecision::Continue;
        }

        let (previous, current) = (history[n - 2], history[n - 1]);
        if previous == current {
            return StopDecision::Stalled { previous, current };
        }

        if n <= self.window {
            return StopDecision::Continue;
        }

        let best = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if history[n - self.window..].iter().all(|score| *score < best) {
            return StopDecision::Plateau {
                best,
                window: self.window,
            };
        }
        StopDecision::Continue
    }
}
