//! Deadlock likelihood prediction.
//!
//! The predictor estimates how close the system is to deadlock from
//! contention metrics alone, without running cycle detection. It is a
//! deliberately false-positive-tolerant heuristic: a high-risk signal
//! triggers preventive resolution even though no cycle exists yet.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::store::EntityStore;

/// Probability above which the predictor recommends preventive action.
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;

/// Minimum number of waiting processes for a high-risk signal.
pub const HIGH_RISK_MIN_WAITING: usize = 2;

/// Outcome of one predictor evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Prediction {
    /// Probability is zero; nothing to report.
    Quiet,

    /// Elevated but tolerable risk; monitoring only, no state mutation.
    Monitor {
        /// Estimated deadlock probability in `(0.0, 0.5]`.
        probability: f64,
    },

    /// High risk; preventive resolution should be applied.
    HighRisk {
        /// Estimated deadlock probability in `(0.5, 1.0]`.
        probability: f64,
    },
}

impl Prediction {
    /// The estimated probability, zero for [`Prediction::Quiet`].
    #[must_use]
    pub fn probability(&self) -> f64 {
        match self {
            Self::Quiet => 0.0,
            Self::Monitor { probability } | Self::HighRisk { probability } => *probability,
        }
    }

    /// The probability as a rounded percentage, for log messages.
    #[must_use]
    pub fn percent(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            (self.probability() * 100.0).round() as u32
        }
    }
}

/// Evaluates the deadlock-likelihood heuristic against current state.
///
/// `probability = (waiting / processes) * saturation`, where saturation is
/// the fraction of resources with no spare capacity. With zero processes or
/// zero resources the probability is defined as zero and no prediction
/// fires.
#[must_use]
pub fn assess(store: &EntityStore) -> Prediction {
    let process_count = store.processes().len();
    let resource_count = store.resources().len();
    if process_count == 0 || resource_count == 0 {
        return Prediction::Quiet;
    }

    let waiting = store.processes().iter().filter(|p| p.is_waiting()).count();
    let saturated = store.resources().iter().filter(|r| r.is_saturated()).count();

    #[allow(clippy::cast_precision_loss)]
    let probability =
        (waiting as f64 / process_count as f64) * (saturated as f64 / resource_count as f64);

    if probability > HIGH_RISK_THRESHOLD && waiting >= HIGH_RISK_MIN_WAITING {
        Prediction::HighRisk { probability }
    } else if probability > 0.0 {
        Prediction::Monitor { probability }
    } else {
        Prediction::Quiet
    }
}

/// A predictor outcome whose effect is deferred by the "thinking time"
/// latency.
///
/// The engine holds at most one of these. It fires once its deadline passes
/// and is cancelled if a new tick starts first (superseded effects are
/// dropped, not queued; see the crate design notes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingPrediction {
    /// The deferred outcome.
    pub outcome: Prediction,

    /// When the outcome becomes applicable.
    pub fires_at: Instant,
}

impl PendingPrediction {
    /// True once the thinking-time delay has elapsed.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.fires_at
    }
}
