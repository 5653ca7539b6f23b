use serde::{Deserialize, Serialize};

/// Reactive-power limit enforcement mode.
///
/// With [`QControlMode::Direct`], PV buses whose calculated reactive power
/// leaves the `[qmin, qmax]` band are converted to PQ with the reactive
/// injection pinned at the violated limit, and the solve continues on the
/// updated partition. The conversion is one-way within a solve: a bus that
/// became PQ never goes back to PV.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QControlMode {
    #[default]
    NoControl,
    Direct,
}

impl QControlMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, QControlMode::Direct)
    }
}

/// Solver options, constructed once per solve invocation.
///
/// `tol` and `max_it` fall back to per-method defaults when unset:
/// tolerance 1e-8 for both methods, 15 iterations for Newton-Raphson and
/// 50 for Levenberg-Marquardt.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PowerFlowConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_it: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>,
    #[serde(default)]
    pub control_q: QControlMode,
}

pub(crate) const DEFAULT_TOL: f64 = 1e-8;
pub(crate) const NEWTON_MAX_IT: usize = 15;
pub(crate) const LM_MAX_IT: usize = 50;

/// Reactive limits are only checked once the mismatch is roughly settled;
/// checking earlier retypes buses on transient overshoot.
pub(crate) const Q_CONTROL_THRESHOLD: f64 = 1e-2;
