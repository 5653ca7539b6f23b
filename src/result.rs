use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::model::BusType;

/// Outcome of one power-flow solve, in original bus order.
///
/// Produced on every normal return: a solve that hit the iteration cap
/// without converging still yields a result with `converged = false` and the
/// best-available voltage, never an error. Callers orchestrating many solves
/// inspect `converged` per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerFlowResult {
    /// Final voltage phasors.
    pub v: DVector<Complex64>,
    pub converged: bool,
    /// Infinity norm of the final mismatch vector.
    pub norm_f: f64,
    /// Bus power injections implied by the final voltage.
    pub s_calc: DVector<Complex64>,
    pub iterations: usize,
    /// Wall-clock seconds spent in the solve.
    pub elapsed: f64,
    /// Final partition after any Q-limit retyping. Feed this back into the
    /// next snapshot's model to carry the partition forward across a time
    /// series, or rebuild from nominal device types to reset per step.
    pub bus_types: Vec<BusType>,
}
