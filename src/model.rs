use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::PowerFlowError;
use crate::indices::SimulationIndices;

/// Classification of a bus for one power-flow solve.
///
/// One tagged value per bus is the canonical representation; the index
/// partitions used by the solvers are derived from it on demand by
/// [`SimulationIndices::from_bus_types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    /// Voltage magnitude and angle fixed; absorbs the system imbalance.
    Slack,
    /// Voltage magnitude fixed, reactive power free within limits.
    Pv,
    /// Active and reactive power fixed.
    Pq,
}

/// One immutable network snapshot handed to the solvers.
///
/// The admittance matrix and injection vectors are in per-unit. The ZIP
/// injection model combines `s0` (constant power), `i0` (constant current)
/// and `y0` (constant admittance) at each iteration according to the present
/// voltage magnitude. For PV and slack buses the magnitude (and for slack
/// also the angle) of `v0` is the setpoint held during the solve.
#[derive(Debug, Clone)]
pub struct PowerFlowModel {
    pub ybus: CscMatrix<Complex64>,
    /// Constant-power injection, negative = load.
    pub s0: DVector<Complex64>,
    /// Constant-current injection.
    pub i0: DVector<Complex64>,
    /// Constant-admittance injection.
    pub y0: DVector<Complex64>,
    /// Initial voltage guess and PV/slack setpoints.
    pub v0: DVector<Complex64>,
    /// Reactive limits, only meaningful for PV buses.
    pub qmin: DVector<f64>,
    pub qmax: DVector<f64>,
    pub bus_types: Vec<BusType>,
}

impl PowerFlowModel {
    /// Creates a model with flat-start voltages, zero injections and
    /// unbounded reactive limits. Callers fill in the public fields.
    pub fn new(ybus: CscMatrix<Complex64>, bus_types: Vec<BusType>) -> Self {
        let n = bus_types.len();
        Self {
            ybus,
            s0: DVector::zeros(n),
            i0: DVector::zeros(n),
            y0: DVector::zeros(n),
            v0: DVector::from_element(n, Complex64::new(1.0, 0.0)),
            qmin: DVector::from_element(n, f64::NEG_INFINITY),
            qmax: DVector::from_element(n, f64::INFINITY),
            bus_types,
        }
    }

    pub fn n_bus(&self) -> usize {
        self.bus_types.len()
    }

    /// Checks shapes and finiteness before a solve starts. Violations are
    /// fatal; the iteration loop never sees a malformed model.
    pub fn validate(&self) -> Result<(), PowerFlowError> {
        let n = self.n_bus();
        if self.ybus.nrows() != self.ybus.ncols() {
            return Err(PowerFlowError::NonSquareMatrix {
                nrows: self.ybus.nrows(),
                ncols: self.ybus.ncols(),
            });
        }
        if self.ybus.nrows() != n {
            return Err(PowerFlowError::ShapeMismatch {
                what: "ybus",
                expected: n,
                found: self.ybus.nrows(),
            });
        }
        let lengths = [
            ("s0", self.s0.len()),
            ("i0", self.i0.len()),
            ("y0", self.y0.len()),
            ("v0", self.v0.len()),
            ("qmin", self.qmin.len()),
            ("qmax", self.qmax.len()),
        ];
        for (what, found) in lengths {
            if found != n {
                return Err(PowerFlowError::ShapeMismatch {
                    what,
                    expected: n,
                    found,
                });
            }
        }
        if self.ybus.values().iter().any(|y| !y.re.is_finite() || !y.im.is_finite()) {
            return Err(PowerFlowError::NonFiniteInput { what: "ybus" });
        }
        if self.v0.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
            return Err(PowerFlowError::NonFiniteInput { what: "v0" });
        }
        for (what, vec) in [("s0", &self.s0), ("i0", &self.i0), ("y0", &self.y0)] {
            if vec.iter().any(|v| v.re.is_nan() || v.im.is_nan()) {
                return Err(PowerFlowError::NonFiniteInput { what });
            }
        }
        // Infinite limits mean "unbounded" and are fine; NaN is not.
        if self.qmin.iter().chain(self.qmax.iter()).any(|q| q.is_nan()) {
            return Err(PowerFlowError::NonFiniteInput { what: "q limits" });
        }
        Ok(())
    }
}

/// The reordered system the iteration loops actually run on.
///
/// Buses are permuted into `[pv..., pq..., slack...]` order so the Jacobian
/// blocks become contiguous slices. Rebuilt from the original-order data
/// whenever Q-limit enforcement changes the partition.
#[derive(Debug, Clone)]
pub(crate) struct PermutedSystem {
    pub ybus: CscMatrix<Complex64>,
    pub s0: DVector<Complex64>,
    pub i0: DVector<Complex64>,
    pub y0: DVector<Complex64>,
    pub v0: DVector<Complex64>,
    pub qmin: DVector<f64>,
    pub qmax: DVector<f64>,
    pub npv: usize,
    pub npq: usize,
}

impl PermutedSystem {
    /// `s0` and `v0` are passed separately from the model because Q pinning
    /// mutates the specified injection and retyping warm-starts from the
    /// latest iterate.
    pub fn build(
        model: &PowerFlowModel,
        s0: &DVector<Complex64>,
        v0: &DVector<Complex64>,
        indices: &SimulationIndices,
    ) -> Self {
        Self {
            ybus: indices.permute_matrix(&model.ybus),
            s0: indices.permute_vector(s0),
            i0: indices.permute_vector(&model.i0),
            y0: indices.permute_vector(&model.y0),
            v0: indices.permute_vector(v0),
            qmin: indices.permute_vector(&model.qmin),
            qmax: indices.permute_vector(&model.qmax),
            npv: indices.npv(),
            npq: indices.npq(),
        }
    }

    /// Number of buses with free voltage angles.
    pub fn n_free(&self) -> usize {
        self.npv + self.npq
    }

    /// Number of slack buses, placed at the tail of the ordering.
    pub fn n_ext(&self) -> usize {
        self.ybus.nrows() - self.n_free()
    }
}
