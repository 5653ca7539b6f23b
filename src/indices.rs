use nalgebra::{DVector, Scalar};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use num_traits::One;

use crate::error::PowerFlowError;
use crate::model::BusType;

/// Index partition of the buses for one solve, plus the permutation that
/// reorders the system into `[pv..., pq..., slack...]` order.
///
/// Each solve owns its own partition instance; the Q-limit controller
/// mutates the underlying `Vec<BusType>` and a fresh partition is derived
/// from it, so the index lists can never drift out of sync with the bus
/// types. Whether a time series resets the partition per step or carries
/// the previous step's final partition forward is the caller's choice:
/// rebuild from the nominal device types, or from
/// [`PowerFlowResult::bus_types`](crate::result::PowerFlowResult).
#[derive(Debug, Clone)]
pub struct SimulationIndices {
    pv: Vec<usize>,
    pq: Vec<usize>,
    slack: Vec<usize>,
    /// original index -> permuted index
    to_perm: Vec<usize>,
    /// permuted index -> original index
    from_perm: Vec<usize>,
    /// P[new, old] = 1
    perm: CscMatrix<Complex64>,
}

impl SimulationIndices {
    /// Derives the partition from per-bus types. Fails if no slack bus is
    /// present: such a system has no angle reference and the Jacobian is
    /// structurally singular, so it is rejected before the solve starts.
    pub fn from_bus_types(bus_types: &[BusType]) -> Result<Self, PowerFlowError> {
        let mut pv = Vec::new();
        let mut pq = Vec::new();
        let mut slack = Vec::new();
        for (i, t) in bus_types.iter().enumerate() {
            match t {
                BusType::Pv => pv.push(i),
                BusType::Pq => pq.push(i),
                BusType::Slack => slack.push(i),
            }
        }
        if slack.is_empty() {
            return Err(PowerFlowError::NoSlackBus);
        }

        let n = bus_types.len();
        let mut from_perm = Vec::with_capacity(n);
        from_perm.extend_from_slice(&pv);
        from_perm.extend_from_slice(&pq);
        from_perm.extend_from_slice(&slack);

        let mut to_perm = vec![0; n];
        for (new_idx, &original_idx) in from_perm.iter().enumerate() {
            to_perm[original_idx] = new_idx;
        }

        let mut coo = CooMatrix::new(n, n);
        for (new_idx, &original_idx) in from_perm.iter().enumerate() {
            coo.push(new_idx, original_idx, Complex64::one());
        }
        let perm = CscMatrix::from(&coo);

        Ok(Self {
            pv,
            pq,
            slack,
            to_perm,
            from_perm,
            perm,
        })
    }

    pub fn pv(&self) -> &[usize] {
        &self.pv
    }

    pub fn pq(&self) -> &[usize] {
        &self.pq
    }

    pub fn slack(&self) -> &[usize] {
        &self.slack
    }

    pub fn npv(&self) -> usize {
        self.pv.len()
    }

    pub fn npq(&self) -> usize {
        self.pq.len()
    }

    pub fn n_free(&self) -> usize {
        self.pv.len() + self.pq.len()
    }

    /// Original bus index of permuted position `k`.
    pub fn original_index(&self, k: usize) -> usize {
        self.from_perm[k]
    }

    /// Permuted position of original bus index `i`.
    pub fn permuted_index(&self, i: usize) -> usize {
        self.to_perm[i]
    }

    /// Y' = P * Y * P^T
    pub(crate) fn permute_matrix(&self, ybus: &CscMatrix<Complex64>) -> CscMatrix<Complex64> {
        &self.perm * ybus * &self.perm.transpose()
    }

    pub(crate) fn permute_vector<T: Scalar + Copy>(&self, x: &DVector<T>) -> DVector<T> {
        DVector::from_iterator(x.len(), self.from_perm.iter().map(|&i| x[i]))
    }

    pub(crate) fn unpermute_vector<T: Scalar + Copy>(&self, x: &DVector<T>) -> DVector<T> {
        DVector::from_iterator(x.len(), self.to_perm.iter().map(|&k| x[k]))
    }
}
