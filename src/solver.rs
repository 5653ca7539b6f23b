use thiserror::Error;

/// Failure of one sparse linear solve.
///
/// Never swallowed: the power-flow drivers wrap this into
/// [`PowerFlowError::SingularSystem`](crate::error::PowerFlowError) and abort
/// the solve instead of continuing with a garbage step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("LU factorization failed")]
    Factorization,
    #[error("solution contains non-finite values")]
    NonFinite,
}

/// A sparse LU backend for the linearized systems.
///
/// The matrix is handed over in CSC form (`col_offsets`, `row_indices`,
/// `values`); the right-hand side `b` is overwritten with the solution.
/// Backends may cache the symbolic factorization between calls, which is
/// valid while the sparsity pattern is unchanged; [`Solve::reset`] discards
/// the cache after a structural change (for instance a PV to PQ retype).
pub trait Solve {
    fn solve(
        &mut self,
        col_offsets: &mut [usize],
        row_indices: &mut [usize],
        values: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), SolverError>;

    fn reset(&mut self);
}

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::FaerSolver;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::RSparseSolver;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;
