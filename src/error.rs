use thiserror::Error;

use crate::solver::SolverError;

/// Errors surfaced by model validation and the iterative solvers.
///
/// Non-convergence is deliberately not represented here: hitting the
/// iteration cap is a normal outcome reported through
/// [`PowerFlowResult::converged`](crate::result::PowerFlowResult).
#[derive(Debug, Error)]
pub enum PowerFlowError {
    #[error("{what} has length {found}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("admittance matrix is {nrows}x{ncols}, expected square")]
    NonSquareMatrix { nrows: usize, ncols: usize },

    #[error("{what} contains a non-finite value")]
    NonFiniteInput { what: &'static str },

    #[error("bus classification contains no slack bus")]
    NoSlackBus,

    #[error("linear system is singular at iteration {iteration}")]
    SingularSystem {
        iteration: usize,
        #[source]
        source: SolverError,
    },
}
