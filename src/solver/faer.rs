use faer::{
    MatMut,
    linalg::solvers::Solve as FaerSolve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::{Solve, SolverError};

/// Sparse LU backend based on faer. Keeps the symbolic factorization alive
/// while the sparsity pattern is unchanged.
#[derive(Default)]
pub struct FaerSolver {
    lu: Option<Lu<usize, f64>>,
    symbolic: Option<SymbolicLu<usize>>,
}

impl Solve for FaerSolver {
    fn solve(
        &mut self,
        col_offsets: &mut [usize],
        row_indices: &mut [usize],
        values: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), SolverError> {
        let s = unsafe { SymbolicSparseColMatRef::new_unchecked(n, n, col_offsets, None, row_indices) };
        let mat = SparseColMatRef::new(s, values);
        if self.symbolic.is_none() {
            self.symbolic = Some(SymbolicLu::try_new(s).map_err(|_| SolverError::Factorization)?);
        }
        let symbolic = self.symbolic.as_ref().ok_or(SolverError::Factorization)?;

        let lu = Lu::try_new_with_symbolic(symbolic.clone(), mat)
            .map_err(|_| SolverError::Factorization)?;
        let rhs = MatMut::from_column_major_slice_mut(b, n, 1);
        lu.solve_in_place(rhs);
        self.lu = Some(lu);
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
        self.lu = None;
    }
}
