use rsparse::{
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::{Solve, SolverError};

/// Pure-Rust sparse LU backend. Caches the fill-reducing symbolic analysis
/// across calls with the same sparsity pattern.
#[derive(Default)]
pub struct RSparseSolver {
    x: Option<Vec<f64>>,
    symbolic: Option<Symb>,
}

impl Solve for RSparseSolver {
    fn solve(
        &mut self,
        col_offsets: &mut [usize],
        row_indices: &mut [usize],
        values: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), SolverError> {
        // rsparse::amd underflows `n - 2` for n < 2, so solve 1x1 systems
        // directly instead of going through the symbolic analysis.
        if n == 1 {
            if values.is_empty() || values[0] == 0.0 {
                return Err(SolverError::Factorization);
            }
            b[0] /= values[0];
            return Ok(());
        }
        let p: Vec<isize> = col_offsets.iter().map(|&v| v as isize).collect();
        let a = data::Sprs {
            m: n,
            n,
            i: row_indices.to_vec(),
            p,
            x: values.to_vec(),
            nzmax: values.len(),
        };
        if self.symbolic.is_none() {
            self.symbolic = Some(sqr(&a, 1, false));
            self.x = Some(vec![0.0; n]);
        }
        let x = self.x.as_mut().ok_or(SolverError::Factorization)?;
        let s = self.symbolic.as_mut().ok_or(SolverError::Factorization)?;

        let num = lu(&a, s, 1e-6).map_err(|_| SolverError::Factorization)?;
        ipvec(&num.pinv, b, &mut x[..]); // x = P*b
        lsolve(&num.l, x); // x = L\x
        usolve(&num.u, x); // x = U\x
        ipvec(&s.q, x, &mut b[..]); // b = Q*x

        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
        self.x = None;
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => {
            for k in 0..b.len() {
                x[pvec[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}
