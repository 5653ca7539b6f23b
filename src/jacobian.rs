use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::sparse::conj::RealImag;
use crate::sparse::slice::{slice_csc_block, slice_csc_columns};
use crate::sparse::stack::{csc_hstack, csc_vstack};

/// Assembles the polar-form power-flow Jacobian from the complex derivative
/// matrices, for a system permuted into `[pv..., pq..., slack...]` order.
///
/// With `n_free = npv + npq` the blocks are
///
/// ```text
/// J11 = Re(dS/dVa)[free, free]      J12 = Re(dS/dVm)[free, pq]
/// J21 = Im(dS/dVa)[pq, free]        J22 = Im(dS/dVm)[pq, pq]
/// ```
///
/// giving a square real matrix of size `2*npq + npv`, such that
/// `J * [dVa(free); dVm(pq)]` approximates the mismatch change. Slack rows
/// and columns are left out entirely; magnitude columns exist only for PQ
/// buses since PV and slack magnitudes are fixed.
pub(crate) fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npv: usize,
    n_ext: usize,
) -> CscMatrix<f64> {
    let n_free = ds_dva.nrows() - n_ext;

    let (va_re, va_im) = slice_csc_block(ds_dva, (0, 0), (n_free, n_free)).real_imag();
    let (vm_re, vm_im) = slice_csc_block(ds_dvm, (0, 0), (n_free, n_free)).real_imag();

    let j11 = va_re;
    let j12 = slice_csc_columns(&vm_re, npv, n_free);
    let j21 = slice_csc_block(&va_im, (npv, 0), (n_free - npv, n_free));
    let j22 = slice_csc_block(&vm_im, (npv, npv), (n_free - npv, n_free - npv));

    csc_vstack(&[&csc_hstack(&[&j11, &j12]), &csc_hstack(&[&j21, &j22])])
}
