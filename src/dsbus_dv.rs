use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::sparse::conj::Conjugate;

/// Partial derivatives of the complex bus power injections with respect to
/// voltage magnitude and angle.
///
/// Uses the complex matrix formulation of R. D. Zimmerman, "AC Power Flows,
/// Generalized OPF Costs and their Derivatives using Complex Matrix
/// Notation", MATPOWER Technical Note 2, February 2010:
///
/// ```text
/// dS/dVm = diag(V) * conj(Ybus * diag(Vnorm)) + conj(diag(Ibus)) * diag(Vnorm)
/// dS/dVa = j * diag(V) * conj(diag(Ibus) - Ybus * diag(V))
/// ```
///
/// `v_norm` is the vector of unit phasors `V / |V|`. Returns
/// `(ds_dvm, ds_dva)`.
pub(crate) fn ds_bus_dv(
    ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    v_norm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let ibus = ybus * v;

    let diag_pattern = CscMatrix::identity(v.len());
    let mut diag_v_norm = diag_pattern.clone();
    let mut diag_v = diag_pattern.clone();
    let mut diag_ibus = diag_pattern;
    diag_v_norm.values_mut().copy_from_slice(v_norm.as_slice());
    diag_v.values_mut().copy_from_slice(v.as_slice());
    diag_ibus.values_mut().copy_from_slice(ibus.as_slice());

    let ds_dvm = &diag_v * (ybus * &diag_v_norm).conjugate() + diag_ibus.conjugate() * &diag_v_norm;
    let ds_dva = &diag_v * (diag_ibus - ybus * &diag_v).conjugate() * Complex64::i();
    (ds_dvm, ds_dva)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;

    fn test_ybus() -> CscMatrix<Complex64> {
        // 3-bus ring, series impedance 0.01 + 0.05j per branch
        let y = Complex64::new(1.0, 0.0) / Complex64::new(0.01, 0.05);
        let mut coo = CooMatrix::new(3, 3);
        for (f, t) in [(0usize, 1usize), (1, 2), (0, 2)] {
            coo.push(f, f, y);
            coo.push(t, t, y);
            coo.push(f, t, -y);
            coo.push(t, f, -y);
        }
        CscMatrix::from(&coo)
    }

    fn injected_power(ybus: &CscMatrix<Complex64>, v: &DVector<Complex64>) -> DVector<Complex64> {
        v.component_mul(&(ybus * v).conjugate())
    }

    /// Check both derivative matrices against one-sided finite differences.
    #[test]
    fn derivatives_match_finite_differences() {
        let ybus = test_ybus();
        let vm = [1.02, 0.97, 1.0];
        let va = [0.0, -0.05, 0.03];
        let v = DVector::from_iterator(3, (0..3).map(|k| Complex64::from_polar(vm[k], va[k])));
        let v_norm = v.map(|e| e / e.norm());

        let (ds_dvm, ds_dva) = ds_bus_dv(&ybus, &v, &v_norm);
        let dvm = DMatrix::from(&ds_dvm);
        let dva = DMatrix::from(&ds_dva);

        let s0 = injected_power(&ybus, &v);
        let h = 1e-7;
        for j in 0..3 {
            let mut vm_p = vm;
            vm_p[j] += h;
            let v_p =
                DVector::from_iterator(3, (0..3).map(|k| Complex64::from_polar(vm_p[k], va[k])));
            let ds = (injected_power(&ybus, &v_p) - &s0).map(|x| x / h);
            for i in 0..3 {
                assert!((ds[i] - dvm[(i, j)]).norm() < 1e-4, "dS/dVm[{i},{j}]");
            }

            let mut va_p = va;
            va_p[j] += h;
            let v_p =
                DVector::from_iterator(3, (0..3).map(|k| Complex64::from_polar(vm[k], va_p[k])));
            let ds = (injected_power(&ybus, &v_p) - &s0).map(|x| x / h);
            for i in 0..3 {
                assert!((ds[i] - dva[(i, j)]).norm() < 1e-4, "dS/dVa[{i},{j}]");
            }
        }
    }
}
