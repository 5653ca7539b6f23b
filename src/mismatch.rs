use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

/// Effective specified injection under the ZIP model at the present voltage
/// magnitude:
///
/// ```text
/// Sbus[i] = S0[i] + conj(I0[i]) * Vm[i] + conj(Y0[i]) * Vm[i]^2
/// ```
pub(crate) fn compute_zip_power(
    s0: &DVector<Complex64>,
    i0: &DVector<Complex64>,
    y0: &DVector<Complex64>,
    vm: &DVector<f64>,
) -> DVector<Complex64> {
    DVector::from_iterator(
        s0.len(),
        (0..s0.len()).map(|k| s0[k] + i0[k].conj() * vm[k] + y0[k].conj() * (vm[k] * vm[k])),
    )
}

/// Power implied by the present voltage estimate: `Scalc = V ∘ conj(Ybus·V)`.
pub(crate) fn compute_scalc(
    ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
) -> DVector<Complex64> {
    v.component_mul(&(ybus * v).conjugate())
}

/// Writes the mismatch vector for a permuted system into `f`:
/// real-power mismatch at all free buses, then reactive-power mismatch at
/// PQ buses only. `f` must have length `2*npq + npv`.
pub(crate) fn assemble_f(
    f: &mut DVector<f64>,
    mis: &DVector<Complex64>,
    npv: usize,
    npq: usize,
) {
    let n_free = npv + npq;
    f.rows_range_mut(0..n_free)
        .zip_apply(&mis.rows_range(0..n_free), |a, b| *a = b.re);
    f.rows_range_mut(n_free..n_free + npq)
        .zip_apply(&mis.rows_range(npv..n_free), |a, b| *a = b.im);
}

/// Applies a Newton step `dx = [dVa(free); dVm(pq)]` in place and
/// recomposes the complex voltage. Magnitude and angle are re-extracted
/// from `V` afterwards in case a magnitude update went negative and wrapped
/// the phasor around. Slack entries are never touched.
pub(crate) fn apply_step(
    dx: &DVector<f64>,
    va: &mut DVector<f64>,
    vm: &mut DVector<f64>,
    v: &mut DVector<Complex64>,
    v_norm: &mut DVector<Complex64>,
    npv: usize,
    npq: usize,
) {
    let n_free = npv + npq;
    va.rows_range_mut(0..n_free)
        .zip_apply(&dx.rows_range(0..n_free), |a, b| *a -= b);
    vm.rows_range_mut(npv..n_free)
        .zip_apply(&dx.rows_range(n_free..n_free + npq), |a, b| *a -= b);

    for k in 0..n_free {
        v[k] = Complex64::from_polar(vm[k], va[k]);
        vm[k] = v[k].norm();
        va[k] = v[k].arg();
        v_norm[k] = Complex64::from_polar(1.0, va[k]);
    }
}

/// Mutable iterate shared by the Newton-Raphson and Levenberg-Marquardt
/// loops, in permuted bus order. Rebuilt from scratch whenever Q-limit
/// enforcement changes the partition.
pub(crate) struct IterState {
    pub v: DVector<Complex64>,
    pub vm: DVector<f64>,
    pub va: DVector<f64>,
    pub v_norm: DVector<Complex64>,
    pub sbus: DVector<Complex64>,
    pub scalc: DVector<Complex64>,
    pub f: DVector<f64>,
    pub norm_f: f64,
}

impl IterState {
    pub fn new(sys: &crate::model::PermutedSystem) -> Self {
        let v = sys.v0.clone();
        let vm = v.map(|e| e.norm());
        let va = v.map(|e| e.arg());
        let v_norm =
            DVector::from_iterator(v.len(), va.iter().map(|&a| Complex64::from_polar(1.0, a)));
        let mut state = Self {
            v,
            vm,
            va,
            v_norm,
            sbus: DVector::zeros(sys.v0.len()),
            scalc: DVector::zeros(sys.v0.len()),
            f: DVector::zeros(sys.n_free() + sys.npq),
            norm_f: 0.0,
        };
        state.refresh(sys);
        state
    }

    /// Recomputes the effective injection, calculated power and mismatch
    /// for the present voltage.
    pub fn refresh(&mut self, sys: &crate::model::PermutedSystem) {
        self.sbus = compute_zip_power(&sys.s0, &sys.i0, &sys.y0, &self.vm);
        self.scalc = compute_scalc(&sys.ybus, &self.v);
        let mis = &self.scalc - &self.sbus;
        assemble_f(&mut self.f, &mis, sys.npv, sys.npq);
        self.norm_f = self.f.amax();
    }

    /// Applies an accepted step and refreshes the residual quantities.
    pub fn step(&mut self, dx: &DVector<f64>, sys: &crate::model::PermutedSystem) {
        apply_step(
            dx,
            &mut self.va,
            &mut self.vm,
            &mut self.v,
            &mut self.v_norm,
            sys.npv,
            sys.npq,
        );
        self.refresh(sys);
    }
}
