use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

/// Elementwise conjugate of a sparse complex matrix, preserving the pattern.
pub(crate) trait Conjugate {
    fn conjugate(&self) -> Self;
}

impl Conjugate for CscMatrix<Complex64> {
    fn conjugate(&self) -> Self {
        let values = self.values().iter().map(|v| v.conj()).collect();
        CscMatrix::try_from_pattern_and_values(self.pattern().clone(), values)
            .expect("value count matches pattern by construction")
    }
}

/// Splits a sparse complex matrix into real and imaginary parts sharing the
/// original sparsity pattern.
pub(crate) trait RealImag {
    fn real_imag(&self) -> (CscMatrix<f64>, CscMatrix<f64>);
}

impl RealImag for CscMatrix<Complex64> {
    fn real_imag(&self) -> (CscMatrix<f64>, CscMatrix<f64>) {
        let re = self.values().iter().map(|v| v.re).collect();
        let im = self.values().iter().map(|v| v.im).collect();
        let real = CscMatrix::try_from_pattern_and_values(self.pattern().clone(), re)
            .expect("value count matches pattern by construction");
        let imag = CscMatrix::try_from_pattern_and_values(self.pattern().clone(), im)
            .expect("value count matches pattern by construction");
        (real, imag)
    }
}
