//! The ODE system abstraction: the entry points a driver calls back into
//! during time-stepping.

use crate::{status::OdeStatus, Float};

/// An ODE system `y' = f(x, y)` as seen by an integration driver.
///
/// Implementors fill caller-owned output buffers and report an
/// [`OdeStatus`]; a `RecoverableError` tells an adaptive driver to retry
/// the step with a smaller step size.
///
/// The two Jacobian entry points differ only in memory layout. Dense direct
/// solvers address the Jacobian as `ldim`-strided columns or rows;
/// `ldim >= ny()` always holds.
///
/// # Example
///
/// ```ignore
/// struct Decay { k: f64 }
/// impl OdeSys for Decay {
///     fn ny(&self) -> usize { 1 }
///     fn rhs(&mut self, _x: f64, y: &[f64], f: &mut [f64]) -> OdeStatus {
///         f[0] = -self.k * y[0];
///         OdeStatus::Success
///     }
/// }
/// ```
pub trait OdeSys {
    /// Dimension of the state vector.
    fn ny(&self) -> usize;

    /// Number of root functions reported by [`roots`](Self::roots).
    fn nroots(&self) -> usize {
        0
    }

    /// Derivative of the state: write `f(x, y)` into `f` (length `ny()`).
    fn rhs(&mut self, x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus;

    /// Dense Jacobian in row-major layout: entry `(i, j) = ∂f_i/∂y_j` goes
    /// to `jac[i * ldim + j]`.
    ///
    /// `fy` optionally passes the derivative already computed at `(x, y)` so
    /// finite-difference implementations can reuse it. When `dfdx` is
    /// `Some`, the partial derivative of `f` with respect to `x` must be
    /// written there as well.
    fn dense_jac_rmaj(
        &mut self,
        x: Float,
        y: &[Float],
        fy: Option<&[Float]>,
        jac: &mut [Float],
        ldim: usize,
        dfdx: Option<&mut [Float]>,
    ) -> OdeStatus {
        let _ = (x, y, fy, jac, ldim, dfdx);
        OdeStatus::UnrecoverableError
    }

    /// Dense Jacobian in column-major layout: entry `(i, j)` goes to
    /// `jac[j * ldim + i]`.
    ///
    /// The default evaluates [`dense_jac_rmaj`](Self::dense_jac_rmaj) into
    /// scratch and transposes.
    fn dense_jac_cmaj(
        &mut self,
        x: Float,
        y: &[Float],
        fy: Option<&[Float]>,
        jac: &mut [Float],
        ldim: usize,
        dfdx: Option<&mut [Float]>,
    ) -> OdeStatus {
        let n = self.ny();
        let mut scratch = vec![0.0; n * n];
        let status = self.dense_jac_rmaj(x, y, fy, &mut scratch, n, dfdx);
        if !status.is_success() {
            return status;
        }
        for i in 0..n {
            for j in 0..n {
                jac[j * ldim + i] = scratch[i * n + j];
            }
        }
        status
    }

    /// Root functions whose zero crossings the driver should locate. Write
    /// `nroots()` values into `out`.
    fn roots(&mut self, x: Float, y: &[Float], out: &mut [Float]) -> OdeStatus {
        let _ = (x, y, out);
        OdeStatus::Success
    }

    /// Suggested initial step size; `0.0` lets the driver choose.
    fn get_dx0(&self, x: Float, y: &[Float]) -> Float {
        let _ = (x, y);
        0.0
    }

    /// Upper bound on the step size at `(x, y)`; a non-positive or infinite
    /// value means uncapped.
    fn get_dx_max(&self, x: Float, y: &[Float]) -> Float {
        let _ = (x, y);
        Float::INFINITY
    }

    /// Called once by a driver before stepping begins. Implementations may
    /// capture baselines (e.g. invariants at the initial state) or reset
    /// per-run diagnostics.
    fn prepare(&mut self, x0: Float, y0: &[Float]) -> OdeStatus {
        let _ = (x0, y0);
        OdeStatus::Success
    }

    /// Diagnostic hook: the driver reports the method order used for an
    /// accepted step.
    fn record_order(&mut self, order: usize) {
        let _ = order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoByTwo;

    impl OdeSys for TwoByTwo {
        fn ny(&self) -> usize {
            2
        }

        fn rhs(&mut self, _x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus {
            f[0] = y[1];
            f[1] = -y[0];
            OdeStatus::Success
        }

        fn dense_jac_rmaj(
            &mut self,
            _x: Float,
            _y: &[Float],
            _fy: Option<&[Float]>,
            jac: &mut [Float],
            ldim: usize,
            _dfdx: Option<&mut [Float]>,
        ) -> OdeStatus {
            jac[0] = 1.0;
            jac[1] = 2.0;
            jac[ldim] = 3.0;
            jac[ldim + 1] = 4.0;
            OdeStatus::Success
        }
    }

    #[test]
    fn default_cmaj_is_transpose_of_rmaj() {
        let mut sys = TwoByTwo;
        let ldim = 3; // deliberately larger than ny
        let mut cmaj = vec![0.0; ldim * 2];
        let status = sys.dense_jac_cmaj(0.0, &[0.0, 0.0], None, &mut cmaj, ldim, None);
        assert!(status.is_success());
        assert_eq!(cmaj[0], 1.0); // (0,0)
        assert_eq!(cmaj[1], 3.0); // (1,0)
        assert_eq!(cmaj[ldim], 2.0); // (0,1)
        assert_eq!(cmaj[ldim + 1], 4.0); // (1,1)
    }

    #[test]
    fn trait_defaults() {
        let mut sys = TwoByTwo;
        assert_eq!(sys.nroots(), 0);
        assert_eq!(sys.get_dx0(0.0, &[1.0, 0.0]), 0.0);
        assert!(sys.get_dx_max(0.0, &[1.0, 0.0]).is_infinite());
        assert!(sys.prepare(0.0, &[1.0, 0.0]).is_success());
        let mut out = [0.0; 0];
        assert!(sys.roots(0.0, &[1.0, 0.0], &mut out).is_success());
    }
}
