//! Reduced [`OdeSys`] implementation for iterative (Krylov-style) solvers.
//!
//! Iterative solvers keep their own preconditioning state and only need the
//! system for derivative and Jacobian evaluations, so this variant carries
//! just the parameter vector and the tolerances. Bounds, invariants and
//! specialization settings are the dense variant's business.

use crate::{
    dense::{SysParams, VecCb},
    status::OdeStatus,
    system::OdeSys,
    tolerance::Tolerance,
    Float,
};

/// ODE system for iterative solvers: parameter vector, absolute tolerances
/// and relative tolerance only.
pub struct IterativeSys {
    ny: usize,
    params: SysParams,
    /// Absolute tolerances, scalar or per-component.
    pub atol: Tolerance,
    /// Relative tolerance.
    pub rtol: Float,
    nfev: usize,
    njev: usize,
    rhs_cb: VecCb,
    jac_cb: Option<VecCb>,
}

impl IterativeSys {
    pub fn new(
        ny: usize,
        rhs: VecCb,
        params: Vec<Float>,
        atol: impl Into<Tolerance>,
        rtol: Float,
    ) -> Self {
        Self {
            ny,
            params: SysParams {
                p: params,
                p_cse: Vec::new(),
                special_settings: Vec::new(),
            },
            atol: atol.into(),
            rtol,
            nfev: 0,
            njev: 0,
            rhs_cb: rhs,
            jac_cb: None,
        }
    }

    /// Attach an analytic Jacobian (row-major, `ny * ny` contiguous).
    pub fn with_jac(mut self, jac: VecCb) -> Self {
        self.jac_cb = Some(jac);
        self
    }

    pub fn params(&self) -> &SysParams {
        &self.params
    }

    /// Number of `rhs` evaluations so far.
    pub fn nfev(&self) -> usize {
        self.nfev
    }

    /// Number of Jacobian evaluations so far.
    pub fn njev(&self) -> usize {
        self.njev
    }
}

impl OdeSys for IterativeSys {
    fn ny(&self) -> usize {
        self.ny
    }

    fn rhs(&mut self, x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus {
        self.nfev += 1;
        (self.rhs_cb)(x, y, &self.params, f)
    }

    fn dense_jac_rmaj(
        &mut self,
        x: Float,
        y: &[Float],
        _fy: Option<&[Float]>,
        jac: &mut [Float],
        ldim: usize,
        dfdx: Option<&mut [Float]>,
    ) -> OdeStatus {
        self.njev += 1;
        let n = self.ny;
        let cb = match &self.jac_cb {
            Some(cb) => cb,
            None => return OdeStatus::UnrecoverableError,
        };
        let status = if ldim == n {
            cb(x, y, &self.params, &mut jac[..n * n])
        } else {
            let mut scratch = vec![0.0; n * n];
            let status = cb(x, y, &self.params, &mut scratch);
            if status.is_success() {
                for i in 0..n {
                    jac[i * ldim..i * ldim + n].copy_from_slice(&scratch[i * n..(i + 1) * n]);
                }
            }
            status
        };
        if !status.is_success() {
            return status;
        }
        if dfdx.is_some() {
            return OdeStatus::UnrecoverableError;
        }
        status
    }

    fn prepare(&mut self, _x0: Float, _y0: &[Float]) -> OdeStatus {
        self.nfev = 0;
        self.njev = 0;
        OdeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_reduced_configuration() {
        let sys = IterativeSys::new(
            2,
            Box::new(|_x, y, p, f| {
                f[0] = p.p[0] * y[1];
                f[1] = -p.p[0] * y[0];
                OdeStatus::Success
            }),
            vec![2.0],
            [1e-6, 1e-7],
            1e-9,
        );
        assert_eq!(sys.ny(), 2);
        assert_eq!(sys.params().p, vec![2.0]);
        assert_eq!(sys.atol[1], 1e-7);
        assert_eq!(sys.rtol, 1e-9);
    }

    #[test]
    fn rhs_and_jac_count_calls() {
        let mut sys = IterativeSys::new(
            1,
            Box::new(|_x, y, _p, f| {
                f[0] = -y[0];
                OdeStatus::Success
            }),
            vec![],
            1e-8,
            1e-8,
        )
        .with_jac(Box::new(|_x, _y, _p, jac| {
            jac[0] = -1.0;
            OdeStatus::Success
        }));
        let mut f = [0.0];
        let mut jac = [0.0];
        assert!(sys.rhs(0.0, &[1.0], &mut f).is_success());
        assert!(sys
            .dense_jac_rmaj(0.0, &[1.0], None, &mut jac, 1, None)
            .is_success());
        assert_eq!((sys.nfev(), sys.njev()), (1, 1));
        assert_eq!(jac[0], -1.0);
    }
}
