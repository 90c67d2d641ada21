//! Ready-made [`OdeSys`] implementation for direct dense/banded solvers.
//!
//! [`DenseSys`] binds user-supplied right-hand-side, Jacobian and root
//! callbacks to the driver-facing trait and layers the run bookkeeping on
//! top: bounds checking, invariant drift detection, step-size capping and
//! optional diagnostic recording.

use crate::{
    record::{fpe_flags, RecordFlags, Records},
    status::OdeStatus,
    system::OdeSys,
    tolerance::Tolerance,
    Float,
};

/// Read-only parameter block handed to every user callback.
#[derive(Debug, Clone, Default)]
pub struct SysParams {
    /// Parameter vector.
    pub p: Vec<Float>,
    /// Common-subexpression cache, precomputed from `p`.
    pub p_cse: Vec<Float>,
    /// Free-form settings for user specialization of the callbacks.
    pub special_settings: Vec<Float>,
}

/// Vector-valued callback: write results for `(x, y)` into the output
/// buffer. Used for the rhs, the Jacobian (row-major, `ny * ny`), `dfdx`,
/// roots and invariants.
pub type VecCb = Box<dyn Fn(Float, &[Float], &SysParams, &mut [Float]) -> OdeStatus + Send>;

/// Scalar-valued callback, used for the `dx0` and `dx_max` overrides.
pub type ScalarCb = Box<dyn Fn(Float, &[Float], &SysParams) -> Float + Send>;

/// Callback precomputing the common-subexpression cache from the parameter
/// vector. Re-run whenever the parameters are replaced.
pub type CseCb = Box<dyn Fn(&[Float], &mut [Float]) + Send>;

/// ODE system for direct dense solvers.
///
/// Constructed once per integration run from a parameter vector and the
/// configuration scalars; mutated only through callback invocations during
/// integration. Array lengths are fixed at construction.
pub struct DenseSys {
    ny: usize,
    nroots: usize,
    ninvar: usize,
    params: SysParams,
    /// Absolute tolerances, scalar or per-component.
    pub atol: Tolerance,
    /// Relative tolerance.
    pub rtol: Float,
    /// Per-component lower bounds; empty means unbounded.
    pub lower_bounds: Vec<Float>,
    /// Per-component upper bounds; empty means unbounded.
    pub upper_bounds: Vec<Float>,
    /// Report `RecoverableError` from `rhs` when the state leaves the bounds.
    pub error_outside_bounds: bool,
    /// Invariant drift threshold; a positive value enables the check.
    pub max_invariant_violation: Float,
    /// Step-size cap factor consumed by `get_dx_max`; non-positive disables.
    pub get_dx_max_factor: Float,
    /// Diagnostic switches.
    pub flags: RecordFlags,
    invar0: Vec<Float>,
    records: Records,
    rhs_cb: VecCb,
    jac_cb: Option<VecCb>,
    dfdx_cb: Option<VecCb>,
    roots_cb: Option<VecCb>,
    invariants_cb: Option<VecCb>,
    cse_cb: Option<CseCb>,
    dx0_cb: Option<ScalarCb>,
    dx_max_cb: Option<ScalarCb>,
}

impl DenseSys {
    /// Create a system of dimension `ny` from its right-hand side.
    ///
    /// The remaining configuration is attached with the `with_*` builders.
    pub fn new(
        ny: usize,
        rhs: VecCb,
        params: Vec<Float>,
        atol: impl Into<Tolerance>,
        rtol: Float,
    ) -> Self {
        Self {
            ny,
            nroots: 0,
            ninvar: 0,
            params: SysParams {
                p: params,
                p_cse: Vec::new(),
                special_settings: Vec::new(),
            },
            atol: atol.into(),
            rtol,
            lower_bounds: Vec::new(),
            upper_bounds: Vec::new(),
            error_outside_bounds: false,
            max_invariant_violation: 0.0,
            get_dx_max_factor: 0.0,
            flags: RecordFlags::default(),
            invar0: Vec::new(),
            records: Records::default(),
            rhs_cb: rhs,
            jac_cb: None,
            dfdx_cb: None,
            roots_cb: None,
            invariants_cb: None,
            cse_cb: None,
            dx0_cb: None,
            dx_max_cb: None,
        }
    }

    /// Attach an analytic Jacobian (row-major, `ny * ny` contiguous).
    pub fn with_jac(mut self, jac: VecCb) -> Self {
        self.jac_cb = Some(jac);
        self
    }

    /// Attach `∂f/∂x` (length `ny`), used when a driver asks for `dfdx`.
    pub fn with_dfdx(mut self, dfdx: VecCb) -> Self {
        self.dfdx_cb = Some(dfdx);
        self
    }

    /// Attach `nroots` root functions.
    pub fn with_roots(mut self, nroots: usize, roots: VecCb) -> Self {
        self.nroots = nroots;
        self.roots_cb = Some(roots);
        self
    }

    /// Attach `ninvar` invariant functions and the drift threshold that
    /// turns the per-`rhs`-call check on.
    pub fn with_invariants(mut self, ninvar: usize, cb: VecCb, max_violation: Float) -> Self {
        self.ninvar = ninvar;
        self.invariants_cb = Some(cb);
        self.max_invariant_violation = max_violation;
        self
    }

    /// Constrain the state to `[lower, upper]` component-wise; `rhs` reports
    /// `RecoverableError` outside. Empty slices leave that side unbounded.
    pub fn with_bounds(mut self, lower: Vec<Float>, upper: Vec<Float>) -> Self {
        self.lower_bounds = lower;
        self.upper_bounds = upper;
        self.error_outside_bounds = true;
        self
    }

    /// Precompute a common-subexpression cache of length `ncse` from the
    /// parameter vector. Runs once now and again on [`set_params`](Self::set_params).
    pub fn with_cse(mut self, ncse: usize, cb: CseCb) -> Self {
        self.params.p_cse = vec![0.0; ncse];
        cb(&self.params.p, &mut self.params.p_cse);
        self.cse_cb = Some(cb);
        self
    }

    /// Free-form numeric settings forwarded verbatim to the callbacks.
    pub fn with_special_settings(mut self, settings: Vec<Float>) -> Self {
        self.params.special_settings = settings;
        self
    }

    /// Cap the step size at `factor * |x|`.
    pub fn with_dx_max_factor(mut self, factor: Float) -> Self {
        self.get_dx_max_factor = factor;
        self
    }

    /// Override the initial step suggestion.
    pub fn with_dx0(mut self, cb: ScalarCb) -> Self {
        self.dx0_cb = Some(cb);
        self
    }

    /// Override the step-size cap (takes precedence over the factor).
    pub fn with_dx_max(mut self, cb: ScalarCb) -> Self {
        self.dx_max_cb = Some(cb);
        self
    }

    /// Set the diagnostic switches.
    pub fn with_flags(mut self, flags: RecordFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The parameter block as seen by the callbacks.
    pub fn params(&self) -> &SysParams {
        &self.params
    }

    /// Replace the parameter vector and refresh the cse cache.
    pub fn set_params(&mut self, p: Vec<Float>) {
        self.params.p = p;
        if let Some(cb) = &self.cse_cb {
            cb(&self.params.p, &mut self.params.p_cse);
        }
    }

    /// Diagnostics captured since the last [`prepare`](OdeSys::prepare).
    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Invariant baseline captured at the start of the current run.
    pub fn invariant_baseline(&self) -> &[Float] {
        &self.invar0
    }

    /// Absolute deviation of each invariant from its baseline at `(x, y)`.
    /// `None` when no invariants are attached or the baseline has not been
    /// captured yet.
    pub fn invariant_violations(&self, x: Float, y: &[Float]) -> Option<Vec<Float>> {
        let cb = self.invariants_cb.as_ref()?;
        if self.invar0.len() != self.ninvar {
            return None;
        }
        let mut current = vec![0.0; self.ninvar];
        if !cb(x, y, &self.params, &mut current).is_success() {
            return None;
        }
        for (c, base) in current.iter_mut().zip(&self.invar0) {
            *c = (*c - base).abs();
        }
        Some(current)
    }

    fn out_of_bounds(&self, y: &[Float]) -> bool {
        for (i, &yi) in y.iter().enumerate() {
            if let Some(&lo) = self.lower_bounds.get(i) {
                if yi < lo {
                    return true;
                }
            }
            if let Some(&hi) = self.upper_bounds.get(i) {
                if yi > hi {
                    return true;
                }
            }
        }
        false
    }

    fn invariants_violated(&self, x: Float, y: &[Float]) -> bool {
        match self.invariant_violations(x, y) {
            Some(violations) => violations
                .iter()
                .any(|&v| v > self.max_invariant_violation),
            None => false,
        }
    }
}

impl OdeSys for DenseSys {
    fn ny(&self) -> usize {
        self.ny
    }

    fn nroots(&self) -> usize {
        self.nroots
    }

    fn rhs(&mut self, x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus {
        self.records.nfev += 1;
        if self.flags.record_rhs_xvals {
            self.records.rhs_xvals.push(x);
        }
        if self.error_outside_bounds && self.out_of_bounds(y) {
            return OdeStatus::RecoverableError;
        }
        if self.max_invariant_violation > 0.0 && self.invariants_violated(x, y) {
            return OdeStatus::RecoverableError;
        }
        let status = (self.rhs_cb)(x, y, &self.params, f);
        if self.flags.record_fpe {
            self.records.fpes.push(fpe_flags(f));
        }
        if status.is_success() && !f.iter().all(|v| v.is_finite()) {
            return OdeStatus::RecoverableError;
        }
        status
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
        self.records.njev += 1;
        if self.flags.record_jac_xvals {
            self.records.jac_xvals.push(x);
        }
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
        if let Some(dfdx) = dfdx {
            match &self.dfdx_cb {
                Some(cb) => return cb(x, y, &self.params, dfdx),
                None if self.flags.autonomous_exprs => dfdx.fill(0.0),
                None => return OdeStatus::UnrecoverableError,
            }
        }
        status
    }

    fn roots(&mut self, x: Float, y: &[Float], out: &mut [Float]) -> OdeStatus {
        self.records.nrev += 1;
        match &self.roots_cb {
            Some(cb) => cb(x, y, &self.params, out),
            None => OdeStatus::Success,
        }
    }

    fn get_dx0(&self, x: Float, y: &[Float]) -> Float {
        match &self.dx0_cb {
            Some(cb) => cb(x, y, &self.params),
            None => 0.0,
        }
    }

    fn get_dx_max(&self, x: Float, y: &[Float]) -> Float {
        if let Some(cb) = &self.dx_max_cb {
            return cb(x, y, &self.params);
        }
        if self.get_dx_max_factor > 0.0 {
            self.get_dx_max_factor * x.abs()
        } else {
            Float::INFINITY
        }
    }

    fn prepare(&mut self, x0: Float, y0: &[Float]) -> OdeStatus {
        self.records.clear();
        if self.max_invariant_violation > 0.0 {
            if let Some(cb) = &self.invariants_cb {
                let mut baseline = vec![0.0; self.ninvar];
                let status = cb(x0, y0, &self.params, &mut baseline);
                if !status.is_success() {
                    return status;
                }
                self.invar0 = baseline;
            }
        }
        OdeStatus::Success
    }

    fn record_order(&mut self, order: usize) {
        if self.flags.record_order {
            self.records.orders.push(order);
        }
    }
}
