//! Optional per-instance diagnostic recording.
//!
//! The binding layer of the original tooling lets a caller flip a handful of
//! flags on a system instance to capture where the integrator sampled the
//! right-hand side and the Jacobian, which method order each accepted step
//! used, and whether a callback produced non-finite values. The flags are
//! all off by default; recording costs one `Vec` push per call when on.

use crate::Float;

/// Bit set in an fpe record when the output buffer contained a NaN.
pub const FPE_NAN: u8 = 1;
/// Bit set in an fpe record when the output buffer contained an infinity.
pub const FPE_INF: u8 = 2;

/// Per-instance diagnostic switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFlags {
    /// The expressions do not depend on the independent variable; a missing
    /// `dfdx` callback then legitimately means "all zeros".
    pub autonomous_exprs: bool,
    /// Record the abscissa of every `rhs` call.
    pub record_rhs_xvals: bool,
    /// Record the abscissa of every Jacobian call.
    pub record_jac_xvals: bool,
    /// Record the method order of every accepted step.
    pub record_order: bool,
    /// Classify every `rhs` output buffer for non-finite values.
    pub record_fpe: bool,
}

/// Data captured under [`RecordFlags`], plus the call counters that are
/// always maintained.
#[derive(Debug, Clone, Default)]
pub struct Records {
    /// Number of `rhs` evaluations.
    pub nfev: usize,
    /// Number of Jacobian evaluations.
    pub njev: usize,
    /// Number of `roots` evaluations.
    pub nrev: usize,
    pub rhs_xvals: Vec<Float>,
    pub jac_xvals: Vec<Float>,
    pub orders: Vec<usize>,
    pub fpes: Vec<u8>,
}

impl Records {
    pub fn clear(&mut self) {
        self.nfev = 0;
        self.njev = 0;
        self.nrev = 0;
        self.rhs_xvals.clear();
        self.jac_xvals.clear();
        self.orders.clear();
        self.fpes.clear();
    }
}

/// Classify a freshly written output buffer. 0 means every value is finite.
pub fn fpe_flags(buf: &[Float]) -> u8 {
    let mut flags = 0;
    for v in buf {
        if v.is_nan() {
            flags |= FPE_NAN;
        } else if v.is_infinite() {
            flags |= FPE_INF;
        }
    }
    flags
}
