//! High-level driver entry points: adaptive spans and predefined output
//! grids, with validated options.

use bon::Builder;

use crate::{
    error::Error,
    result::{Info, OdeResult},
    status::Status,
    steppers::{
        self,
        adaptive::{rk23_adaptive, AdaptiveConfig},
        StepperRun,
    },
    system::OdeSys,
    tolerance::Tolerance,
    Float,
};

/// Stepper selection for [`integrate_predefined`].
/// [`integrate_adaptive`] always uses the adaptive 3(2) driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Adaptive Runge-Kutta 3(2); output sampled from the dense interpolant.
    Adaptive,
    /// Forward Euler, one step per grid interval.
    EulerForward,
    /// Explicit midpoint, one step per grid interval.
    Midpoint,
    /// Classic fixed-step RK4.
    Rk4,
    /// Backward Euler (requires a Jacobian).
    EulerBackward,
    /// Trapezoidal rule (requires a Jacobian).
    Trapezoidal,
    /// Two-step BDF, fixed variable coefficients (requires a Jacobian).
    Bdf2,
}

#[derive(Builder)]
/// Options shared by the driver entry points.
pub struct Options {
    /// Stepper used by [`integrate_predefined`]. Default: `Adaptive`.
    #[builder(default = Method::Adaptive)]
    pub method: Method,
    /// Relative tolerance for the adaptive error control.
    #[builder(default = 1e-8, into)]
    pub rtol: Tolerance,
    /// Absolute tolerance for the adaptive error control.
    #[builder(default = 1e-8, into)]
    pub atol: Tolerance,
    /// Initial step size; `None` defers to [`OdeSys::get_dx0`] and then to
    /// an automatic guess.
    pub dx0: Option<Float>,
    /// Maximum step size, combined with [`OdeSys::get_dx_max`].
    pub dx_max: Option<Float>,
    /// Minimum step size before the run stops with `StepSizeTooSmall`.
    pub dx_min: Option<Float>,
    /// Maximum number of step attempts.
    #[builder(default = 100_000)]
    pub nmax: usize,
    /// Safety factor in step-size prediction.
    #[builder(default = 0.9)]
    pub safety_factor: Float,
    /// Step size ratio clamp: scale_min <= hnew/hold <= scale_max.
    #[builder(default = 0.2)]
    pub scale_min: Float,
    /// Step size ratio clamp: scale_min <= hnew/hold <= scale_max.
    #[builder(default = 5.0)]
    pub scale_max: Float,
    /// Stop at the first root crossing instead of integrating on.
    #[builder(default = false)]
    pub return_on_root: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options::builder().build()
    }
}

fn validate(opts: &Options, ny: usize, y0_len: usize) -> Vec<Error> {
    let mut errors = Vec::new();
    if opts.nmax == 0 {
        errors.push(Error::NMaxMustBePositive(opts.nmax));
    }
    if opts.rtol.min_component() <= 0.0 {
        errors.push(Error::InvalidTolerance(opts.rtol.min_component()));
    }
    if opts.atol.min_component() <= 0.0 {
        errors.push(Error::InvalidTolerance(opts.atol.min_component()));
    }
    // Vector tolerances are indexed per component; note an empty vector has
    // min_component() == +inf, so positivity alone does not catch it.
    for tol in [&opts.rtol, &opts.atol] {
        if let Tolerance::Vector(vs) = tol {
            if vs.len() != ny {
                errors.push(Error::ToleranceDimensionMismatch(ny, vs.len()));
            }
        }
    }
    if opts.safety_factor >= 1.0 || opts.safety_factor <= 1e-4 {
        errors.push(Error::SafetyFactorOutOfRange(opts.safety_factor));
    }
    if opts.scale_min <= 0.0 || opts.scale_max <= opts.scale_min {
        errors.push(Error::InvalidScaleFactors(opts.scale_min, opts.scale_max));
    }
    if let Some(dx0) = opts.dx0 {
        if dx0 == 0.0 || !dx0.is_finite() {
            errors.push(Error::InvalidStepSize(dx0));
        }
    }
    if y0_len != ny {
        errors.push(Error::DimensionMismatch(ny, y0_len));
    }
    errors
}

/// Integrate `sys` from `x0` to `xend`, recording every accepted step.
///
/// Validation problems are returned as `Err`; runtime failures terminate
/// the run early and are reported through [`Info::status`] with the partial
/// trajectory preserved.
pub fn integrate_adaptive<S>(
    sys: &mut S,
    x0: Float,
    xend: Float,
    y0: &[Float],
    opts: &Options,
) -> Result<OdeResult, Vec<Error>>
where
    S: OdeSys,
{
    let mut errors = validate(opts, sys.ny(), y0.len());
    if x0 == xend || !(xend - x0).is_finite() {
        errors.push(Error::InvalidStepSize(xend - x0));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    if !sys.prepare(x0, y0).is_success() {
        return Ok(failed_at_start(x0, y0));
    }

    let cfg = AdaptiveConfig {
        rtol: &opts.rtol,
        atol: &opts.atol,
        dx0: opts.dx0,
        dx_max: opts.dx_max,
        dx_min: opts.dx_min,
        nmax: opts.nmax,
        safety_factor: opts.safety_factor,
        scale_min: opts.scale_min,
        scale_max: opts.scale_max,
        return_on_root: opts.return_on_root,
        sample_at: None,
    };
    let out = rk23_adaptive(sys, x0, xend, y0, &cfg);
    Ok(adaptive_result(out))
}

/// Integrate `sys` over the given output grid `xout` (at least two points,
/// monotone in the direction of integration).
///
/// With [`Method::Adaptive`] the states are sampled from the dense
/// interpolant; the fixed-step methods take one step per grid interval, as
/// the demonstration integrators do. On an early stop the trajectory is
/// truncated at the last reached grid point.
pub fn integrate_predefined<S>(
    sys: &mut S,
    xout: &[Float],
    y0: &[Float],
    opts: &Options,
) -> Result<OdeResult, Vec<Error>>
where
    S: OdeSys,
{
    let mut errors = validate(opts, sys.ny(), y0.len());
    if xout.len() < 2 {
        errors.push(Error::XoutTooShort(xout.len()));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let x0 = xout[0];
    if !sys.prepare(x0, y0).is_success() {
        return Ok(failed_at_start(x0, y0));
    }

    if opts.method == Method::Adaptive {
        let xend = xout[xout.len() - 1];
        let cfg = AdaptiveConfig {
            rtol: &opts.rtol,
            atol: &opts.atol,
            dx0: opts.dx0,
            dx_max: opts.dx_max,
            dx_min: opts.dx_min,
            nmax: opts.nmax,
            safety_factor: opts.safety_factor,
            scale_min: opts.scale_min,
            scale_max: opts.scale_max,
            return_on_root: opts.return_on_root,
            sample_at: Some(xout),
        };
        let out = rk23_adaptive(sys, x0, xend, y0, &cfg);
        return Ok(adaptive_result(out));
    }

    let run = match opts.method {
        Method::EulerForward => steppers::euler_forward(sys, xout, y0),
        Method::Midpoint => steppers::midpoint(sys, xout, y0),
        Method::Rk4 => steppers::rk4(sys, xout, y0),
        Method::EulerBackward => steppers::euler_backward(sys, xout, y0),
        Method::Trapezoidal => steppers::trapezoidal(sys, xout, y0),
        Method::Bdf2 => steppers::bdf2(sys, xout, y0),
        Method::Adaptive => unreachable!("handled above"),
    };
    Ok(sweep_result(xout, run))
}

fn failed_at_start(x0: Float, y0: &[Float]) -> OdeResult {
    OdeResult {
        xout: vec![x0],
        yout: vec![y0.to_vec()],
        root_xvals: Vec::new(),
        root_indices: Vec::new(),
        info: Info {
            nfev: 0,
            njev: 0,
            nlu: 0,
            nrev: 0,
            naccpt: 0,
            nrejct: 0,
            status: Status::CallbackFailure,
            success: false,
        },
    }
}

fn adaptive_result(out: steppers::AdaptiveOutcome) -> OdeResult {
    let success = matches!(out.status, Status::Success | Status::RootFound);
    OdeResult {
        xout: out.xout,
        yout: out.yout,
        root_xvals: out.root_xvals,
        root_indices: out.root_indices,
        info: Info {
            nfev: out.nfev,
            njev: 0,
            nlu: 0,
            nrev: out.nrev,
            naccpt: out.naccpt,
            nrejct: out.nrejct,
            status: out.status,
            success,
        },
    }
}

fn sweep_result(xout: &[Float], run: StepperRun) -> OdeResult {
    let reached = run.yout.len();
    let success = run.status == Status::Success;
    OdeResult {
        xout: xout[..reached].to_vec(),
        yout: run.yout,
        root_xvals: Vec::new(),
        root_indices: Vec::new(),
        info: Info {
            nfev: run.nfev,
            njev: run.njev,
            nlu: run.nlu,
            nrev: 0,
            naccpt: reached - 1,
            nrejct: 0,
            status: run.status,
            success,
        },
    }
}
