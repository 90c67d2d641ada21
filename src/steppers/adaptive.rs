//! Bogacki-Shampine 3(2) adaptive-step driver with dense output.
//!
//! The embedded pair estimates the local error and adjusts the step size;
//! a cubic interpolant over each accepted step provides dense output, which
//! is reused for sampling at caller-requested abscissae and for bisection
//! refinement of root crossings. A `RecoverableError` from the system
//! rejects the step and halves the step size, so bounds violations and
//! invariant drift push the driver back instead of aborting it.

use crate::{
    hinit::hinit,
    status::{OdeStatus, Status},
    system::OdeSys,
    tolerance::Tolerance,
    Float,
};

/// Resolved configuration for one adaptive run.
pub struct AdaptiveConfig<'a> {
    pub rtol: &'a Tolerance,
    pub atol: &'a Tolerance,
    /// Initial step; falls back to `get_dx0`, then to an automatic guess.
    pub dx0: Option<Float>,
    /// Hard step cap, combined with `get_dx_max`.
    pub dx_max: Option<Float>,
    /// Resolution limit; below it the run stops with `StepSizeTooSmall`.
    pub dx_min: Option<Float>,
    pub nmax: usize,
    pub safety_factor: Float,
    pub scale_min: Float,
    pub scale_max: Float,
    pub return_on_root: bool,
    /// When set, record interpolated states at these abscissae instead of
    /// the accepted steps. Must be sorted in the direction of integration.
    pub sample_at: Option<&'a [Float]>,
}

/// Everything one adaptive run produced.
#[derive(Debug, Clone)]
pub struct AdaptiveOutcome {
    pub xout: Vec<Float>,
    pub yout: Vec<Vec<Float>>,
    pub root_xvals: Vec<Float>,
    pub root_indices: Vec<usize>,
    pub nfev: usize,
    pub nrev: usize,
    pub naccpt: usize,
    pub nrejct: usize,
    pub status: Status,
}

enum StageEval {
    Ok,
    Recoverable,
    Fatal,
}

/// Integrate from `x0` to `xend` with adaptive steps.
pub fn rk23_adaptive<S>(
    sys: &mut S,
    x0: Float,
    xend: Float,
    y0: &[Float],
    cfg: &AdaptiveConfig<'_>,
) -> AdaptiveOutcome
where
    S: OdeSys,
{
    let n = y0.len();
    let nroots = sys.nroots();
    let direction = (xend - x0).signum();
    let error_exponent = -1.0 / 3.0;

    let mut out = AdaptiveOutcome {
        xout: Vec::new(),
        yout: Vec::new(),
        root_xvals: Vec::new(),
        root_indices: Vec::new(),
        nfev: 0,
        nrev: 0,
        naccpt: 0,
        nrejct: 0,
        status: Status::Success,
    };

    let mut x = x0;
    let mut y = y0.to_vec();
    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut yt = vec![0.0; n];
    let mut ye = vec![0.0; n];
    let mut cont = vec![0.0; 4 * n];
    let mut g_old = vec![0.0; nroots];
    let mut g_new = vec![0.0; nroots];

    // Emitted output: either every accepted step, or interpolated samples.
    let samples = cfg.sample_at.unwrap_or(&[]);
    let mut si = 0;
    if cfg.sample_at.is_some() {
        while si < samples.len() && (samples[si] - x0) * direction <= 0.0 {
            out.xout.push(samples[si]);
            out.yout.push(y.clone());
            si += 1;
        }
    } else {
        out.xout.push(x0);
        out.yout.push(y.clone());
    }

    out.nfev += 1;
    if !sys.rhs(x, &y, &mut k1).is_success() {
        out.status = Status::CallbackFailure;
        return out;
    }
    if nroots > 0 {
        out.nrev += 1;
        if !sys.roots(x, &y, &mut g_old).is_success() {
            out.status = Status::CallbackFailure;
            return out;
        }
    }

    let hmax = cfg.dx_max.unwrap_or_else(|| (xend - x0).abs());
    let mut h = match cfg.dx0 {
        Some(dx0) => dx0.abs() * direction,
        None => {
            let dx0 = sys.get_dx0(x, &y);
            if dx0 != 0.0 {
                dx0.abs() * direction
            } else {
                out.nfev += 1;
                hinit(
                    sys, x, &y, direction, &k1, &mut k2, &mut k3, 3, hmax, cfg.atol, cfg.rtol,
                )
            }
        }
    };
    h = cap_step(sys, h, x, &y, cfg, direction);

    let mut attempts = 0;
    loop {
        if attempts >= cfg.nmax {
            out.status = Status::NeedLargerNMax;
            break;
        }
        attempts += 1;

        let hmin = cfg
            .dx_min
            .unwrap_or(10.0 * Float::EPSILON * x.abs().max(1.0));
        if h.abs() < hmin {
            out.status = Status::StepSizeTooSmall;
            break;
        }

        // Last step adjustment
        if (x + h - xend) * direction > 0.0 {
            h = xend - x;
        }

        match stages(sys, x, h, &y, &k1, &mut k2, &mut k3, &mut k4, &mut yt, &mut out.nfev) {
            StageEval::Ok => {}
            StageEval::Recoverable => {
                out.nrejct += 1;
                h *= 0.5;
                continue;
            }
            StageEval::Fatal => {
                out.status = Status::CallbackFailure;
                break;
            }
        }

        // Error estimate from the embedded 2nd order solution
        let mut err = 0.0;
        for i in 0..n {
            ye[i] = h * (E1 * k1[i] + E2 * k2[i] + E3 * k3[i] + E4 * k4[i]);
            let tol = cfg.atol[i] + cfg.rtol[i] * yt[i].abs().max(y[i].abs());
            err += (ye[i] / tol) * (ye[i] / tol);
        }
        err = (err / n as Float).sqrt();

        if err <= 1.0 {
            // Step accepted
            out.naccpt += 1;
            let xold = x;
            ye.copy_from_slice(&y);
            y.copy_from_slice(&yt);
            x += h;

            // Dense output coefficients over [xold, x]
            cont[0..n].copy_from_slice(&ye);
            for i in 0..n {
                cont[n + i] = k1[i];
                cont[2 * n + i] = D21 * k1[i] + D22 * k2[i] + D23 * k3[i] + D24 * k4[i];
                cont[3 * n + i] = D31 * k1[i] + D32 * k2[i] + D33 * k3[i] + D34 * k4[i];
            }

            // Root detection on the accepted step
            let mut stop_at_root: Option<Float> = None;
            if nroots > 0 {
                out.nrev += 1;
                if !sys.roots(x, &y, &mut g_new).is_success() {
                    out.status = Status::CallbackFailure;
                    break;
                }
                let mut crossings: Vec<(Float, usize)> = Vec::new();
                for i in 0..nroots {
                    if g_new[i] == 0.0 {
                        crossings.push((x, i));
                    } else if g_old[i] * g_new[i] < 0.0 {
                        match refine_root(
                            sys, i, xold, x, g_old[i], &cont, h, &mut out.nrev,
                        ) {
                            Some(xr) => crossings.push((xr, i)),
                            None => {
                                out.status = Status::CallbackFailure;
                                break;
                            }
                        }
                    }
                }
                if out.status == Status::CallbackFailure {
                    break;
                }
                crossings.sort_by(|a, b| {
                    ((a.0 - b.0) * direction)
                        .partial_cmp(&0.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                for &(xr, i) in &crossings {
                    out.root_xvals.push(xr);
                    out.root_indices.push(i);
                }
                if cfg.return_on_root {
                    if let Some(&(xr, _)) = crossings.first() {
                        stop_at_root = Some(xr);
                    }
                }
                g_old.copy_from_slice(&g_new);
            }

            sys.record_order(3);

            // Emit output up to the end of this step (or the stopping root)
            let x_limit = stop_at_root.unwrap_or(x);
            if cfg.sample_at.is_some() {
                while si < samples.len() && (samples[si] - x_limit) * direction <= 0.0 {
                    let mut yi = vec![0.0; n];
                    contrk23(samples[si], &mut yi, &cont, xold, h);
                    out.xout.push(samples[si]);
                    out.yout.push(yi);
                    si += 1;
                }
            }
            if let Some(xr) = stop_at_root {
                let mut yr = vec![0.0; n];
                contrk23(xr, &mut yr, &cont, xold, h);
                if cfg.sample_at.is_none() {
                    out.xout.push(xr);
                    out.yout.push(yr);
                }
                out.status = Status::RootFound;
                break;
            }
            if cfg.sample_at.is_none() {
                out.xout.push(x);
                out.yout.push(y.clone());
            }

            // Reuse the last derivative evaluation for the next step.
            k1.copy_from_slice(&k4);

            // Normal exit
            if x == xend {
                break;
            }

            // Adjust step size
            h *= (cfg.safety_factor * err.powf(error_exponent))
                .min(cfg.scale_max)
                .max(cfg.scale_min);
            if h.abs() > hmax {
                h = hmax * direction;
            }
            h = cap_step(sys, h, x, &y, cfg, direction);
        } else {
            // Step rejected
            out.nrejct += 1;
            h *= (cfg.safety_factor * err.powf(error_exponent))
                .min(1.0)
                .max(cfg.scale_min);
        }
    }

    out
}

#[allow(clippy::too_many_arguments)]
fn stages<S>(
    sys: &mut S,
    x: Float,
    h: Float,
    y: &[Float],
    k1: &[Float],
    k2: &mut [Float],
    k3: &mut [Float],
    k4: &mut [Float],
    yt: &mut [Float],
    nfev: &mut usize,
) -> StageEval
where
    S: OdeSys,
{
    let n = y.len();

    for i in 0..n {
        yt[i] = y[i] + h * A21 * k1[i];
    }
    *nfev += 1;
    match sys.rhs(x + C2 * h, yt, k2) {
        OdeStatus::Success => {}
        OdeStatus::RecoverableError => return StageEval::Recoverable,
        OdeStatus::UnrecoverableError => return StageEval::Fatal,
    }

    for i in 0..n {
        yt[i] = y[i] + h * A32 * k2[i];
    }
    *nfev += 1;
    match sys.rhs(x + C3 * h, yt, k3) {
        OdeStatus::Success => {}
        OdeStatus::RecoverableError => return StageEval::Recoverable,
        OdeStatus::UnrecoverableError => return StageEval::Fatal,
    }

    // Trial solution and its derivative (reused as k1 when accepted)
    for i in 0..n {
        yt[i] = y[i] + h * (B1 * k1[i] + B2 * k2[i] + B3 * k3[i]);
    }
    *nfev += 1;
    match sys.rhs(x + h, yt, k4) {
        OdeStatus::Success => StageEval::Ok,
        OdeStatus::RecoverableError => StageEval::Recoverable,
        OdeStatus::UnrecoverableError => StageEval::Fatal,
    }
}

/// Clamp `h` against the system's step cap and the configured maximum.
fn cap_step<S>(
    sys: &mut S,
    h: Float,
    x: Float,
    y: &[Float],
    cfg: &AdaptiveConfig<'_>,
    direction: Float,
) -> Float
where
    S: OdeSys,
{
    let mut cap = cfg.dx_max.unwrap_or(Float::INFINITY);
    let sys_cap = sys.get_dx_max(x, y);
    if sys_cap > 0.0 && sys_cap.is_finite() {
        cap = cap.min(sys_cap);
    }
    if cap.is_finite() && h.abs() > cap {
        cap * direction
    } else {
        h
    }
}

/// Bisect a sign change of root function `i` inside one accepted step,
/// evaluating the root function on the dense interpolant.
fn refine_root<S>(
    sys: &mut S,
    i: usize,
    mut lo: Float,
    mut hi: Float,
    mut g_lo: Float,
    cont: &[Float],
    h: Float,
    nrev: &mut usize,
) -> Option<Float>
where
    S: OdeSys,
{
    let n = cont.len() / 4;
    let nroots = sys.nroots();
    let mut yi = vec![0.0; n];
    let mut g = vec![0.0; nroots];
    let xold = lo;
    for _ in 0..80 {
        let mid = 0.5 * (lo + hi);
        if mid == lo || mid == hi {
            break;
        }
        contrk23(mid, &mut yi, cont, xold, h);
        *nrev += 1;
        if !sys.roots(mid, &yi, &mut g).is_success() {
            return None;
        }
        if g[i] == 0.0 {
            return Some(mid);
        }
        if g_lo * g[i] < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            g_lo = g[i];
        }
    }
    Some(0.5 * (lo + hi))
}

/// Dense output evaluation for the 3(2) pair: cubic in the normalized
/// step-local coordinate.
pub fn contrk23(xi: Float, yi: &mut [Float], cont: &[Float], xold: Float, h: Float) {
    let n = yi.len();
    let x = (xi - xold) / h;
    let x2 = x * x;
    let x3 = x2 * x;
    for i in 0..n {
        yi[i] = cont[i] + h * (cont[n + i] * x + cont[2 * n + i] * x2 + cont[3 * n + i] * x3);
    }
}

// Bogacki-Shampine 3(2) tableau
const C2: Float = 0.5;
const C3: Float = 0.75;

const A21: Float = 0.5;
const A32: Float = 0.75;

const B1: Float = 2.0 / 9.0;
const B2: Float = 1.0 / 3.0;
const B3: Float = 4.0 / 9.0;

const E1: Float = 5.0 / 72.0;
const E2: Float = -1.0 / 12.0;
const E3: Float = -1.0 / 9.0;
const E4: Float = 1.0 / 8.0;

// Cubic dense-output coefficients
const D21: Float = -4.0 / 3.0;
const D22: Float = 1.0;
const D23: Float = 4.0 / 3.0;
const D24: Float = -1.0;
const D31: Float = 5.0 / 9.0;
const D32: Float = -2.0 / 3.0;
const D33: Float = -8.0 / 9.0;
const D34: Float = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl OdeSys for Decay {
        fn ny(&self) -> usize {
            1
        }

        fn rhs(&mut self, _x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus {
            f[0] = -y[0];
            OdeStatus::Success
        }
    }

    fn cfg<'a>(rtol: &'a Tolerance, atol: &'a Tolerance) -> AdaptiveConfig<'a> {
        AdaptiveConfig {
            rtol,
            atol,
            dx0: None,
            dx_max: None,
            dx_min: None,
            nmax: 100_000,
            safety_factor: 0.9,
            scale_min: 0.2,
            scale_max: 5.0,
            return_on_root: false,
            sample_at: None,
        }
    }

    #[test]
    fn decay_to_machine_tolerance() {
        let mut sys = Decay;
        let rtol: Tolerance = 1e-10.into();
        let atol: Tolerance = 1e-10.into();
        let out = rk23_adaptive(&mut sys, 0.0, 1.0, &[1.0], &cfg(&rtol, &atol));
        assert_eq!(out.status, Status::Success);
        let y_end = out.yout.last().unwrap()[0];
        assert!((y_end - (-1.0 as Float).exp()).abs() < 1e-8);
        assert!(out.naccpt > 0);
        assert_eq!(*out.xout.last().unwrap(), 1.0);
    }

    #[test]
    fn dense_sampling_matches_steps() {
        let mut sys = Decay;
        let rtol: Tolerance = 1e-9.into();
        let atol: Tolerance = 1e-9.into();
        let samples: Vec<Float> = (0..=10).map(|i| i as Float / 10.0).collect();
        let mut c = cfg(&rtol, &atol);
        c.sample_at = Some(&samples);
        let out = rk23_adaptive(&mut sys, 0.0, 1.0, &[1.0], &c);
        assert_eq!(out.status, Status::Success);
        assert_eq!(out.xout, samples);
        for (xi, yi) in out.xout.iter().zip(&out.yout) {
            assert!((yi[0] - (-xi).exp()).abs() < 1e-6);
        }
    }

    #[test]
    fn step_cap_is_honored() {
        struct Capped;
        impl OdeSys for Capped {
            fn ny(&self) -> usize {
                1
            }
            fn rhs(&mut self, _x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus {
                f[0] = -y[0];
                OdeStatus::Success
            }
            fn get_dx_max(&self, _x: Float, _y: &[Float]) -> Float {
                0.01
            }
        }
        let mut sys = Capped;
        let rtol: Tolerance = 1e-6.into();
        let atol: Tolerance = 1e-6.into();
        let out = rk23_adaptive(&mut sys, 0.0, 1.0, &[1.0], &cfg(&rtol, &atol));
        assert_eq!(out.status, Status::Success);
        // 1.0 / 0.01 = at least 100 accepted steps
        assert!(out.naccpt >= 100);
    }
}
