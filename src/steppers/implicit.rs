//! Fixed-grid implicit sweeps: backward Euler, trapezoidal and a two-step
//! BDF formula with fixed variable coefficients for non-uniform grids.
//!
//! Each step factors `gamma * h * J - I` once and reuses the factors across
//! the Newton iterations, like the demonstration integrators these mirror.

use crate::{linalg::LuFactors, status::Status, system::OdeSys, Float};

use super::StepperRun;

const NEWTON_TOL: Float = 1e-12;
const NEWTON_MAXITER: usize = 50;

/// Backward Euler over the output grid, one step per interval.
pub fn euler_backward<S>(sys: &mut S, xout: &[Float], y0: &[Float]) -> StepperRun
where
    S: OdeSys,
{
    let n = y0.len();
    let mut run = StepperRun::new(y0);
    if xout.is_empty() {
        return run;
    }
    let mut f = vec![0.0; n];
    let mut x_old = xout[0];
    for &x in &xout[1..] {
        let h = x - x_old;
        let y = run.yout[run.yout.len() - 1].clone();
        let lu = match newton_matrix(sys, &mut run, x_old, &y, h) {
            Some(lu) => lu,
            None => return run,
        };
        run.nfev += 1;
        if !sys.rhs(x, &y, &mut f).is_success() {
            run.status = Status::CallbackFailure;
            return run;
        }
        let mut y_new: Vec<Float> = (0..n).map(|i| y[i] + h * f[i]).collect();
        let mut delta = vec![0.0; n];
        for _ in 0..NEWTON_MAXITER {
            run.nfev += 1;
            if !sys.rhs(x, &y_new, &mut f).is_success() {
                run.status = Status::CallbackFailure;
                return run;
            }
            for i in 0..n {
                delta[i] = y_new[i] - y[i] - h * f[i];
            }
            lu.solve(&mut delta);
            let mut norm = 0.0;
            for i in 0..n {
                y_new[i] += delta[i];
                norm += delta[i] * delta[i];
            }
            if norm.sqrt() <= NEWTON_TOL {
                break;
            }
        }
        run.yout.push(y_new);
        sys.record_order(1);
        x_old = x;
    }
    run
}

/// Trapezoidal rule over the output grid: the backward-Euler solution of
/// each interval averaged with the forward-Euler predictor.
pub fn trapezoidal<S>(sys: &mut S, xout: &[Float], y0: &[Float]) -> StepperRun
where
    S: OdeSys,
{
    let n = y0.len();
    let mut run = StepperRun::new(y0);
    if xout.is_empty() {
        return run;
    }
    let mut f = vec![0.0; n];
    let mut x_old = xout[0];
    for &x in &xout[1..] {
        let h = x - x_old;
        let y = run.yout[run.yout.len() - 1].clone();
        let lu = match newton_matrix(sys, &mut run, x_old, &y, h) {
            Some(lu) => lu,
            None => return run,
        };
        run.nfev += 1;
        if !sys.rhs(x, &y, &mut f).is_success() {
            run.status = Status::CallbackFailure;
            return run;
        }
        let fw_dy: Vec<Float> = f.iter().map(|fi| h * fi).collect();
        let mut y_new: Vec<Float> = (0..n).map(|i| y[i] + fw_dy[i]).collect();
        let mut delta = vec![0.0; n];
        for _ in 0..NEWTON_MAXITER {
            run.nfev += 1;
            if !sys.rhs(x, &y_new, &mut f).is_success() {
                run.status = Status::CallbackFailure;
                return run;
            }
            for i in 0..n {
                delta[i] = y_new[i] - y[i] - h * f[i];
            }
            lu.solve(&mut delta);
            let mut norm = 0.0;
            for i in 0..n {
                y_new[i] += delta[i];
                norm += delta[i] * delta[i];
            }
            if norm.sqrt() <= NEWTON_TOL {
                break;
            }
        }
        for i in 0..n {
            y_new[i] = 0.5 * (y_new[i] + y[i] + fw_dy[i]);
        }
        run.yout.push(y_new);
        sys.record_order(2);
        x_old = x;
    }
    run
}

/// Two-step BDF with fixed variable coefficients (FVC) over the output
/// grid, bootstrapped with one trapezoidal step. Handles non-uniform grids.
pub fn bdf2<S>(sys: &mut S, xout: &[Float], y0: &[Float]) -> StepperRun
where
    S: OdeSys,
{
    if xout.len() < 3 {
        return trapezoidal(sys, xout, y0);
    }
    let n = y0.len();

    let mut run = trapezoidal(sys, &xout[..2], y0);
    if run.status != Status::Success {
        return run;
    }

    let mut f = vec![0.0; n];
    let mut x_old = xout[1];
    let mut h_old = xout[1] - xout[0];
    for &x in &xout[2..] {
        let h = x - x_old;
        let y_prev = run.yout[run.yout.len() - 1].clone();
        let y_prev2 = run.yout[run.yout.len() - 2].clone();

        // FVC weights for the variable-step two-step formula.
        let rho = h / h_old;
        let beta0 = (rho + 1.0) / (2.0 * rho + 1.0);
        let alpha1 = -(rho + 1.0) * (rho + 1.0) / (2.0 * rho + 1.0);
        let alpha2 = rho * rho / (2.0 * rho + 1.0);
        let gamma = beta0 * h;

        let lu = match newton_matrix(sys, &mut run, x_old, &y_prev, gamma) {
            Some(lu) => lu,
            None => return run,
        };
        run.nfev += 1;
        if !sys.rhs(x, &y_prev, &mut f).is_success() {
            run.status = Status::CallbackFailure;
            return run;
        }
        let mut y_new: Vec<Float> = (0..n)
            .map(|i| beta0 * h * f[i] - alpha1 * y_prev[i] - alpha2 * y_prev2[i])
            .collect();
        let mut delta = vec![0.0; n];
        for _ in 0..NEWTON_MAXITER {
            run.nfev += 1;
            if !sys.rhs(x, &y_new, &mut f).is_success() {
                run.status = Status::CallbackFailure;
                return run;
            }
            for i in 0..n {
                delta[i] =
                    y_new[i] + alpha1 * y_prev[i] + alpha2 * y_prev2[i] - beta0 * h * f[i];
            }
            lu.solve(&mut delta);
            let mut norm = 0.0;
            for i in 0..n {
                y_new[i] += delta[i];
                norm += delta[i] * delta[i];
            }
            if norm.sqrt() <= NEWTON_TOL {
                break;
            }
        }
        run.yout.push(y_new);
        sys.record_order(2);
        x_old = x;
        h_old = h;
    }
    run
}

/// Evaluate the Jacobian at `(x, y)` and factor `gamma * J - I`.
fn newton_matrix<S>(
    sys: &mut S,
    run: &mut StepperRun,
    x: Float,
    y: &[Float],
    gamma: Float,
) -> Option<LuFactors>
where
    S: OdeSys,
{
    let n = y.len();
    let mut jac = vec![0.0; n * n];
    run.njev += 1;
    if !sys.dense_jac_rmaj(x, y, None, &mut jac, n, None).is_success() {
        run.status = Status::CallbackFailure;
        return None;
    }
    for v in jac.iter_mut() {
        *v *= gamma;
    }
    for i in 0..n {
        jac[i * n + i] -= 1.0;
    }
    run.nlu += 1;
    match LuFactors::factor(jac, n) {
        Some(lu) => Some(lu),
        None => {
            run.status = Status::SingularJacobian;
            None
        }
    }
}
