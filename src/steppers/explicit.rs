//! Fixed-grid explicit sweeps: forward Euler, explicit midpoint and the
//! classic fourth-order Runge-Kutta method.

use crate::{status::Status, system::OdeSys, Float};

use super::StepperRun;

/// Forward Euler over the output grid, one step per interval.
pub fn euler_forward<S>(sys: &mut S, xout: &[Float], y0: &[Float]) -> StepperRun
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
        run.nfev += 1;
        if !sys.rhs(x_old, &y, &mut f).is_success() {
            run.status = Status::CallbackFailure;
            return run;
        }
        let mut y_new = y;
        for i in 0..n {
            y_new[i] += h * f[i];
        }
        run.yout.push(y_new);
        sys.record_order(1);
        x_old = x;
    }
    run
}

/// Explicit midpoint over the output grid, one step per interval.
pub fn midpoint<S>(sys: &mut S, xout: &[Float], y0: &[Float]) -> StepperRun
where
    S: OdeSys,
{
    let n = y0.len();
    let mut run = StepperRun::new(y0);
    if xout.is_empty() {
        return run;
    }
    let mut f = vec![0.0; n];
    let mut yt = vec![0.0; n];
    let mut x_old = xout[0];
    for &x in &xout[1..] {
        let h = x - x_old;
        let y = run.yout[run.yout.len() - 1].clone();
        run.nfev += 2;
        if !sys.rhs(x_old, &y, &mut f).is_success() {
            run.status = Status::CallbackFailure;
            return run;
        }
        for i in 0..n {
            yt[i] = y[i] + 0.5 * h * f[i];
        }
        if !sys.rhs(x_old + 0.5 * h, &yt, &mut f).is_success() {
            run.status = Status::CallbackFailure;
            return run;
        }
        let mut y_new = y;
        for i in 0..n {
            y_new[i] += h * f[i];
        }
        run.yout.push(y_new);
        sys.record_order(2);
        x_old = x;
    }
    run
}

/// Classic RK4 over the output grid, one step per interval.
pub fn rk4<S>(sys: &mut S, xout: &[Float], y0: &[Float]) -> StepperRun
where
    S: OdeSys,
{
    let n = y0.len();
    let mut run = StepperRun::new(y0);
    if xout.is_empty() {
        return run;
    }
    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut yt = vec![0.0; n];
    let mut x_old = xout[0];
    for &x in &xout[1..] {
        let h = x - x_old;
        let y = run.yout[run.yout.len() - 1].clone();
        run.nfev += 4;
        let ok = sys.rhs(x_old, &y, &mut k1).is_success()
            && {
                for i in 0..n {
                    yt[i] = y[i] + 0.5 * h * k1[i];
                }
                sys.rhs(x_old + 0.5 * h, &yt, &mut k2).is_success()
            }
            && {
                for i in 0..n {
                    yt[i] = y[i] + 0.5 * h * k2[i];
                }
                sys.rhs(x_old + 0.5 * h, &yt, &mut k3).is_success()
            }
            && {
                for i in 0..n {
                    yt[i] = y[i] + h * k3[i];
                }
                sys.rhs(x_old + h, &yt, &mut k4).is_success()
            };
        if !ok {
            run.status = Status::CallbackFailure;
            return run;
        }
        let mut y_new = y;
        for i in 0..n {
            y_new[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        run.yout.push(y_new);
        sys.record_order(4);
        x_old = x;
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::OdeStatus;

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

    fn grid(n: usize, xend: Float) -> Vec<Float> {
        (0..=n).map(|i| xend * i as Float / n as Float).collect()
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let mut sys = Decay;
        let xout = grid(100, 1.0);
        let run = rk4(&mut sys, &xout, &[1.0]);
        assert_eq!(run.status, Status::Success);
        assert_eq!(run.yout.len(), xout.len());
        let y_end = run.yout.last().unwrap()[0];
        assert!((y_end - (-1.0 as Float).exp()).abs() < 1e-8);
        assert_eq!(run.nfev, 400);
    }

    #[test]
    fn euler_converges_first_order() {
        let mut sys = Decay;
        let coarse = euler_forward(&mut sys, &grid(100, 1.0), &[1.0]);
        let fine = euler_forward(&mut sys, &grid(200, 1.0), &[1.0]);
        let exact = (-1.0 as Float).exp();
        let err_coarse = (coarse.yout.last().unwrap()[0] - exact).abs();
        let err_fine = (fine.yout.last().unwrap()[0] - exact).abs();
        // Halving h should roughly halve the error.
        assert!(err_fine < 0.6 * err_coarse);
    }

    #[test]
    fn midpoint_beats_euler() {
        let mut sys = Decay;
        let xout = grid(100, 1.0);
        let exact = (-1.0 as Float).exp();
        let eu = euler_forward(&mut sys, &xout, &[1.0]);
        let mp = midpoint(&mut sys, &xout, &[1.0]);
        let err_eu = (eu.yout.last().unwrap()[0] - exact).abs();
        let err_mp = (mp.yout.last().unwrap()[0] - exact).abs();
        assert!(err_mp < 0.1 * err_eu);
    }

    #[test]
    fn empty_grid_returns_initial_state() {
        let mut sys = Decay;
        for run in [
            euler_forward(&mut sys, &[], &[1.0]),
            midpoint(&mut sys, &[], &[1.0]),
            rk4(&mut sys, &[], &[1.0]),
        ] {
            assert_eq!(run.status, Status::Success);
            assert_eq!(run.yout, vec![vec![1.0]]);
            assert_eq!(run.nfev, 0);
        }
    }

    #[test]
    fn failing_rhs_truncates_sweep() {
        struct FailAfter {
            calls: usize,
        }
        impl OdeSys for FailAfter {
            fn ny(&self) -> usize {
                1
            }
            fn rhs(&mut self, _x: Float, _y: &[Float], f: &mut [Float]) -> OdeStatus {
                self.calls += 1;
                if self.calls > 3 {
                    return OdeStatus::UnrecoverableError;
                }
                f[0] = 1.0;
                OdeStatus::Success
            }
        }
        let mut sys = FailAfter { calls: 0 };
        let run = euler_forward(&mut sys, &grid(10, 1.0), &[0.0]);
        assert_eq!(run.status, Status::CallbackFailure);
        assert_eq!(run.yout.len(), 4); // y0 plus three successful steps
    }
}
