//! Fixed-grid methods on problems with closed-form solutions.

use odesys::{
    integrate_predefined, DenseSys, Float, Method, OdeStatus, OdeSys, Options, Status,
};

struct Decay {
    k: Float,
}

impl OdeSys for Decay {
    fn ny(&self) -> usize {
        1
    }

    fn rhs(&mut self, _x: Float, y: &[Float], f: &mut [Float]) -> OdeStatus {
        f[0] = -self.k * y[0];
        OdeStatus::Success
    }

    fn dense_jac_rmaj(
        &mut self,
        _x: Float,
        _y: &[Float],
        _fy: Option<&[Float]>,
        jac: &mut [Float],
        _ldim: usize,
        _dfdx: Option<&mut [Float]>,
    ) -> OdeStatus {
        jac[0] = -self.k;
        OdeStatus::Success
    }
}

fn grid(x0: Float, xend: Float, npoints: usize) -> Vec<Float> {
    (0..npoints)
        .map(|i| x0 + (xend - x0) * i as Float / (npoints - 1) as Float)
        .collect()
}

#[test]
fn rk4_decay_accuracy() {
    let mut sys = Decay { k: 1.0 };
    let xout = grid(0.0, 1.0, 101);
    let opts = Options::builder().method(Method::Rk4).build();
    let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
    assert!(res.info.success);
    assert_eq!(res.xout.len(), 101);
    assert_eq!(res.info.nfev, 400);
    let y_end = res.final_y().unwrap()[0];
    assert!((y_end - (-1.0 as Float).exp()).abs() < 1e-7);
}

#[test]
fn euler_forward_is_first_order() {
    let exact = (-1.0 as Float).exp();
    let mut errs = Vec::new();
    for npoints in [11usize, 101] {
        let mut sys = Decay { k: 1.0 };
        let xout = grid(0.0, 1.0, npoints);
        let opts = Options::builder().method(Method::EulerForward).build();
        let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
        errs.push((res.final_y().unwrap()[0] - exact).abs());
    }
    // Tenfold finer grid cuts the error roughly tenfold.
    assert!(errs[1] < errs[0] / 5.0);
    assert!(errs[1] < 1e-2);
}

#[test]
fn midpoint_beats_euler() {
    let exact = (-1.0 as Float).exp();
    let xout = grid(0.0, 1.0, 51);
    let err = |method: Method| {
        let mut sys = Decay { k: 1.0 };
        let opts = Options::builder().method(method).build();
        let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
        (res.final_y().unwrap()[0] - exact).abs()
    };
    assert!(err(Method::Midpoint) < err(Method::EulerForward) / 10.0);
}

#[test]
fn euler_backward_is_stable_on_stiff_decay() {
    let mut sys = Decay { k: 50.0 };
    let xout = grid(0.0, 1.0, 11);
    let opts = Options::builder().method(Method::EulerBackward).build();
    let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
    assert!(res.info.success);
    assert!(res.info.nlu > 0);
    assert!(res.info.njev > 0);
    // h = 0.1 with k = 50 blows up for forward Euler; backward Euler decays.
    let mut prev = 1.0;
    for y in res.yout.iter().skip(1) {
        assert!(y[0] >= 0.0 && y[0] < prev);
        prev = y[0];
    }
}

#[test]
fn trapezoidal_is_second_order() {
    let mut sys = Decay { k: 1.0 };
    let xout = grid(0.0, 1.0, 101);
    let opts = Options::builder().method(Method::Trapezoidal).build();
    let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
    assert!(res.info.success);
    let y_end = res.final_y().unwrap()[0];
    assert!((y_end - (-1.0 as Float).exp()).abs() < 1e-4);
}

#[test]
fn bdf2_decay_accuracy() {
    let mut sys = Decay { k: 1.0 };
    let xout = grid(0.0, 1.0, 101);
    let opts = Options::builder().method(Method::Bdf2).build();
    let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
    assert!(res.info.success);
    let y_end = res.final_y().unwrap()[0];
    assert!((y_end - (-1.0 as Float).exp()).abs() < 1e-3);
}

#[test]
fn rk4_handles_decreasing_grid() {
    let mut sys = Decay { k: 1.0 };
    let xout = grid(1.0, 0.0, 101);
    let opts = Options::builder().method(Method::Rk4).build();
    let y1 = (-1.0 as Float).exp();
    let res = integrate_predefined(&mut sys, &xout, &[y1], &opts).unwrap();
    assert!(res.info.success);
    assert_eq!(res.final_x(), Some(0.0));
    assert!((res.final_y().unwrap()[0] - 1.0).abs() < 1e-7);
}

#[test]
fn bdf2_handles_decreasing_grid() {
    let mut sys = Decay { k: 1.0 };
    let xout = grid(1.0, 0.0, 101);
    let opts = Options::builder().method(Method::Bdf2).build();
    let y1 = (-1.0 as Float).exp();
    let res = integrate_predefined(&mut sys, &xout, &[y1], &opts).unwrap();
    assert!(res.info.success);
    assert_eq!(res.final_x(), Some(0.0));
    assert!((res.final_y().unwrap()[0] - 1.0).abs() < 1e-3);
}

#[test]
fn implicit_method_without_jacobian_stops_early() {
    let mut sys = DenseSys::new(
        1,
        Box::new(|_x, y, _p, f| {
            f[0] = -y[0];
            OdeStatus::Success
        }),
        vec![],
        1e-8,
        1e-8,
    );
    let xout = grid(0.0, 1.0, 11);
    let opts = Options::builder().method(Method::EulerBackward).build();
    let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
    assert!(!res.info.success);
    assert_eq!(res.info.status, Status::CallbackFailure);
    // Only the initial point was reached.
    assert_eq!(res.xout.len(), 1);
}

#[test]
fn adaptive_samples_on_the_grid() {
    let mut sys = Decay { k: 1.0 };
    let xout = grid(0.0, 2.0, 21);
    let opts = Options::builder().rtol(1e-9).atol(1e-9).build();
    let res = integrate_predefined(&mut sys, &xout, &[1.0], &opts).unwrap();
    assert!(res.info.success);
    assert_eq!(res.xout, xout);
    for (xi, yi) in res.xout.iter().zip(&res.yout) {
        assert!((yi[0] - (-xi).exp()).abs() < 1e-7);
    }
}
