//! Compute an initial step size guess

use crate::{system::OdeSys, tolerance::Tolerance, Float};

/// Compute an initial step size guess when neither the caller nor
/// [`OdeSys::get_dx0`] supplied one.
///
/// `f0` holds the derivative at `(x, y)`; `f1` and `y1` are scratch buffers.
/// `iord` is the order of the method about to be used. Falls back to a tiny
/// step when the probe evaluation fails.
#[allow(clippy::too_many_arguments)]
pub fn hinit<S>(
    sys: &mut S,
    x: Float,
    y: &[Float],
    posneg: Float,
    f0: &[Float],
    f1: &mut [Float],
    y1: &mut [Float],
    iord: usize,
    hmax: Float,
    atol: &Tolerance,
    rtol: &Tolerance,
) -> Float
where
    S: OdeSys,
{
    let n = y.len();
    let mut dnf: Float = 0.0;
    let mut dny: Float = 0.0;

    for i in 0..n {
        let sk = atol[i] + rtol[i] * y[i].abs();
        dnf += (f0[i] / sk) * (f0[i] / sk);
        dny += (y[i] / sk) * (y[i] / sk);
    }

    let mut h: Float;
    if dnf <= 1e-10 || dny <= 1e-10 {
        h = 1.0e-6;
    } else {
        h = (dny / dnf).sqrt() * 0.01;
    }

    if h > hmax.abs() {
        h = hmax.abs();
    }
    h = h.abs() * posneg.signum();

    // Explicit Euler step: y1 = y + h * f0
    for i in 0..n {
        y1[i] = y[i] + h * f0[i];
    }
    // Evaluate f at x+h
    if !sys.rhs(x + h, y1, f1).is_success() {
        return 1.0e-6 * posneg.signum();
    }

    // Estimate second derivative
    let mut der2: Float = 0.0;
    for i in 0..n {
        let sk = atol[i] + rtol[i] * y[i].abs();
        let df = (f1[i] - f0[i]) / sk;
        der2 += df * df;
    }
    der2 = der2.sqrt() / h.abs();

    let der12 = der2.abs().max(dnf.sqrt());
    let h1: Float = if der12 <= 1.0e-15 {
        (1.0e-6 as Float).max(h.abs() * 1.0e-3)
    } else {
        (0.01 / der12).powf(1.0 / (iord as Float))
    };

    let h_final = (100.0 * h.abs()).min(h1).min(hmax.abs());
    h_final * posneg.signum()
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

    #[test]
    fn guess_is_positive_and_bounded() {
        let mut sys = Decay;
        let y = [1.0];
        let f0 = [-1.0];
        let mut f1 = [0.0];
        let mut y1 = [0.0];
        let atol: Tolerance = 1e-8.into();
        let rtol: Tolerance = 1e-8.into();
        let h = hinit(
            &mut sys, 0.0, &y, 1.0, &f0, &mut f1, &mut y1, 3, 10.0, &atol, &rtol,
        );
        assert!(h > 0.0);
        assert!(h <= 10.0);
    }

    #[test]
    fn backward_guess_is_negative() {
        let mut sys = Decay;
        let y = [1.0];
        let f0 = [-1.0];
        let mut f1 = [0.0];
        let mut y1 = [0.0];
        let atol: Tolerance = 1e-8.into();
        let rtol: Tolerance = 1e-8.into();
        let h = hinit(
            &mut sys, 1.0, &y, -1.0, &f0, &mut f1, &mut y1, 3, 1.0, &atol, &rtol,
        );
        assert!(h < 0.0);
    }
}
