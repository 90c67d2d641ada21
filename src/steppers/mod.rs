//! Reference integrators driving the [`crate::OdeSys`] trait.
//!
//! The fixed-grid sweeps take one step per interval of the requested output
//! grid and are demonstration-grade; the adaptive Runge-Kutta 3(2) driver
//! adds error control, dense output and root detection. Production stiff
//! solvers remain an external responsibility.

pub mod adaptive;
pub mod explicit;
pub mod implicit;

use crate::{status::Status, Float};

pub use adaptive::{contrk23, rk23_adaptive, AdaptiveConfig, AdaptiveOutcome};
pub use explicit::{euler_forward, midpoint, rk4};
pub use implicit::{bdf2, euler_backward, trapezoidal};

/// Outcome of a fixed-grid sweep. `yout` holds one state per reached output
/// point, starting with the initial state; it is truncated where the sweep
/// stopped early.
#[derive(Debug, Clone)]
pub struct StepperRun {
    pub yout: Vec<Vec<Float>>,
    pub nfev: usize,
    pub njev: usize,
    pub nlu: usize,
    pub status: Status,
}

impl StepperRun {
    pub(crate) fn new(y0: &[Float]) -> Self {
        Self {
            yout: vec![y0.to_vec()],
            nfev: 0,
            njev: 0,
            nlu: 0,
            status: Status::Success,
        }
    }
}
