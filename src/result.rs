//! Trajectory and run statistics returned by the drivers.

use crate::{status::Status, Float};

/// Run statistics, shaped after the info block the original tooling
/// attaches to every integration.
#[derive(Debug, Clone)]
pub struct Info {
    /// Number of `rhs` evaluations made by the driver.
    pub nfev: usize,
    /// Number of Jacobian evaluations.
    pub njev: usize,
    /// Number of matrix factorizations.
    pub nlu: usize,
    /// Number of `roots` evaluations.
    pub nrev: usize,
    /// Accepted steps.
    pub naccpt: usize,
    /// Rejected step attempts.
    pub nrejct: usize,
    /// Why the run terminated.
    pub status: Status,
    /// `true` when the full span was covered or a requested root stop
    /// occurred. A `false` result still carries the partial trajectory.
    pub success: bool,
}

/// Result of one integration run.
#[derive(Debug, Clone)]
pub struct OdeResult {
    /// Abscissae of the recorded output points.
    pub xout: Vec<Float>,
    /// One state vector per output point.
    pub yout: Vec<Vec<Float>>,
    /// Refined abscissae of detected root crossings, in integration order.
    pub root_xvals: Vec<Float>,
    /// Index of the root function that crossed, parallel to `root_xvals`.
    pub root_indices: Vec<usize>,
    pub info: Info,
}

impl OdeResult {
    /// Last recorded abscissa.
    pub fn final_x(&self) -> Option<Float> {
        self.xout.last().copied()
    }

    /// Last recorded state.
    pub fn final_y(&self) -> Option<&[Float]> {
        self.yout.last().map(|y| y.as_slice())
    }
}
