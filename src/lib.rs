//! An ODE-system abstraction for numerical integrator drivers.
//!
//! The central piece is the [`OdeSys`] trait: the entry points an
//! integrator calls back into during time-stepping (`rhs`, the two dense
//! Jacobian layouts, `roots`, `get_dx0`, `get_dx_max`). Two ready-made
//! implementations bind user-supplied callbacks to that trait:
//! [`DenseSys`] for direct dense solvers (bounds, invariants, diagnostic
//! recording) and the reduced [`IterativeSys`] for iterative solvers.
//!
//! The [`integrate`] module carries reference integrators exercising the
//! trait: demonstration-grade fixed-grid sweeps and an adaptive embedded
//! Runge-Kutta 3(2) driver with dense output and root detection.

mod dense;
mod error;
mod hinit;
mod iterative;
mod linalg;
mod record;
mod result;
mod status;
mod system;
mod tolerance;

pub mod integrate;
pub mod steppers;

#[cfg(feature = "python")]
mod python;

pub use dense::{CseCb, DenseSys, ScalarCb, SysParams, VecCb};
pub use error::Error;
pub use integrate::{integrate_adaptive, integrate_predefined, Method, Options};
pub use iterative::IterativeSys;
pub use record::{fpe_flags, RecordFlags, Records, FPE_INF, FPE_NAN};
pub use result::{Info, OdeResult};
pub use status::{OdeStatus, Status};
pub use system::OdeSys;
pub use tolerance::Tolerance;

// Prevent selecting two incompatible float precision features at once.
#[cfg(all(feature = "f32", feature = "f64"))]
compile_error!(
    "features 'f32' and 'f64' cannot both be enabled; pick exactly one Float precision feature"
);

/// Change this to f64 or f32 via the precision features.
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f64")]
pub type Float = f64;
