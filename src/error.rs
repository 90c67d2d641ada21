//! Validation errors for the integration drivers.

use crate::Float;

/// Validation errors returned by the driver entry points before any stepping
/// is attempted.
#[derive(Debug, Clone)]
pub enum Error {
    NMaxMustBePositive(usize),
    InvalidTolerance(Float),
    SafetyFactorOutOfRange(Float),
    InvalidScaleFactors(Float, Float),
    InvalidStepSize(Float),
    DimensionMismatch(usize, usize),
    ToleranceDimensionMismatch(usize, usize),
    XoutTooShort(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NMaxMustBePositive(v) => write!(f, "nmax must be positive (got {})", v),
            Error::InvalidTolerance(v) => write!(f, "tolerances must be positive (got {})", v),
            Error::SafetyFactorOutOfRange(v) => {
                write!(f, "safety_factor must be in (1e-4, 1.0) (got {})", v)
            }
            Error::InvalidScaleFactors(lo, hi) => write!(
                f,
                "scale factors must satisfy 0 < scale_min < scale_max (got {}, {})",
                lo, hi
            ),
            Error::InvalidStepSize(v) => write!(f, "step size has invalid value (got {})", v),
            Error::DimensionMismatch(expected, got) => write!(
                f,
                "state vector length {} does not match system dimension {}",
                got, expected
            ),
            Error::ToleranceDimensionMismatch(expected, got) => write!(
                f,
                "tolerance vector length {} does not match system dimension {}",
                got, expected
            ),
            Error::XoutTooShort(n) => {
                write!(f, "output grid needs at least 2 points (got {})", n)
            }
        }
    }
}

impl std::error::Error for Error {}
