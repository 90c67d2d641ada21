//! Return codes for the numeric callbacks and termination statuses for the drivers.

/// Status reported by `rhs`, Jacobian and root callbacks.
///
/// - `Success`: the output buffer was filled.
/// - `RecoverableError`: the evaluation failed in a way a driver can react
///   to by retrying with a smaller step (state outside bounds, invariant
///   drifted too far, non-finite intermediate).
/// - `UnrecoverableError`: no point in retrying (e.g. a required callback
///   is missing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdeStatus {
    Success,
    RecoverableError,
    UnrecoverableError,
}

impl OdeStatus {
    pub fn is_success(self) -> bool {
        self == OdeStatus::Success
    }

    /// Integer code used across the foreign binding layer:
    /// 0 = success, 1 = recoverable, -1 = unrecoverable.
    pub fn as_int(self) -> i32 {
        match self {
            OdeStatus::Success => 0,
            OdeStatus::RecoverableError => 1,
            OdeStatus::UnrecoverableError => -1,
        }
    }
}

impl From<OdeStatus> for i32 {
    fn from(s: OdeStatus) -> i32 {
        s.as_int()
    }
}

/// Why an integration run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Reached the end of the requested span.
    Success,
    /// Stopped at the first root crossing (`return_on_root`).
    RootFound,
    /// Ran out of allowed steps.
    NeedLargerNMax,
    /// Step size was driven below the resolution limit (usually by
    /// persistent recoverable errors from the system).
    StepSizeTooSmall,
    /// A callback reported an unrecoverable error.
    CallbackFailure,
    /// Newton matrix factorization failed in an implicit stepper.
    SingularJacobian,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_codes_match_binding_contract() {
        assert_eq!(OdeStatus::Success.as_int(), 0);
        assert_eq!(OdeStatus::RecoverableError.as_int(), 1);
        assert_eq!(OdeStatus::UnrecoverableError.as_int(), -1);
        assert!(OdeStatus::Success.is_success());
        assert!(!OdeStatus::RecoverableError.is_success());
    }
}
