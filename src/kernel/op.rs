// The asynchronous hardware operation driven by the state machine
//
// begin() must return immediately: it either hands the work to the
// hardware (Accepted) or refuses synchronously (Rejected). The result
// of accepted work arrives later through a completion source.

use core::fmt;

use super::error::Error;

/// Synchronous answer to a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    Accepted,
    Rejected(u32),
}

/// Result of an accepted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(u32),
    TimedOut,
}

// Raw encoding shared with the ISR-written completion marker.
// 0 is reserved for "nothing reported".
pub(crate) const RAW_SUCCESS: u8 = 1;
pub(crate) const RAW_FAILURE: u8 = 2;
pub(crate) const RAW_TIMED_OUT: u8 = 3;

impl Outcome {
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub const fn error(&self) -> Option<Error> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(code) => Some(Error::OperationFailed(*code)),
            Outcome::TimedOut => Some(Error::TimedOut),
        }
    }

    pub(crate) const fn to_raw(self) -> (u8, u32) {
        match self {
            Outcome::Success => (RAW_SUCCESS, 0),
            Outcome::Failure(code) => (RAW_FAILURE, code),
            Outcome::TimedOut => (RAW_TIMED_OUT, 0),
        }
    }

    pub(crate) const fn from_raw(status: u8, code: u32) -> Option<Self> {
        match status {
            RAW_SUCCESS => Some(Outcome::Success),
            RAW_FAILURE => Some(Outcome::Failure(code)),
            RAW_TIMED_OUT => Some(Outcome::TimedOut),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            None => write!(f, "ok"),
            Some(err) => write!(f, "{}", err),
        }
    }
}

/// Hardware side of one retryable asynchronous operation.
///
/// Only `begin` is required. `finish` is asked for the result when the
/// completion source carries no payload (a bare signal); `abort` is only
/// used when a wait timeout is configured.
pub trait AsyncOperation {
    fn begin(&mut self) -> Start;

    fn finish(&mut self) -> Outcome {
        Outcome::Success
    }

    // Stop the outstanding operation. Return false if the hardware
    // cannot be stopped; the machine then keeps waiting.
    fn abort(&mut self) -> bool {
        false
    }
}

impl<T: AsyncOperation + ?Sized> AsyncOperation for &mut T {
    fn begin(&mut self) -> Start {
        (**self).begin()
    }

    fn finish(&mut self) -> Outcome {
        (**self).finish()
    }

    fn abort(&mut self) -> bool {
        (**self).abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_encoding_keeps_failure_code() {
        let (status, code) = Outcome::Failure(0x42).to_raw();
        assert_eq!(Outcome::from_raw(status, code), Some(Outcome::Failure(0x42)));
        assert_eq!(Outcome::from_raw(0, 0), None);
        assert_eq!(Outcome::from_raw(0xff, 1), None);
    }

    #[test]
    fn outcome_maps_to_error() {
        assert_eq!(Outcome::Success.error(), None);
        assert_eq!(Outcome::Failure(5).error(), Some(Error::OperationFailed(5)));
        assert_eq!(Outcome::TimedOut.error(), Some(Error::TimedOut));
        assert_eq!(Outcome::Success.to_string(), "ok");
    }

    struct Fixed;

    impl AsyncOperation for Fixed {
        fn begin(&mut self) -> Start {
            Start::Rejected(2)
        }
    }

    fn drive<O: AsyncOperation>(mut op: O) -> (Start, Outcome, bool) {
        (op.begin(), op.finish(), op.abort())
    }

    #[test]
    fn default_hooks_through_reference() {
        let mut op = Fixed;
        assert_eq!(drive(&mut op), (Start::Rejected(2), Outcome::Success, false));
    }
}
