// Errors surfaced by the operation state machine
//
// None of these are fatal. A rejected request is retried from
// Requesting; a failed or timed out operation still reaches Completed
// and the machine moves on.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The hardware refused to start the operation (busy, bad state)
    RequestRejected(u32),
    /// An accepted operation finished unsuccessfully
    OperationFailed(u32),
    /// No completion arrived within the configured tick budget
    TimedOut,
}

impl Error {
    // Hardware status code, if the error carries one
    pub const fn code(&self) -> Option<u32> {
        match self {
            Error::RequestRejected(code) | Error::OperationFailed(code) => Some(*code),
            Error::TimedOut => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RequestRejected(code) => write!(f, "request rejected 0x{:04x}", code),
            Error::OperationFailed(code) => write!(f, "operation failed 0x{:04x}", code),
            Error::TimedOut => write!(f, "operation timed out"),
        }
    }
}

impl core::error::Error for Error {}
