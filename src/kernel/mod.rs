// Interrupt-to-main-loop hand-off
// Single core. An ISR may preempt the main loop at any instruction but
// only ever marks a completion source; everything else (logging,
// deciding to restart) runs in tick() on the main loop. No locks: the
// only critical sections are the few instructions of a read-and-clear.

pub mod completion;
pub mod error;
pub mod machine;
pub mod op;
pub mod report;
pub mod retry;
pub mod wake;

pub use completion::{Completion, CompletionMarker, CompletionSource};
pub use error::Error;
pub use machine::{Config, OperationStateMachine, Restart, State, Stats};
pub use op::{AsyncOperation, Outcome, Start};
pub use report::{Event, LogReport, Report};
pub use retry::{Backoff, RetryPolicy};
pub use wake::SignalChannel;
