// Completion hand-off from interrupt context to the state machine
//
// Two realizations of the same contract:
//   SignalChannel    - bare coalescing flag, outcome read later by the
//                      main loop through AsyncOperation::finish()
//   CompletionMarker - the ISR writes the outcome itself
//
// A machine is generic over exactly one source, so the two never write
// the same field. The ISR only moves a source forward (nothing -> done);
// clearing is the main loop's job.

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use super::op::Outcome;

const STATUS_NONE: u8 = 0;

/// What a completion source had to say on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Pending,
    /// Something finished; the operation must be asked for the result
    Signaled,
    Finished(Outcome),
}

pub trait CompletionSource {
    /// Consume a notification, if any. Main loop only, never blocks.
    fn poll(&self) -> Completion;

    /// Drop a stale notification before a new request goes out.
    fn discard(&self);
}

impl<T: CompletionSource + ?Sized> CompletionSource for &T {
    #[inline]
    fn poll(&self) -> Completion {
        (**self).poll()
    }

    #[inline]
    fn discard(&self) {
        (**self).discard()
    }
}

/// Completion marker written directly by the ISR, carrying the outcome.
///
/// The code is stored before the status (release), so a status observed
/// with acquire always comes with its code.
pub struct CompletionMarker {
    status: AtomicU8,
    code: AtomicU32,
}

impl CompletionMarker {
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(STATUS_NONE),
            code: AtomicU32::new(0),
        }
    }

    /// ISR side: report how the outstanding operation ended.
    #[inline]
    pub fn complete(&self, outcome: Outcome) {
        let (status, code) = outcome.to_raw();
        self.code.store(code, Ordering::Relaxed);
        self.status.store(status, Ordering::Release);
    }

    #[inline]
    pub fn succeed(&self) {
        self.complete(Outcome::Success);
    }

    #[inline]
    pub fn fail(&self, code: u32) {
        self.complete(Outcome::Failure(code));
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.status.load(Ordering::Acquire) != STATUS_NONE
    }

    /// Main loop side: read and clear the reported outcome.
    pub fn take(&self) -> Option<Outcome> {
        // cs: read-then-clear must not interleave with a late ISR write
        critical_section::with(|_| {
            let status = self.status.load(Ordering::Acquire);
            if status == STATUS_NONE {
                return None;
            }
            let code = self.code.load(Ordering::Relaxed);
            self.status.store(STATUS_NONE, Ordering::Relaxed);
            Outcome::from_raw(status, code)
        })
    }
}

impl Default for CompletionMarker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSource for CompletionMarker {
    fn poll(&self) -> Completion {
        match self.take() {
            Some(outcome) => Completion::Finished(outcome),
            None => Completion::Pending,
        }
    }

    fn discard(&self) {
        let _ = self.take();
    }
}
