// Wake flag signaling between ISRs and the main loop
//
// ISR sets the flag; main loop consumes via try_consume().
// Any number of signals before a consume collapse into one: the
// consumer only learns "something happened", never how often.
// Targets with atomic RMW clear with a single swap; riscv32imc has
// none, so there the load and store run in a critical section.

use core::sync::atomic::{AtomicBool, Ordering};

use super::completion::{Completion, CompletionSource};

pub struct SignalChannel {
    pending: AtomicBool,
}

impl SignalChannel {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// ISR side. Idempotent, never blocks.
    #[inline]
    pub fn signal(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Main loop side. True iff signaled since the last consume.
    #[cfg(target_has_atomic = "8")]
    #[inline]
    pub fn try_consume(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Main loop side. True iff signaled since the last consume.
    #[cfg(not(target_has_atomic = "8"))]
    pub fn try_consume(&self) -> bool {
        // cs: no atomic swap on this target
        critical_section::with(|_| {
            let pending = self.pending.load(Ordering::Acquire);
            if pending {
                self.pending.store(false, Ordering::Relaxed);
            }
            pending
        })
    }

    /// Peek without consuming.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for SignalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSource for SignalChannel {
    #[inline]
    fn poll(&self) -> Completion {
        if self.try_consume() {
            Completion::Signaled
        } else {
            Completion::Pending
        }
    }

    #[inline]
    fn discard(&self) {
        let _ = self.try_consume();
    }
}
