// Hold-off between retries of a rejected request
// NOTE: the plain contract retries on the very next tick. Backoff
// stretches that out per consecutive rejection:
// - first rejection: base_ticks
// - every further rejection: double the previous hold-off
// - never more than max_ticks

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    #[default]
    Immediate,
    Backoff { base_ticks: u32, max_ticks: u32 },
}

impl RetryPolicy {
    // Ticks to skip after the n-th consecutive rejection (n >= 1)
    pub const fn hold_off(self, rejections: u32) -> u32 {
        match self {
            RetryPolicy::Immediate => 0,
            RetryPolicy::Backoff {
                base_ticks,
                max_ticks,
            } => {
                if rejections == 0 {
                    return 0;
                }
                let factor = match 1u32.checked_shl(rejections - 1) {
                    Some(f) => f,
                    None => u32::MAX,
                };
                let ticks = base_ticks.saturating_mul(factor);
                if ticks > max_ticks { max_ticks } else { ticks }
            }
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::Immediate => write!(f, "Immediate"),
            RetryPolicy::Backoff {
                base_ticks,
                max_ticks,
            } => write!(f, "Backoff({}..{} ticks)", base_ticks, max_ticks),
        }
    }
}

// Tracks consecutive rejections and the remaining hold-off
pub struct Backoff {
    policy: RetryPolicy,
    // since the last accepted request
    rejections: u32,
    // ticks left before the next attempt
    remaining: u32,
}

impl Backoff {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            rejections: 0,
            remaining: 0,
        }
    }

    // Called once per tick in Requesting; true when an attempt may go out
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            true
        } else {
            self.remaining -= 1;
            false
        }
    }

    // Returns the hold-off armed for the next attempt
    pub fn on_reject(&mut self) -> u32 {
        self.rejections = self.rejections.saturating_add(1);
        self.remaining = self.policy.hold_off(self.rejections);
        self.remaining
    }

    pub fn reset(&mut self) {
        self.rejections = 0;
        self.remaining = 0;
    }

    pub fn rejections(&self) -> u32 {
        self.rejections
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RetryPolicy::Immediate)
    }
}
