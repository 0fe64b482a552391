// Status reporting from the cooperative side of the state machine
//
// Events are only ever produced inside tick(), never in interrupt
// context. LogReport forwards them to the `log` facade; a sink that
// drops or fails to write a line never affects the machine.

use core::fmt;

use log::{debug, info, warn};

use super::error::Error;
use super::op::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Request accepted on the given attempt (1-based)
    Started { attempt: u32 },
    /// Request refused synchronously; will be retried
    Rejected { code: u32, attempt: u32 },
    /// Next attempt deferred by this many ticks
    HoldOff { ticks: u32 },
    /// Still waiting after this many ticks and the operation cannot abort
    TimedOut { ticks: u32 },
    Complete(Outcome),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Started { attempt } => write!(f, "started (attempt {})", attempt),
            Event::Rejected { code, attempt } => write!(
                f,
                "start failed: {} (attempt {})",
                Error::RequestRejected(*code),
                attempt
            ),
            Event::HoldOff { ticks } => write!(f, "retry in {} ticks", ticks),
            Event::TimedOut { ticks } => {
                write!(f, "no completion after {} ticks, still waiting", ticks)
            }
            Event::Complete(Outcome::Success) => write!(f, "complete"),
            Event::Complete(outcome) => write!(f, "complete: {}", outcome),
        }
    }
}

pub trait Report {
    fn report(&mut self, event: &Event);
}

impl<R: Report + ?Sized> Report for &mut R {
    fn report(&mut self, event: &Event) {
        (**self).report(event)
    }
}

/// Default sink: the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReport;

impl Report for LogReport {
    fn report(&mut self, event: &Event) {
        match event {
            Event::Started { .. } | Event::Complete(Outcome::Success) => info!("{}", event),
            Event::HoldOff { .. } => debug!("{}", event),
            Event::Rejected { .. } | Event::TimedOut { .. } | Event::Complete(_) => {
                warn!("{}", event)
            }
        }
    }
}
