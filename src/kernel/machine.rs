// Asynchronous operation state machine, polled from the main loop
//
//   Idle -> Requesting -> Waiting -> Completed -> Idle | Requesting
//
// tick() never blocks. Requesting and Waiting are separate because a
// request can fail synchronously: a rejected request is retried from
// Requesting instead of waiting for a completion that will never come.
// The ISR never touches `state`; it only marks the completion source,
// and the transition to Completed happens here on the next tick.
// At most one operation is outstanding: begin() is only called from
// Requesting, entered from Idle or after a Completed result is consumed.

use core::fmt;

use super::completion::{Completion, CompletionSource};
use super::op::{AsyncOperation, Outcome, Start};
use super::report::{Event, LogReport, Report};
use super::retry::{Backoff, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Requesting,
    Waiting,
    Completed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Requesting => write!(f, "Requesting"),
            State::Waiting => write!(f, "Waiting"),
            State::Completed => write!(f, "Completed"),
        }
    }
}

/// Where Completed goes on the tick after it is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restart {
    /// Rest in Idle (for `idle_ticks`), then request again
    #[default]
    Idle,
    /// Straight back to Requesting
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    restart: Restart,
    retry: RetryPolicy,
    idle_ticks: u32,
    timeout_ticks: Option<u32>,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            restart: Restart::Idle,
            retry: RetryPolicy::Immediate,
            idle_ticks: 0,
            timeout_ticks: None,
        }
    }

    pub const fn with_restart(mut self, restart: Restart) -> Self {
        self.restart = restart;
        self
    }

    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // Ticks spent in Idle after a completion before the next request
    pub const fn with_idle_ticks(mut self, ticks: u32) -> Self {
        self.idle_ticks = ticks;
        self
    }

    // Ticks in Waiting without a completion before it counts as timed out
    pub const fn with_timeout_ticks(mut self, ticks: Option<u32>) -> Self {
        self.timeout_ticks = ticks;
        self
    }

    pub const fn restart(&self) -> Restart {
        self.restart
    }

    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub const fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    pub const fn timeout_ticks(&self) -> Option<u32> {
        self.timeout_ticks
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters since creation. Cooperative side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// begin() calls
    pub requests: u32,
    pub accepted: u32,
    pub rejected: u32,
    /// Waiting -> Completed transitions
    pub completed: u32,
    /// completions with a non-success outcome
    pub failed: u32,
    pub timeouts: u32,
}

pub struct OperationStateMachine<O, C, R = LogReport> {
    op: O,
    source: C,
    reporter: R,
    config: Config,
    state: State,
    last_result: Option<Outcome>,
    backoff: Backoff,
    // attempts for the request currently being issued
    attempt: u32,
    idle_remaining: u32,
    // ticks spent in the current Waiting
    waited: u32,
    timeout_reported: bool,
    stats: Stats,
}

impl<O, C> OperationStateMachine<O, C, LogReport>
where
    O: AsyncOperation,
    C: CompletionSource,
{
    pub fn new(op: O, source: C) -> Self {
        Self::with_reporter(op, source, Config::new(), LogReport)
    }

    pub fn with_config(op: O, source: C, config: Config) -> Self {
        Self::with_reporter(op, source, config, LogReport)
    }
}

impl<O, C, R> OperationStateMachine<O, C, R>
where
    O: AsyncOperation,
    C: CompletionSource,
    R: Report,
{
    pub fn with_reporter(op: O, source: C, config: Config, reporter: R) -> Self {
        Self {
            op,
            source,
            reporter,
            config,
            state: State::Idle,
            last_result: None,
            backoff: Backoff::new(config.retry()),
            attempt: 0,
            idle_remaining: 0,
            waited: 0,
            timeout_reported: false,
            stats: Stats::default(),
        }
    }

    /// Advance by at most one transition. Call from the main loop at any rate.
    pub fn tick(&mut self) {
        match self.state {
            State::Idle => self.tick_idle(),
            State::Requesting => self.tick_requesting(),
            State::Waiting => self.tick_waiting(),
            State::Completed => self.tick_completed(),
        }
    }

    fn tick_idle(&mut self) {
        if self.idle_remaining > 0 {
            self.idle_remaining -= 1;
            return;
        }
        self.arm();
    }

    fn tick_requesting(&mut self) {
        if !self.backoff.tick() {
            return;
        }

        self.attempt = self.attempt.saturating_add(1);
        self.stats.requests = self.stats.requests.wrapping_add(1);

        // nothing is outstanding yet: a notification now belongs to no request
        self.source.discard();
        match self.op.begin() {
            Start::Accepted => {
                self.stats.accepted = self.stats.accepted.wrapping_add(1);
                self.backoff.reset();
                self.waited = 0;
                self.timeout_reported = false;
                self.state = State::Waiting;
                self.reporter.report(&Event::Started {
                    attempt: self.attempt,
                });
            }
            Start::Rejected(code) => {
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                self.reporter.report(&Event::Rejected {
                    code,
                    attempt: self.attempt,
                });
                let ticks = self.backoff.on_reject();
                if ticks > 0 {
                    self.reporter.report(&Event::HoldOff { ticks });
                }
            }
        }
    }

    fn tick_waiting(&mut self) {
        let outcome = match self.source.poll() {
            Completion::Pending => {
                self.check_deadline();
                return;
            }
            Completion::Signaled => self.op.finish(),
            Completion::Finished(outcome) => outcome,
        };
        self.complete(outcome);
    }

    fn check_deadline(&mut self) {
        let Some(limit) = self.config.timeout_ticks() else {
            return;
        };
        self.waited = self.waited.saturating_add(1);
        if self.waited < limit || self.timeout_reported {
            return;
        }

        self.stats.timeouts = self.stats.timeouts.wrapping_add(1);
        if self.op.abort() {
            self.complete(Outcome::TimedOut);
        } else {
            // cannot cancel: keep waiting, a second request would overlap
            self.timeout_reported = true;
            self.reporter.report(&Event::TimedOut { ticks: self.waited });
        }
    }

    fn complete(&mut self, outcome: Outcome) {
        self.stats.completed = self.stats.completed.wrapping_add(1);
        if !outcome.is_success() {
            self.stats.failed = self.stats.failed.wrapping_add(1);
        }
        self.last_result = Some(outcome);
        self.state = State::Completed;
    }

    fn tick_completed(&mut self) {
        if let Some(outcome) = self.last_result {
            self.reporter.report(&Event::Complete(outcome));
        }
        match self.config.restart() {
            Restart::Idle => {
                self.idle_remaining = self.config.idle_ticks();
                self.state = State::Idle;
            }
            Restart::Immediate => self.arm(),
        }
    }

    // Enter Requesting for a fresh request
    fn arm(&mut self) {
        // nothing is outstanding, so whatever the source holds is stale
        self.source.discard();
        self.backoff.reset();
        self.attempt = 0;
        self.state = State::Requesting;
    }

    pub fn state(&self) -> State {
        self.state
    }

    // None until the first operation completes
    pub fn last_result(&self) -> Option<Outcome> {
        self.last_result
    }

    // An accepted operation has not completed yet
    pub fn is_busy(&self) -> bool {
        self.state == State::Waiting
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn operation(&self) -> &O {
        &self.op
    }

    pub fn operation_mut(&mut self) -> &mut O {
        &mut self.op
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::completion::CompletionMarker;
    use crate::kernel::wake::SignalChannel;

    // begin() answers from a script, then accepts
    struct Scripted {
        answers: [Start; 4],
        next: usize,
        aborts: bool,
    }

    impl Scripted {
        fn accepting() -> Self {
            Self {
                answers: [Start::Accepted; 4],
                next: 0,
                aborts: false,
            }
        }
    }

    impl AsyncOperation for Scripted {
        fn begin(&mut self) -> Start {
            let answer = self.answers.get(self.next).copied().unwrap_or(Start::Accepted);
            self.next += 1;
            answer
        }

        fn abort(&mut self) -> bool {
            self.aborts
        }
    }

    #[derive(Default)]
    struct Tally {
        events: Vec<Event>,
    }

    impl Report for Tally {
        fn report(&mut self, event: &Event) {
            self.events.push(*event);
        }
    }

    #[test]
    fn config_builder() {
        let cfg = Config::default()
            .with_restart(Restart::Immediate)
            .with_idle_ticks(3)
            .with_timeout_ticks(Some(9));
        assert_eq!(cfg.restart(), Restart::Immediate);
        assert_eq!(cfg.idle_ticks(), 3);
        assert_eq!(cfg.timeout_ticks(), Some(9));
        assert_eq!(cfg.retry(), RetryPolicy::Immediate);
    }

    #[test]
    fn idle_ticks_delay_next_request() {
        let ch = SignalChannel::new();
        let cfg = Config::new().with_idle_ticks(2);
        let mut m = OperationStateMachine::with_reporter(
            Scripted::accepting(),
            &ch,
            cfg,
            Tally::default(),
        );

        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Waiting);
        ch.signal();
        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Idle);

        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Idle);
        m.tick();
        assert_eq!(m.state(), State::Requesting);
    }

    #[test]
    fn stale_signal_is_discarded_on_arm() {
        let ch = SignalChannel::new();
        ch.signal();
        let mut m = OperationStateMachine::with_reporter(
            Scripted::accepting(),
            &ch,
            Config::new(),
            Tally::default(),
        );
        m.tick();
        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Waiting);
    }

    #[test]
    fn late_signal_after_restart_does_not_complete_next_operation() {
        let ch = SignalChannel::new();
        let cfg = Config::new().with_restart(Restart::Immediate);
        let mut m = OperationStateMachine::with_reporter(
            Scripted::accepting(),
            &ch,
            cfg,
            Tally::default(),
        );

        m.tick();
        m.tick();
        ch.signal();
        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Requesting);

        // duplicate ISR for the finished operation
        ch.signal();
        m.tick();
        assert_eq!(m.state(), State::Waiting);
        m.tick();
        assert_eq!(m.state(), State::Waiting);
        assert_eq!(m.stats().completed, 1);
    }

    #[test]
    fn signal_during_hold_off_is_dropped() {
        let ch = SignalChannel::new();
        let mut op = Scripted::accepting();
        op.answers = [Start::Rejected(1), Start::Accepted, Start::Accepted, Start::Accepted];
        let cfg = Config::new().with_retry(RetryPolicy::Backoff {
            base_ticks: 3,
            max_ticks: 8,
        });
        let mut m = OperationStateMachine::with_reporter(op, &ch, cfg, Tally::default());

        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Requesting);
        ch.signal();
        for _ in 0..4 {
            m.tick();
        }
        assert_eq!(m.state(), State::Waiting);
        m.tick();
        assert_eq!(m.state(), State::Waiting);
        assert_eq!(m.stats().completed, 0);
    }

    #[test]
    fn timeout_with_abort_completes() {
        let marker = CompletionMarker::new();
        let mut op = Scripted::accepting();
        op.aborts = true;
        let cfg = Config::new().with_timeout_ticks(Some(3));
        let mut m = OperationStateMachine::with_reporter(op, &marker, cfg, Tally::default());

        m.tick();
        m.tick();
        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Waiting);
        m.tick();
        assert_eq!(m.state(), State::Completed);
        assert_eq!(m.last_result(), Some(Outcome::TimedOut));
        assert_eq!(m.stats().timeouts, 1);
        assert_eq!(m.stats().failed, 1);
    }

    #[test]
    fn timeout_without_abort_reports_once() {
        let marker = CompletionMarker::new();
        let cfg = Config::new().with_timeout_ticks(Some(2));
        let mut m = OperationStateMachine::with_reporter(
            Scripted::accepting(),
            &marker,
            cfg,
            Tally::default(),
        );

        m.tick();
        m.tick();
        for _ in 0..10 {
            m.tick();
        }
        assert_eq!(m.state(), State::Waiting);
        let timeouts = m
            .reporter()
            .events
            .iter()
            .filter(|e| matches!(e, Event::TimedOut { .. }))
            .count();
        assert_eq!(timeouts, 1);

        marker.succeed();
        m.tick();
        assert_eq!(m.state(), State::Completed);
        assert_eq!(m.last_result(), Some(Outcome::Success));
    }

    #[test]
    fn backoff_defers_retry() {
        let ch = SignalChannel::new();
        let mut op = Scripted::accepting();
        op.answers = [Start::Rejected(4), Start::Accepted, Start::Accepted, Start::Accepted];
        let cfg = Config::new().with_retry(RetryPolicy::Backoff {
            base_ticks: 2,
            max_ticks: 8,
        });
        let mut m = OperationStateMachine::with_reporter(op, &ch, cfg, Tally::default());

        m.tick(); // Idle -> Requesting
        m.tick(); // rejected, hold off 2
        m.tick();
        m.tick();
        assert_eq!(m.state(), State::Requesting);
        assert_eq!(m.stats().requests, 1);
        m.tick();
        assert_eq!(m.state(), State::Waiting);
        assert_eq!(
            m.reporter().events,
            vec![
                Event::Rejected { code: 4, attempt: 1 },
                Event::HoldOff { ticks: 2 },
                Event::Started { attempt: 2 },
            ]
        );
    }
}
