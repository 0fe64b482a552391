//! ESP32-C3 wiring for the timer demo
//!
//! TIMG0 timer0 plays the asynchronous hardware operation: `begin()`
//! arms one period, and the timer interrupt disarms it and signals
//! [`TIMER_DONE`]. The ISR does nothing else; the main loop's state
//! machine picks the signal up on its next tick.
//!
//! Timer | Function
//! TIMG0 | timer0: one period per operation, interrupt priority 1

use core::cell::RefCell;

use critical_section::Mutex;
use esp_hal::{
    Blocking,
    peripherals::TIMG0,
    time::Duration,
    timer::{PeriodicTimer, timg::TimerGroup},
};

use crate::kernel::{AsyncOperation, SignalChannel, Start};

// One operation = one timer period
pub const TIMER_PERIOD_MS: u64 = 1000;

// begin() rejection codes
pub const REJECT_NO_TIMER: u32 = 0x0001;
pub const REJECT_TIMER_ERROR: u32 = 0x0002;

static TIMER0: Mutex<RefCell<Option<PeriodicTimer<'static, Blocking>>>> =
    Mutex::new(RefCell::new(None));

/// Set by the timer ISR when an armed period elapses.
pub static TIMER_DONE: SignalChannel = SignalChannel::new();

#[esp_hal::handler(priority = esp_hal::interrupt::Priority::Priority1)]
fn timer0_handler() {
    critical_section::with(|cs| {
        if let Some(timer) = TIMER0.borrow_ref_mut(cs).as_mut() {
            timer.clear_interrupt();
            let _ = timer.cancel();
        }
    });
    TIMER_DONE.signal();
}

// Hand timer0 to the ISR; it stays idle until an operation begins
pub fn init_timer(timg0: TIMG0<'static>) {
    let timg0 = TimerGroup::new(timg0);
    let mut timer0 = PeriodicTimer::new(timg0.timer0);
    critical_section::with(|cs| {
        timer0.set_interrupt_handler(timer0_handler);
        timer0.listen();
        TIMER0.borrow_ref_mut(cs).replace(timer0);
    });
}

/// One timer period as an asynchronous operation
pub struct TimerOperation {
    period: Duration,
}

impl TimerOperation {
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl AsyncOperation for TimerOperation {
    fn begin(&mut self) -> Start {
        critical_section::with(|cs| {
            let mut slot = TIMER0.borrow_ref_mut(cs);
            let Some(timer) = slot.as_mut() else {
                return Start::Rejected(REJECT_NO_TIMER);
            };
            match timer.start(self.period) {
                Ok(()) => Start::Accepted,
                Err(_) => Start::Rejected(REJECT_TIMER_ERROR),
            }
        })
    }

    fn abort(&mut self) -> bool {
        critical_section::with(|cs| match TIMER0.borrow_ref_mut(cs).as_mut() {
            Some(timer) => timer.cancel().is_ok(),
            None => false,
        })
    }
}
