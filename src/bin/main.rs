// handoff timer demo entry point and main loop
//
// Boot sequence: logger -> clocks -> timer -> state machine
// Main loop: tick the machine back to back. It never blocks; the timer
// ISR only signals TIMER_DONE and the next tick picks that up.
//
// Each operation is one timer period. Completed goes straight back to
// Requesting, so the log shows a start/complete pair every period.

#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::time::Duration;
use log::info;

use handoff::board::{self, TIMER_DONE, TimerOperation};
use handoff::kernel::{Config, OperationStateMachine, Restart};

esp_bootloader_esp_idf::esp_app_desc!();

// summary line every this many completions
const STATS_EVERY: u32 = 10;

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("booting...");

    board::init_timer(peripherals.TIMG0);
    info!("timer initialized.");

    let op = TimerOperation::new(Duration::from_millis(board::TIMER_PERIOD_MS));
    let cfg = Config::default().with_restart(Restart::Immediate);
    let mut machine = OperationStateMachine::with_config(op, &TIMER_DONE, cfg);
    info!("machine ready.");

    let mut last_reported: u32 = 0;
    loop {
        machine.tick();

        let stats = machine.stats();
        if stats.completed.wrapping_sub(last_reported) >= STATS_EVERY {
            last_reported = stats.completed;
            info!(
                "stats: {} requests, {} rejected, {} completed, {} failed",
                stats.requests, stats.rejected, stats.completed, stats.failed
            );
        }
    }
}
