//! Tick timer implementing [`usbrf_core::hal::TickTimer`] over
//! `embassy_time::Instant` (spec §3 `TickDeadline`, §8 scenario S6).
//!
//! The trait itself is synchronous — `set`/`stop`/`elapsed` just manage a
//! deadline — so the one piece of async glue lives outside it, in
//! [`StmTickTimer::until_expiry`], which the main loop in `bin/usbrf.rs`
//! selects on alongside the USB and radio IRQ futures (the embassy
//! counterpart of the reference firmware's TIM2 compare-match interrupt in
//! `original_source/src/modules/timer.c`).

use embassy_time::{Duration, Instant};

use usbrf_core::hal::TickTimer;

const TICK: Duration = Duration::from_micros(10);

pub struct StmTickTimer {
    armed_at: Option<Instant>,
    ticks_10us: u32,
}

impl StmTickTimer {
    pub fn new() -> Self {
        Self { armed_at: None, ticks_10us: 0 }
    }

    /// The instant the armed deadline expires, or `None` if nothing is
    /// armed. A plain getter rather than an async method so a caller can
    /// read it, drop the borrow, and only then await — never holding a
    /// `RefCell` borrow across the wait (`bin/usbrf.rs`'s main loop shares
    /// one `StmTickTimer` across all six protocol slots behind a `RefCell`,
    /// and `set`/`stop` must be free to run while a deadline is pending).
    pub fn deadline(&self) -> Option<Instant> {
        self.armed_at.map(|at| at + TICK * self.ticks_10us)
    }

    /// Sleeps until the armed deadline, or forever if nothing is armed.
    pub async fn until_expiry(&self) {
        match self.deadline() {
            Some(at) => embassy_time::Timer::at(at).await,
            None => core::future::pending::<()>().await,
        }
    }
}

impl Default for StmTickTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TickTimer for StmTickTimer {
    fn set(&mut self, ticks_10us: u32) {
        self.armed_at = Some(Instant::now());
        self.ticks_10us = ticks_10us;
    }

    fn stop(&mut self) {
        self.armed_at = None;
    }

    fn elapsed(&self) -> u32 {
        match self.armed_at {
            Some(at) => (Instant::now() - at).as_micros() as u32 / 10,
            None => 0,
        }
    }
}
