//! Restart policy for fatal errors.
//!
//! The device layer never retries transport failures. The firmware catches
//! the error at the top of its main loop, shuts the device down and restarts
//! the chip after a countdown, unless it is being debugged.

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

use crate::error::HomieError;
use crate::homie::Device;
use crate::transport::HomieTransport;

/// Default countdown before a restart.
pub const RESTART_COUNTDOWN_SECS: u32 = 10;

/// Outcome of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartDecision {
    /// Reset the chip.
    Restart,
    /// Stay halted so the failure can be inspected.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RestartPolicy {
    /// Seconds to wait before restarting
    pub countdown_secs: u32,
    /// Suppress automatic restart
    pub debug: bool,
}

impl RestartPolicy {
    pub const fn new() -> Self {
        Self {
            countdown_secs: RESTART_COUNTDOWN_SECS,
            debug: false,
        }
    }

    /// Set countdown length
    #[must_use]
    pub const fn with_countdown(mut self, secs: u32) -> Self {
        self.countdown_secs = secs;
        self
    }

    /// Set debug mode
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Count down to a restart, one second at a time.
    ///
    /// `on_second` receives the remaining seconds before each pause. In
    /// debug mode this returns `Halt` immediately.
    pub async fn countdown<D, F>(&self, delay: &mut D, mut on_second: F) -> RestartDecision
    where
        D: DelayNs,
        F: FnMut(u32),
    {
        if self.debug {
            info!("debug mode, not restarting");
            return RestartDecision::Halt;
        }
        for remaining in (1..=self.countdown_secs).rev() {
            info!("restart in {} seconds", remaining);
            on_second(remaining);
            delay.delay_ms(1000).await;
        }
        RestartDecision::Restart
    }

    /// Handle a fatal device error: log it with the time it was caught, shut
    /// the device down and count down to a restart.
    ///
    /// A failing shutdown is logged and does not prevent the countdown.
    pub async fn recover<T, D>(
        &self,
        device: &mut Device<'_, T>,
        error: &HomieError<T::Error>,
        now: Instant,
        delay: &mut D,
    ) -> RestartDecision
    where
        T: HomieTransport,
        D: DelayNs,
    {
        error!("[{}s] device failed: {}", now.as_secs(), error);
        if let Err(e) = device.shutdown().await {
            warn!("shutdown failed: {}", e);
        }
        self.countdown(delay, |_| {}).await
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u64,
    }

    impl DelayNs for CountingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns) / 1_000_000;
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
        }
    }

    #[test]
    fn countdown_reports_every_second() {
        let mut delay = CountingDelay::default();
        let mut seen = [0u32; 3];
        let mut n = 0;
        let decision = embassy_futures::block_on(RestartPolicy::new().with_countdown(3).countdown(
            &mut delay,
            |s| {
                seen[n] = s;
                n += 1;
            },
        ));
        assert_eq!(decision, RestartDecision::Restart);
        assert_eq!(seen, [3, 2, 1]);
        assert_eq!(delay.total_ms, 3000);
    }

    #[test]
    fn debug_halts_immediately() {
        let mut delay = CountingDelay::default();
        let decision = embassy_futures::block_on(
            RestartPolicy::new().with_debug(true).countdown(&mut delay, |_| {}),
        );
        assert_eq!(decision, RestartDecision::Halt);
        assert_eq!(delay.total_ms, 0);
    }
}
