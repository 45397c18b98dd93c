//! Device configuration.

use embassy_time::Duration;

use crate::topic::DEFAULT_BASE;

/// Default interval after which an unchanged `$state` is published again.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Default pause between exposing the tree and draining stale messages.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// What an orderly shutdown leaves on `$state`.
///
/// A clean disconnect suppresses the last will, so without an explicit
/// publish the retained state keeps saying `ready` after the device is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShutdownPolicy {
    /// Publish retained `$state = lost` before disconnecting.
    PublishLost,
    /// Only disconnect.
    Silent,
}

/// Protocol settings of a device.
#[derive(Debug, Clone)]
pub struct HomieConfig {
    /// Root topic level
    pub base_topic: &'static str,
    /// Republish interval for an unchanged `$state`
    pub keep_alive: Duration,
    /// Pause before draining messages that arrived during bootstrap
    pub settle_delay: Duration,
    /// Shutdown behaviour
    pub shutdown: ShutdownPolicy,
}

impl HomieConfig {
    pub const fn new() -> Self {
        Self {
            base_topic: DEFAULT_BASE,
            keep_alive: KEEP_ALIVE,
            settle_delay: SETTLE_DELAY,
            shutdown: ShutdownPolicy::PublishLost,
        }
    }

    /// Set base topic
    #[must_use]
    pub const fn with_base_topic(mut self, base_topic: &'static str) -> Self {
        self.base_topic = base_topic;
        self
    }

    /// Set keep-alive interval
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set settle delay
    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set shutdown policy
    #[must_use]
    pub const fn with_shutdown_policy(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl Default for HomieConfig {
    fn default() -> Self {
        Self::new()
    }
}
