//! Periodic read schedule with bounded retries.

use core::fmt::Debug;

use embassy_time::{Duration, Instant};

/// How often a sensor is read and how hard a failed read is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Interval between regular reads
    pub period: Duration,
    /// Pause before retrying a failed read
    pub retry_delay: Duration,
    /// Failed attempts per period before giving up
    pub max_attempts: u8,
}

impl RetryPolicy {
    /// Read every minute, retry every 4 s, give up after 10 attempts.
    pub const fn new() -> Self {
        Self {
            period: Duration::from_secs(60),
            retry_delay: Duration::from_secs(4),
            max_attempts: 10,
        }
    }

    /// One attempt per period. Suits bus sensors that either answer or are
    /// gone.
    pub const fn single() -> Self {
        Self::new().with_max_attempts(1)
    }

    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of polling a `RetrySchedule`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome<T> {
    /// The read succeeded. `recovered` is set on the first success after the
    /// schedule reported `Exhausted`.
    Ok { value: T, recovered: bool },
    /// The read failed and will be retried.
    Retrying { next_attempt: Instant },
    /// The retry budget ran out. Reported once per failure streak.
    Exhausted,
    /// Nothing was due.
    Idle,
}

/// Decides when a read is due and tracks failure streaks.
///
/// After `Exhausted` the schedule falls back to the regular period and keeps
/// trying, reporting further failures as `Retrying`, until a read succeeds.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    next_due: Option<Instant>,
    period_start: Option<Instant>,
    failures: u8,
    exhausted: bool,
}

impl RetrySchedule {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            next_due: None,
            period_start: None,
            failures: 0,
            exhausted: false,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether the budget ran out and no read succeeded since.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether a read is due. The first poll is always due.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    /// Run `read` if it is due and advance the schedule.
    pub fn poll<T, E, F>(&mut self, now: Instant, read: F) -> ReadOutcome<T>
    where
        E: Debug,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.is_due(now) {
            return ReadOutcome::Idle;
        }
        let period_start = *self.period_start.get_or_insert(now);

        match read() {
            Ok(value) => {
                let recovered = self.exhausted;
                self.failures = 0;
                self.exhausted = false;
                self.next_period(period_start, now);
                ReadOutcome::Ok { value, recovered }
            }
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                warn!(
                    "read failed ({:?}), attempt {}/{}",
                    e, self.failures, self.policy.max_attempts
                );
                if self.failures < self.policy.max_attempts {
                    let next_attempt = now + self.policy.retry_delay;
                    self.next_due = Some(next_attempt);
                    return ReadOutcome::Retrying { next_attempt };
                }

                self.failures = 0;
                self.next_period(period_start, now);
                if self.exhausted {
                    ReadOutcome::Retrying {
                        next_attempt: self.next_due.unwrap_or(now),
                    }
                } else {
                    self.exhausted = true;
                    ReadOutcome::Exhausted
                }
            }
        }
    }

    fn next_period(&mut self, period_start: Instant, now: Instant) {
        let mut next = period_start + self.policy.period;
        if next <= now {
            next = now + self.policy.period;
        }
        self.next_due = Some(next);
        self.period_start = Some(next);
    }
}
