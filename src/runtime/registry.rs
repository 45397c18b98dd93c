//! Record of the subscriptions a device has installed.

use heapless::{String, Vec};

use crate::QoS;
use crate::error::ConfigError;
use crate::topic::MAX_TOPIC_LEN;

/// The device installs at most the command wildcard and the broadcast filter,
/// with room to spare for application subscriptions.
pub const MAX_SUBSCRIPTIONS: usize = 4;

/// An ordered, de-duplicated list of topic filters.
///
/// This registry owns the filter strings (copies them on add).
///
/// # Example
///
/// ```ignore
/// let mut registry = TopicRegistry::<4>::new();
///
/// if registry.add("homie/dev/+/+/set", QoS::AtLeastOnce)? {
///     transport.subscribe("homie/dev/+/+/set", QoS::AtLeastOnce).await?;
/// }
/// ```
#[derive(Default)]
pub struct TopicRegistry<const MAX_TOPICS: usize> {
    topics: Vec<(String<MAX_TOPIC_LEN>, QoS), MAX_TOPICS>,
}

impl<const MAX_TOPICS: usize> TopicRegistry<MAX_TOPICS> {
    /// Create a new empty topic registry.
    pub const fn new() -> Self {
        Self { topics: Vec::new() }
    }

    /// Record a filter.
    ///
    /// Returns `Ok(false)` if the filter is already registered, in which case
    /// the caller must not subscribe again.
    pub fn add(&mut self, filter: &str, qos: QoS) -> Result<bool, ConfigError> {
        if self.contains(filter) {
            return Ok(false);
        }

        let mut owned = String::new();
        owned
            .push_str(filter)
            .map_err(|_| ConfigError::TopicTooLong)?;

        self.topics
            .push((owned, qos))
            .map_err(|_| ConfigError::CapacityExceeded)?;
        Ok(true)
    }

    pub fn contains(&self, filter: &str) -> bool {
        self.topics.iter().any(|(t, _)| t == filter)
    }

    /// Get an iterator over the registered filters.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|(t, _)| t.as_str())
    }

    /// Get the number of registered filters.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Forget every filter, e.g. before a fresh clean-session bootstrap.
    pub fn clear(&mut self) {
        self.topics.clear();
    }
}
