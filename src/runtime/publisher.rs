//! Deferred publish queue.
//!
//! Set-callbacks and periodic drivers run while the transport is busy (or at
//! least outside any async context), so they never publish directly. They
//! queue requests into a `BufferedOutbox` and the device drains it once per
//! tick.

use heapless::{String, Vec};

use super::traits::PublishOutbox;
use crate::QoS;

/// An owned publish request with inline storage for topic and payload.
///
/// Queued requests do not keep the caller's buffers borrowed.
#[derive(Debug, Clone)]
pub struct OwnedPublishRequest<const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> {
    /// The topic (stored inline)
    pub topic: String<TOPIC_SIZE>,
    /// The payload (stored inline)
    pub payload: Vec<u8, PAYLOAD_SIZE>,
    /// Whether the broker should retain the message
    pub retain: bool,
    /// Quality of Service level
    pub qos: QoS,
}

/// A buffered outbox that collects publish requests between flushes.
///
/// A request for a topic that is already queued replaces the queued payload
/// in place, so a value that changes several times between two flushes is
/// published once, with its latest value.
///
/// # Type Parameters
///
/// - `CAPACITY`: Maximum number of publish requests that can be buffered
/// - `TOPIC_SIZE`: Maximum topic string length
/// - `PAYLOAD_SIZE`: Maximum payload size
pub struct BufferedOutbox<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
{
    requests: Vec<OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, CAPACITY>,
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    /// Create a new empty buffered outbox.
    pub const fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Take all buffered requests in queue order, leaving the outbox empty.
    pub fn take(&mut self) -> Vec<OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, CAPACITY> {
        core::mem::take(&mut self.requests)
    }

    /// Iterate over the queued requests without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>> {
        self.requests.iter()
    }

    /// Clear all buffered requests.
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    /// Check if the outbox is empty.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Get the number of buffered requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> Default
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> PublishOutbox
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool {
        let mut payload_vec = Vec::new();
        if payload_vec.extend_from_slice(payload).is_err() {
            warn!("outbox: payload for {} too large, dropped", topic);
            return false;
        }

        if let Some(queued) = self.requests.iter_mut().find(|r| r.topic == topic) {
            queued.payload = payload_vec;
            queued.retain = retain;
            queued.qos = qos;
            return true;
        }

        let mut topic_str = String::new();
        if topic_str.push_str(topic).is_err() {
            warn!("outbox: topic {} too long, dropped", topic);
            return false;
        }

        let req = OwnedPublishRequest {
            topic: topic_str,
            payload: payload_vec,
            retain,
            qos,
        };

        if self.requests.push(req).is_err() {
            warn!("outbox: full, dropped publish to {}", topic);
            return false;
        }
        true
    }
}
