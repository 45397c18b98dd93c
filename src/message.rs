//! # Messages
//!
//! Borrowed views of the messages exchanged with the transport.

/// Represents the Quality of Service (QoS) levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// An inbound publish as delivered by the transport.
#[derive(Debug, Clone, Copy)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub retain: bool,
    pub qos: QoS,
}

impl<'a> Publish<'a> {
    pub const fn new(topic: &'a str, payload: &'a [u8]) -> Self {
        Self {
            topic,
            payload,
            retain: false,
            qos: QoS::AtMostOnce,
        }
    }

    #[must_use]
    pub const fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// The payload as text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.payload).ok()
    }
}

/// The message the broker publishes on our behalf if the session drops
/// without a clean disconnect.
#[derive(Debug, Clone, Copy)]
pub struct LastWill<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub retain: bool,
    pub qos: QoS,
}

/// Callback for inbound messages outside the property tree (broadcasts and
/// the catch-all user handler).
///
/// Handlers run inside the transport poll. State changes go through interior
/// mutability, which is the usual single-threaded embedded pattern.
pub trait InboundHandler {
    fn handle(&self, msg: &Publish<'_>);
}

impl<F> InboundHandler for F
where
    F: Fn(&Publish<'_>),
{
    fn handle(&self, msg: &Publish<'_>) {
        self(msg)
    }
}
