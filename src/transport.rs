//! # MQTT Transport Abstraction
//!
//! The device layer never speaks the MQTT wire protocol itself. It drives a
//! `HomieTransport`, a narrow adapter over whatever client the firmware uses
//! (for example `myrtio_mqtt::MqttClient` over an `embassy-net` socket).
//!
//! With the Rust 2024 Edition, this trait uses native `async fn`, removing the
//! need for the `#[async_trait]` macro.

use crate::message::{LastWill, Publish, QoS};

/// A marker trait for transport-related errors.
pub trait TransportError: core::fmt::Debug {}

/// Receives inbound messages while the transport is being polled.
///
/// The transport calls this from inside `poll`, so implementors must not
/// try to publish. The device's routing half implements it and can only queue
/// work for the next flush.
pub trait MessageHandler {
    /// Handle one inbound publish.
    fn on_message(&mut self, msg: &Publish<'_>);
}

/// A handler that discards every message.
///
/// Used to drain messages that arrive before the device is ready.
pub struct Discard;

impl MessageHandler for Discard {
    fn on_message(&mut self, msg: &Publish<'_>) {
        debug!("discarding stale message on {}", msg.topic);
    }
}

/// The MQTT primitives the device layer consumes.
#[allow(async_fn_in_trait)]
pub trait HomieTransport {
    /// The error type returned by the transport.
    type Error: TransportError;

    /// Configure the last will. Must be called before `connect`.
    fn set_last_will(&mut self, will: &LastWill<'_>);

    /// Open a session with the broker.
    ///
    /// `clean_session = true` asks the broker to drop any state it holds for
    /// this client id.
    async fn connect(&mut self, clean_session: bool) -> Result<(), Self::Error>;

    /// Close the session cleanly. The broker does not fire the last will.
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Publish a message.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter.
    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Check for one inbound message without blocking.
    ///
    /// If a message is pending it is handed to `handler` before this returns.
    /// Returns `true` if a message was processed.
    async fn poll(&mut self, handler: &mut dyn MessageHandler) -> Result<bool, Self::Error>;
}
