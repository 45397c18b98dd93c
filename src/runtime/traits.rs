//! Capability traits connecting the topic tree to the outside world.
//!
//! # Publishing Pattern
//!
//! Nothing that runs inside a transport poll or a driver tick performs I/O
//! directly. Property values are queued through `PublishOutbox` and state
//! changes are requested through `PropertySink`; the device performs the
//! actual async publishing once the callback has returned.
//!
//! All traits here are object-safe so drivers and handlers can be stored as
//! `&dyn` references without generic parameters leaking into the device type.

use embassy_time::Instant;

use crate::QoS;
use crate::homie::{PropertyRef, SetCommand};

/// Object-safe trait for queuing MQTT publish requests.
///
/// # Example
///
/// ```ignore
/// fn report(outbox: &mut dyn PublishOutbox) {
///     outbox.publish("homie/dev/env/temperature", b"21.5", true, QoS::AtLeastOnce);
/// }
/// ```
pub trait PublishOutbox {
    /// Queue a message for publishing.
    ///
    /// Returns `false` if the request could not be queued.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool;
}

/// Handler for inbound `.../set` commands of one property.
///
/// The return value decides whether the received value is echoed back to the
/// property's value topic. Return `true` when the actuator has taken (or is
/// assumed to have taken) the value.
///
/// Handlers take `&self`: the property and the driver that owns the hardware
/// usually share the handler, so mutable state lives in `Cell`/`RefCell`.
pub trait Settable {
    fn handle(&self, cmd: &SetCommand<'_>) -> bool;
}

impl<F> Settable for F
where
    F: Fn(&SetCommand<'_>) -> bool,
{
    fn handle(&self, cmd: &SetCommand<'_>) -> bool {
        self(cmd)
    }
}

/// What a periodic driver can do to the device.
pub trait PropertySink {
    /// Update a property value. The publish is deferred to the next flush.
    fn send_value(&mut self, property: PropertyRef, value: &str);

    /// Raise an alert on behalf of `property`, requesting the device-wide
    /// `Ready → Alert` transition (e.g. a sensor exhausted its retry budget).
    fn alert(&mut self, property: PropertyRef);

    /// Request the `Alert → Ready` transition after `property` was read
    /// successfully again.
    fn ready(&mut self, property: PropertyRef);
}

/// A driver polled from the main loop.
///
/// Environment sensors are typically driven once per second boundary, button
/// state machines on every loop iteration. The caller decides the cadence.
pub trait PeriodicDriver {
    fn periodic(&mut self, now: Instant, sink: &mut dyn PropertySink);
}

impl<D: PeriodicDriver + ?Sized> PeriodicDriver for &mut D {
    fn periodic(&mut self, now: Instant, sink: &mut dyn PropertySink) {
        (**self).periodic(now, sink)
    }
}
