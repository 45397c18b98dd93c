//! The Homie device model: device, nodes and properties.
//!
//! The device owns its nodes, nodes own their properties. At bootstrap the
//! device walks this tree depth-first and publishes it; at runtime inbound
//! messages walk it top-down until a property claims them.

pub(crate) mod device;
pub(crate) mod node;
pub(crate) mod property;
pub(crate) mod state;

pub use device::{Device, MAX_NODES, OUTBOX_DEPTH};
pub use node::{MAX_PROPERTIES, Node};
pub use property::{Datatype, MAX_VALUE_LEN, Property, PropertyRef, SetCommand, Value};
pub use state::DeviceState;

use crate::error::HomieError;
use crate::message::QoS;
use crate::transport::HomieTransport;

/// Every Homie publish and subscription uses at-least-once delivery.
pub const HOMIE_QOS: QoS = QoS::AtLeastOnce;

/// Publish one message, logging it.
pub(crate) async fn publish<T: HomieTransport>(
    transport: &mut T,
    topic: &str,
    payload: &[u8],
    retain: bool,
) -> Result<(), HomieError<T::Error>> {
    trace!(
        "{} = {}",
        topic,
        core::str::from_utf8(payload).unwrap_or("<binary>")
    );
    transport
        .publish(topic, payload, retain, HOMIE_QOS)
        .await
        .map_err(HomieError::Transport)
}
