//! # Homie Devices for Embedded Systems
//!
//! `myrtio-homie` implements the device side of the
//! [Homie convention](https://homieiot.github.io/) (v3.0) for `no_std`
//! firmware built on the [Embassy](https://embassy.dev/) ecosystem.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Topics, values and queues live in `heapless`
//!   buffers with fixed capacities.
//! - **Transport Agnostic:** The device drives any MQTT client through the
//!   narrow `HomieTransport` trait.
//! - **No Re-entrant Publishing:** Set handlers and drivers queue their
//!   publishes; the device flushes them once per tick.
//! - **Hardware Drivers:** Environment sensors, 1-Wire probes, analog inputs,
//!   PWM dimmers with push buttons and an RGB mixer, on top of
//!   `embedded-hal`.
//!
//! ## Topic Tree
//!
//! ```text
//! homie/<device>/$homie | $name | $state | $nodes
//! homie/<device>/<node>/$name | $properties
//! homie/<device>/<node>/<property>            value
//! homie/<device>/<node>/<property>/$name | $datatype | $unit | $format | $retained | $settable
//! homie/<device>/<node>/<property>/set        inbound commands
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let dimmer_a = DimmerOutput::new(pwm_a)?;
//! let node = Node::new("dimmer", "Dimmers channels")
//!     .with_property(dimmer_property("chan_a", "Dimmer A", &dimmer_a)?)?;
//!
//! let mut device = Device::new(transport, HomieConfig::new(), "a1b2c3", "Multicontroler")?
//!     .with_node(node)?;
//! let chan_a = device.property_ref("dimmer", "chan_a").ok_or(ConfigError::UnknownProperty)?;
//! let mut button_a = DimmerButton::new(button_pin, &dimmer_a, chan_a);
//!
//! device.bootstrap(&mut delay, Instant::now()).await?;
//! loop {
//!     device.tick(Instant::now()).await?;
//!     device.drive(Instant::now(), &mut [&mut button_a]).await?;
//!     Timer::after_millis(50).await;
//! }
//! ```
//!
//! On error, hand the device to `RestartPolicy::recover` and reset the chip
//! if it says so.

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod config;
pub mod driver;
pub mod error;
pub mod homie;
pub mod message;
pub mod runtime;
pub mod supervisor;
pub mod topic;
pub mod transport;

// Re-export key types for easier access at the crate root.
pub use config::{HomieConfig, ShutdownPolicy};
pub use error::{ConfigError, HomieError};
pub use homie::{
    Datatype, Device, DeviceState, HOMIE_QOS, Node, Property, PropertyRef, SetCommand,
};
pub use message::{InboundHandler, LastWill, Publish, QoS};
pub use supervisor::{RestartDecision, RestartPolicy};
pub use transport::{HomieTransport, MessageHandler, TransportError};
