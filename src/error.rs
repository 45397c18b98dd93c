//! # Error Types
//!
//! Errors are split in two layers. `ConfigError` covers everything that can go
//! wrong while building or addressing the topic tree and never depends on the
//! transport. `HomieError<E>` is what the device returns from operations that
//! touch the broker, and wraps the transport's own error type.

use core::fmt;

use crate::transport;

/// Problems with the static device description or its bounded buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// An id is empty, contains `/`, `+`, `#`, or starts with `$`.
    InvalidId,
    /// Two nodes of a device, or two properties of a node, share an id.
    DuplicateId,
    /// A node or property table is full.
    CapacityExceeded,
    /// A value does not fit the property value buffer.
    ValueTooLong,
    /// A topic or comma-joined id list does not fit its buffer.
    TopicTooLong,
    /// A `PropertyRef` does not point into the device tree.
    UnknownProperty,
    /// The tree was already published; it cannot change any more.
    AlreadyExposed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidId => write!(f, "invalid topic id"),
            ConfigError::DuplicateId => write!(f, "duplicate id"),
            ConfigError::CapacityExceeded => write!(f, "capacity exceeded"),
            ConfigError::ValueTooLong => write!(f, "value too long"),
            ConfigError::TopicTooLong => write!(f, "topic too long"),
            ConfigError::UnknownProperty => write!(f, "unknown property"),
            ConfigError::AlreadyExposed => write!(f, "device tree already exposed"),
        }
    }
}

/// The primary error enum of the device layer.
///
/// It is generic over the transport error `E`, the same way `MqttError<T>`
/// wraps the error of the underlying stream.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomieError<E> {
    /// The transport failed. This is fatal for the device: the application is
    /// expected to shut down and restart (see `RestartPolicy`).
    Transport(E),
    /// The device description is invalid or a buffer overflowed.
    Config(ConfigError),
    /// The operation needs a bootstrapped device.
    NotReady,
}

impl<E: transport::TransportError> From<E> for HomieError<E> {
    fn from(err: E) -> Self {
        HomieError::Transport(err)
    }
}

impl<E> From<ConfigError> for HomieError<E> {
    fn from(err: ConfigError) -> Self {
        HomieError::Config(err)
    }
}

impl<E: fmt::Debug> fmt::Display for HomieError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HomieError::Transport(e) => write!(f, "transport error: {:?}", e),
            HomieError::Config(e) => write!(f, "configuration error: {}", e),
            HomieError::NotReady => write!(f, "device is not bootstrapped"),
        }
    }
}
