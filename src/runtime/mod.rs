//! Runtime plumbing shared by the device and its drivers.
//!
//! # Overview
//!
//! - `PublishOutbox` / `BufferedOutbox`: the deferred publish queue drained
//!   once per tick
//! - `TopicRegistry`: the subscriptions a device has installed
//! - `Settable`, `PropertySink`, `PeriodicDriver`: the capability traits
//!   through which handlers and drivers reach the topic tree

pub(crate) mod publisher;
pub(crate) mod registry;
pub(crate) mod traits;

pub use publisher::{BufferedOutbox, OwnedPublishRequest};
pub use registry::{MAX_SUBSCRIPTIONS, TopicRegistry};
pub use traits::{PeriodicDriver, PropertySink, PublishOutbox, Settable};

// Re-export Publish for convenient use in handlers
pub use crate::message::Publish;
