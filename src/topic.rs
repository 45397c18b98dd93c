//! Topic construction and parsing for the Homie tree.
//!
//! Topics are built into bounded `heapless` strings. Inbound topics are split
//! into borrowed segments without copying.

use heapless::{String, Vec};

use crate::error::ConfigError;

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 128;

/// Maximum length of a comma-joined id list (`$nodes`, `$properties`).
pub const MAX_LIST_LEN: usize = 256;

/// Inbound topics with more levels than this are never routed.
pub const MAX_SEGMENTS: usize = 8;

/// Homie convention version advertised in `$homie`.
pub const HOMIE_VERSION: &str = "3.0";

/// Root of every Homie topic unless configured otherwise.
pub const DEFAULT_BASE: &str = "homie";

/// Second topic level of broadcast messages.
pub const BROADCAST: &str = "$broadcast";

/// Last topic level of inbound property commands.
pub const SET: &str = "set";

pub type TopicBuf = String<MAX_TOPIC_LEN>;

/// Check that `id` can be used verbatim as one topic level.
///
/// Ids must be non-empty, must not contain `/` or MQTT wildcards, and must not
/// start with `$` (reserved for attributes).
pub fn validate_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || id.starts_with('$') || id.contains(['/', '+', '#']) {
        return Err(ConfigError::InvalidId);
    }
    Ok(())
}

/// Join topic levels with `/`.
pub fn join(segments: &[&str]) -> Result<TopicBuf, ConfigError> {
    let mut topic = TopicBuf::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            topic.push('/').map_err(|_| ConfigError::TopicTooLong)?;
        }
        topic
            .push_str(segment)
            .map_err(|_| ConfigError::TopicTooLong)?;
    }
    Ok(topic)
}

/// Append one level to an existing topic.
pub fn child(base: &str, segment: &str) -> Result<TopicBuf, ConfigError> {
    join(&[base, segment])
}

/// Comma-join ids in the given order.
pub fn join_ids<'i>(
    ids: impl IntoIterator<Item = &'i str>,
) -> Result<String<MAX_LIST_LEN>, ConfigError> {
    let mut list = String::new();
    for (i, id) in ids.into_iter().enumerate() {
        if i > 0 {
            list.push(',').map_err(|_| ConfigError::TopicTooLong)?;
        }
        list.push_str(id).map_err(|_| ConfigError::TopicTooLong)?;
    }
    Ok(list)
}

/// An inbound topic split into levels.
#[derive(Debug, Clone)]
pub struct TopicPath<'a> {
    raw: &'a str,
    segments: Vec<&'a str, MAX_SEGMENTS>,
}

impl<'a> TopicPath<'a> {
    /// Split `raw` on `/`.
    ///
    /// Returns `None` when the topic has more than `MAX_SEGMENTS` levels;
    /// such topics cannot address anything in a Homie tree.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            segments.push(segment).ok()?;
        }
        Some(Self { raw, segments })
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&'a str> {
        self.segments.get(index).copied()
    }

    /// `base/device/node/property/set`
    pub fn is_set_command(&self) -> bool {
        self.len() == 5 && self.segment(4) == Some(SET)
    }

    /// `base/$broadcast/...`
    pub fn is_broadcast(&self) -> bool {
        self.segment(1) == Some(BROADCAST)
    }
}
