//! Homie property: one leaf value of the topic tree.

use heapless::String;

use crate::error::{ConfigError, HomieError};
use crate::runtime::{PublishOutbox, Settable};
use crate::topic::{self, TopicBuf, TopicPath};
use crate::transport::HomieTransport;

use super::{HOMIE_QOS, publish};

/// Maximum length of a property value in its wire form.
pub const MAX_VALUE_LEN: usize = 64;

pub type Value = String<MAX_VALUE_LEN>;

/// Payload type advertised in `$datatype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Datatype {
    String,
    Integer,
    Float,
    Boolean,
    Enum,
    Color,
}

impl Datatype {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Integer => "integer",
            Datatype::Float => "float",
            Datatype::Boolean => "boolean",
            Datatype::Enum => "enum",
            Datatype::Color => "color",
        }
    }
}

/// Index handle of a property inside a device.
///
/// Drivers keep handles instead of references so the device stays the single
/// owner of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PropertyRef {
    pub node: usize,
    pub property: usize,
}

/// An inbound `base/device/node/property/set` message.
#[derive(Debug, Clone, Copy)]
pub struct SetCommand<'m> {
    path: &'m TopicPath<'m>,
    value: &'m str,
}

impl<'m> SetCommand<'m> {
    pub fn new(path: &'m TopicPath<'m>, value: &'m str) -> Self {
        Self { path, value }
    }

    /// The full topic as received.
    pub fn topic(&self) -> &'m str {
        self.path.raw()
    }

    /// The raw topic levels.
    pub fn segments(&self) -> &'m [&'m str] {
        self.path.segments()
    }

    pub fn device(&self) -> &'m str {
        self.path.segment(1).unwrap_or_default()
    }

    pub fn node(&self) -> &'m str {
        self.path.segment(2).unwrap_or_default()
    }

    pub fn property(&self) -> &'m str {
        self.path.segment(3).unwrap_or_default()
    }

    /// The payload, decoded as UTF-8.
    pub fn value(&self) -> &'m str {
        self.value
    }
}

/// A single property.
///
/// The value is kept as text: the Homie wire format is textual and the
/// property never interprets it. Formatting numbers is up to the driver.
///
/// # Example
///
/// ```ignore
/// let on_set = |cmd: &SetCommand<'_>| pwm.set_percent(cmd.value());
/// let chan_a = Property::new("chan_a", "Dimmer A", Datatype::Float)
///     .with_unit("%")
///     .with_format("0:100")
///     .with_setter(&on_set)
///     .with_value("0")?;
/// ```
pub struct Property<'a> {
    id: &'a str,
    name: &'a str,
    datatype: Datatype,
    unit: Option<&'a str>,
    format: Option<&'a str>,
    retained: bool,
    value: Value,
    setter: Option<&'a dyn Settable>,
    value_topic: Option<TopicBuf>,
}

impl<'a> Property<'a> {
    /// Create a retained, read-only property with no value yet.
    pub const fn new(id: &'a str, name: &'a str, datatype: Datatype) -> Self {
        Self {
            id,
            name,
            datatype,
            unit: None,
            format: None,
            retained: true,
            value: String::new(),
            setter: None,
            value_topic: None,
        }
    }

    /// Set unit
    #[must_use]
    pub const fn with_unit(mut self, unit: &'a str) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set format (`min:max` for numbers, comma list for enums)
    #[must_use]
    pub const fn with_format(mut self, format: &'a str) -> Self {
        self.format = Some(format);
        self
    }

    /// Set whether value publishes are retained
    #[must_use]
    pub const fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    /// Make the property settable
    #[must_use]
    pub const fn with_setter(mut self, setter: &'a dyn Settable) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Set the initial value
    pub fn with_value(mut self, value: &str) -> Result<Self, ConfigError> {
        self.value = store(value)?;
        Ok(self)
    }

    pub fn id(&self) -> &'a str {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn unit(&self) -> Option<&'a str> {
        self.unit
    }

    pub fn format(&self) -> Option<&'a str> {
        self.format
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }

    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }

    /// The last value sent or received.
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// The value topic, known once the property has been exposed.
    pub fn value_topic(&self) -> Option<&str> {
        self.value_topic.as_ref().map(|t| t.as_str())
    }

    /// Publish the value and attributes under `node_topic/<id>`.
    ///
    /// Optional attributes are omitted entirely when unset: consumers treat
    /// the existence of a topic as meaningful. A property without a value
    /// leaves the value topic alone, since an empty retained publish would
    /// erase what the broker kept. Returns whether the property is settable.
    pub async fn expose<T: HomieTransport>(
        &mut self,
        transport: &mut T,
        node_topic: &str,
    ) -> Result<bool, HomieError<T::Error>> {
        let value_topic = topic::child(node_topic, self.id)?;
        if !self.value.is_empty() {
            publish(transport, &value_topic, self.value.as_bytes(), true).await?;
        }

        let attr = |name: &str| topic::child(&value_topic, name);

        publish(transport, &attr("$name")?, self.name.as_bytes(), true).await?;
        publish(
            transport,
            &attr("$datatype")?,
            self.datatype.as_str().as_bytes(),
            true,
        )
        .await?;
        if let Some(unit) = self.unit {
            publish(transport, &attr("$unit")?, unit.as_bytes(), true).await?;
        }
        if let Some(format) = self.format {
            publish(transport, &attr("$format")?, format.as_bytes(), true).await?;
        }
        if !self.retained {
            publish(transport, &attr("$retained")?, b"false", true).await?;
        }
        if self.setter.is_some() {
            publish(transport, &attr("$settable")?, b"true", true).await?;
        }

        self.value_topic = Some(value_topic);
        Ok(self.is_settable())
    }

    /// Store a new value and queue its publish.
    ///
    /// Before the property is exposed the value is only stored; `expose`
    /// publishes it.
    pub fn send_value(
        &mut self,
        value: &str,
        outbox: &mut dyn PublishOutbox,
    ) -> Result<(), ConfigError> {
        self.value = store(value)?;
        if let Some(value_topic) = &self.value_topic {
            outbox.publish(value_topic, value.as_bytes(), self.retained, HOMIE_QOS);
        }
        Ok(())
    }

    /// Offer an inbound set command to this property.
    ///
    /// Returns `true` if the command addresses this property, whether or not
    /// a setter exists, so routing stops here. The received value is echoed
    /// only if the setter accepts it.
    pub fn handle_set(&mut self, cmd: &SetCommand<'_>, outbox: &mut dyn PublishOutbox) -> bool {
        if cmd.property() != self.id {
            return false;
        }

        let Some(setter) = self.setter else {
            debug!("ignoring set on read-only property {}", self.id);
            return true;
        };

        if setter.handle(cmd) {
            if let Err(e) = self.send_value(cmd.value(), outbox) {
                warn!("cannot echo value for {}: {}", self.id, e);
            }
        }
        true
    }
}

fn store(value: &str) -> Result<Value, ConfigError> {
    Value::try_from(value).map_err(|_| ConfigError::ValueTooLong)
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::runtime::BufferedOutbox;

    type Outbox = BufferedOutbox<4, 64, 64>;

    fn exposed<'a>(mut prop: Property<'a>) -> Property<'a> {
        prop.value_topic = Some(TopicBuf::try_from("homie/dev/node/prop").unwrap());
        prop
    }

    #[test]
    fn send_value_before_expose_only_stores() {
        let mut outbox = Outbox::new();
        let mut prop = Property::new("prop", "Prop", Datatype::Integer);

        prop.send_value("12", &mut outbox).unwrap();
        assert_eq!(prop.value(), "12");
        assert!(outbox.is_empty());
    }

    #[test]
    fn send_value_uses_retained_flag() {
        let mut outbox = Outbox::new();
        let mut prop =
            exposed(Property::new("prop", "Prop", Datatype::Integer).with_retained(false));

        prop.send_value("7", &mut outbox).unwrap();
        let req = outbox.iter().next().unwrap();
        assert_eq!(req.topic.as_str(), "homie/dev/node/prop");
        assert_eq!(req.payload.as_slice(), b"7");
        assert!(!req.retain);
        assert_eq!(req.qos, HOMIE_QOS);
    }

    #[test]
    fn send_value_rejects_oversized() {
        let mut outbox = Outbox::new();
        let mut prop = Property::new("prop", "Prop", Datatype::String);
        let long = [b'x'; MAX_VALUE_LEN + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            prop.send_value(long, &mut outbox),
            Err(ConfigError::ValueTooLong)
        );
    }

    #[test]
    fn handle_set_echoes_accepted_value() {
        let calls = Cell::new(0);
        let accept = |cmd: &SetCommand<'_>| {
            calls.set(calls.get() + 1);
            cmd.value() == "42"
        };
        let mut outbox = Outbox::new();
        let mut prop =
            exposed(Property::new("prop", "Prop", Datatype::Integer).with_setter(&accept));

        let path = TopicPath::parse("homie/dev/node/prop/set").unwrap();
        assert!(prop.handle_set(&SetCommand::new(&path, "41"), &mut outbox));
        assert!(outbox.is_empty());

        assert!(prop.handle_set(&SetCommand::new(&path, "42"), &mut outbox));
        assert_eq!(calls.get(), 2);
        assert_eq!(prop.value(), "42");
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn handle_set_claims_read_only_property() {
        let mut outbox = Outbox::new();
        let mut prop = exposed(Property::new("prop", "Prop", Datatype::Integer));

        let path = TopicPath::parse("homie/dev/node/prop/set").unwrap();
        assert!(prop.handle_set(&SetCommand::new(&path, "1"), &mut outbox));
        assert!(outbox.is_empty());

        let other = TopicPath::parse("homie/dev/node/other/set").unwrap();
        assert!(!prop.handle_set(&SetCommand::new(&other, "1"), &mut outbox));
    }

    #[test]
    fn set_command_accessors() {
        let path = TopicPath::parse("homie/dev123/dimmer/chan_a/set").unwrap();
        let cmd = SetCommand::new(&path, "42");
        assert_eq!(cmd.device(), "dev123");
        assert_eq!(cmd.node(), "dimmer");
        assert_eq!(cmd.property(), "chan_a");
        assert_eq!(cmd.segments().len(), 5);
        assert_eq!(cmd.topic(), "homie/dev123/dimmer/chan_a/set");
    }
}
