//! Homie node: a named group of properties.

use heapless::Vec;

use crate::error::{ConfigError, HomieError};
use crate::runtime::PublishOutbox;
use crate::topic::{self, validate_id};
use crate::transport::HomieTransport;

use super::property::{Property, SetCommand};
use super::publish;

/// Maximum number of properties per node.
pub const MAX_PROPERTIES: usize = 8;

/// A node and its properties, in advertised order.
pub struct Node<'a> {
    id: &'a str,
    name: &'a str,
    properties: Vec<Property<'a>, MAX_PROPERTIES>,
}

impl<'a> Node<'a> {
    /// Create an empty node.
    pub const fn new(id: &'a str, name: &'a str) -> Self {
        Self {
            id,
            name,
            properties: Vec::new(),
        }
    }

    /// Append a property. Declaration order is the advertised order.
    pub fn add_property(&mut self, property: Property<'a>) -> Result<usize, ConfigError> {
        validate_id(property.id())?;
        if self.property_index(property.id()).is_some() {
            return Err(ConfigError::DuplicateId);
        }
        self.properties
            .push(property)
            .map_err(|_| ConfigError::CapacityExceeded)?;
        Ok(self.properties.len() - 1)
    }

    /// Builder flavour of `add_property`.
    pub fn with_property(mut self, property: Property<'a>) -> Result<Self, ConfigError> {
        self.add_property(property)?;
        Ok(self)
    }

    pub fn id(&self) -> &'a str {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn properties(&self) -> &[Property<'a>] {
        &self.properties
    }

    pub fn property(&self, id: &str) -> Option<&Property<'a>> {
        self.properties.iter().find(|p| p.id() == id)
    }

    pub fn property_index(&self, id: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.id() == id)
    }

    pub(crate) fn property_at_mut(&mut self, index: usize) -> Option<&mut Property<'a>> {
        self.properties.get_mut(index)
    }

    /// Publish `$name`, `$properties` and every property under
    /// `device_topic/<id>`. Returns whether any property is settable.
    pub async fn expose<T: HomieTransport>(
        &mut self,
        transport: &mut T,
        device_topic: &str,
    ) -> Result<bool, HomieError<T::Error>> {
        let node_topic = topic::child(device_topic, self.id)?;

        publish(
            transport,
            &topic::child(&node_topic, "$name")?,
            self.name.as_bytes(),
            true,
        )
        .await?;

        let ids = topic::join_ids(self.properties.iter().map(|p| p.id()))?;
        publish(
            transport,
            &topic::child(&node_topic, "$properties")?,
            ids.as_bytes(),
            true,
        )
        .await?;

        let mut settable = false;
        for property in self.properties.iter_mut() {
            settable |= property.expose(transport, &node_topic).await?;
        }
        Ok(settable)
    }

    /// Route a set command to the addressed property.
    ///
    /// A command for another node is rejected without looking at the
    /// properties. Returns `true` once a property claims the command.
    pub fn dispatch(&mut self, cmd: &SetCommand<'_>, outbox: &mut dyn PublishOutbox) -> bool {
        if cmd.node() != self.id {
            return false;
        }
        self.properties
            .iter_mut()
            .any(|property| property.handle_set(cmd, outbox))
    }
}
