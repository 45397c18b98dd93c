//! Homie device: protocol state machine and inbound routing.
//!
//! A `Device` is split in two halves so that the transport can borrow the
//! routing half mutably while it is being polled:
//!
//! - `Device` owns the transport and drives everything that performs I/O
//!   (bootstrap, state publishes, flushing queued values).
//! - `Router` owns the topic tree and implements `MessageHandler` and
//!   `PropertySink`. It never publishes; it only queues into its outbox.

use embassy_futures::yield_now;
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use crate::config::{HomieConfig, ShutdownPolicy};
use crate::error::{ConfigError, HomieError};
use crate::message::{InboundHandler, LastWill, Publish};
use crate::runtime::{
    BufferedOutbox, MAX_SUBSCRIPTIONS, PeriodicDriver, PropertySink, TopicRegistry,
};
use crate::topic::{self, BROADCAST, HOMIE_VERSION, MAX_TOPIC_LEN, SET, TopicBuf, TopicPath};
use crate::transport::{Discard, HomieTransport, MessageHandler};

use super::node::Node;
use super::property::{MAX_VALUE_LEN, Property, PropertyRef, SetCommand};
use super::state::DeviceState;
use super::{HOMIE_QOS, publish};

/// Maximum number of nodes per device.
pub const MAX_NODES: usize = 8;

/// Number of distinct value topics that can be queued between two flushes.
pub const OUTBOX_DEPTH: usize = 16;

type Outbox = BufferedOutbox<OUTBOX_DEPTH, MAX_TOPIC_LEN, MAX_VALUE_LEN>;

/// Routing half of a device.
pub(crate) struct Router<'a> {
    base: &'static str,
    id: &'a str,
    nodes: Vec<Node<'a>, MAX_NODES>,
    broadcast: Option<&'a dyn InboundHandler>,
    user: Option<&'a dyn InboundHandler>,
    outbox: Outbox,
    requested: Option<DeviceState>,
}

impl<'a> Router<'a> {
    /// Route one inbound message. Returns `true` if something consumed it.
    ///
    /// Set commands for this device are offered to the nodes first, then
    /// broadcasts go to the broadcast handler, and whatever is left goes to
    /// the user handler.
    fn route(&mut self, msg: &Publish<'_>) -> bool {
        let Some(path) = TopicPath::parse(msg.topic) else {
            debug!("topic {} has too many levels", msg.topic);
            return false;
        };

        if path.is_set_command()
            && path.segment(0) == Some(self.base)
            && path.segment(1) == Some(self.id)
        {
            match msg.payload_str() {
                Some(value) => {
                    let cmd = SetCommand::new(&path, value);
                    let outbox = &mut self.outbox;
                    if self
                        .nodes
                        .iter_mut()
                        .any(|node| node.dispatch(&cmd, &mut *outbox))
                    {
                        return true;
                    }
                }
                None if self.addresses_property(&path) => {
                    warn!("dropping non UTF-8 set payload on {}", msg.topic);
                    return true;
                }
                None => {}
            }
        }

        if path.is_broadcast() {
            if let Some(handler) = self.broadcast {
                handler.handle(msg);
                return true;
            }
        }

        match self.user {
            Some(handler) => {
                handler.handle(msg);
                true
            }
            None => false,
        }
    }

    fn addresses_property(&self, path: &TopicPath<'_>) -> bool {
        let (Some(node), Some(property)) = (path.segment(2), path.segment(3)) else {
            return false;
        };
        self.nodes
            .iter()
            .any(|n| n.id() == node && n.property(property).is_some())
    }

    fn property_mut(&mut self, property: PropertyRef) -> Result<&mut Property<'a>, ConfigError> {
        self.nodes
            .get_mut(property.node)
            .and_then(|node| node.property_at_mut(property.property))
            .ok_or(ConfigError::UnknownProperty)
    }

    fn set_value(&mut self, property: PropertyRef, value: &str) -> Result<(), ConfigError> {
        let outbox = &mut self.outbox;
        let target = self
            .nodes
            .get_mut(property.node)
            .and_then(|node| node.property_at_mut(property.property))
            .ok_or(ConfigError::UnknownProperty)?;
        target.send_value(value, outbox)
    }
}

impl MessageHandler for Router<'_> {
    fn on_message(&mut self, msg: &Publish<'_>) {
        if !self.route(msg) {
            debug!("no handler for {}", msg.topic);
        }
    }
}

impl PropertySink for Router<'_> {
    fn send_value(&mut self, property: PropertyRef, value: &str) {
        if let Err(e) = self.set_value(property, value) {
            warn!("cannot send value for {:?}: {}", property, e);
        }
    }

    fn alert(&mut self, property: PropertyRef) {
        match self.property_mut(property) {
            Ok(target) => warn!("alert raised by {}", target.id()),
            Err(_) => warn!("alert raised by {:?}", property),
        }
        self.requested = Some(DeviceState::Alert);
    }

    fn ready(&mut self, _property: PropertyRef) {
        self.requested = Some(DeviceState::Ready);
    }
}

/// A Homie device on top of a transport.
///
/// # Lifecycle
///
/// 1. Build the tree with `add_node` (or `with_node`).
/// 2. `bootstrap` once after the network is up.
/// 3. Call `tick` (and `drive` for periodic drivers) from the main loop.
/// 4. On a transport error, `shutdown` and restart; see `RestartPolicy`.
///
/// # Example
///
/// ```ignore
/// let mut device = Device::new(transport, HomieConfig::new(), "dev123", "Kitchen")?
///     .with_node(dimmer)?;
/// device.bootstrap(&mut delay, Instant::now()).await?;
/// loop {
///     device.tick(Instant::now()).await?;
/// }
/// ```
pub struct Device<'a, T: HomieTransport> {
    transport: T,
    config: HomieConfig,
    name: &'a str,
    device_topic: TopicBuf,
    state_topic: TopicBuf,
    state: DeviceState,
    last_state_publish: Option<Instant>,
    exposed: bool,
    subscriptions: TopicRegistry<MAX_SUBSCRIPTIONS>,
    router: Router<'a>,
}

impl<'a, T: HomieTransport> Device<'a, T> {
    /// Create a device with no nodes.
    pub fn new(
        transport: T,
        config: HomieConfig,
        id: &'a str,
        name: &'a str,
    ) -> Result<Self, ConfigError> {
        topic::validate_id(id)?;
        let device_topic = topic::join(&[config.base_topic, id])?;
        let state_topic = topic::child(&device_topic, "$state")?;

        Ok(Self {
            transport,
            name,
            device_topic,
            state_topic,
            state: DeviceState::Init,
            last_state_publish: None,
            exposed: false,
            subscriptions: TopicRegistry::new(),
            router: Router {
                base: config.base_topic,
                id,
                nodes: Vec::new(),
                broadcast: None,
                user: None,
                outbox: Outbox::new(),
                requested: None,
            },
            config,
        })
    }

    /// Append a node. Declaration order is the advertised order.
    ///
    /// The tree is frozen once it has been exposed.
    pub fn add_node(&mut self, node: Node<'a>) -> Result<usize, ConfigError> {
        if self.exposed {
            return Err(ConfigError::AlreadyExposed);
        }
        topic::validate_id(node.id())?;
        if self.router.nodes.iter().any(|n| n.id() == node.id()) {
            return Err(ConfigError::DuplicateId);
        }
        self.router
            .nodes
            .push(node)
            .map_err(|_| ConfigError::CapacityExceeded)?;
        Ok(self.router.nodes.len() - 1)
    }

    /// Builder flavour of `add_node`.
    pub fn with_node(mut self, node: Node<'a>) -> Result<Self, ConfigError> {
        self.add_node(node)?;
        Ok(self)
    }

    /// Handle messages on `base/$broadcast/#`.
    ///
    /// The broadcast subscription is only made when a handler is installed.
    #[must_use]
    pub fn with_broadcast_handler(mut self, handler: &'a dyn InboundHandler) -> Self {
        self.router.broadcast = Some(handler);
        self
    }

    /// Handle every inbound message that no property or broadcast handler
    /// consumed, e.g. messages on topics subscribed through `subscribe`.
    #[must_use]
    pub fn with_user_handler(mut self, handler: &'a dyn InboundHandler) -> Self {
        self.set_user_handler(handler);
        self
    }

    pub fn set_user_handler(&mut self, handler: &'a dyn InboundHandler) {
        self.router.user = Some(handler);
    }

    pub fn id(&self) -> &'a str {
        self.router.id
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn config(&self) -> &HomieConfig {
        &self.config
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// `base/<id>`
    pub fn topic(&self) -> &str {
        &self.device_topic
    }

    pub fn nodes(&self) -> &[Node<'a>] {
        &self.router.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node<'a>> {
        self.router.nodes.iter().find(|n| n.id() == id)
    }

    /// Look up the handle of `node/property`.
    pub fn property_ref(&self, node: &str, property: &str) -> Option<PropertyRef> {
        let node_index = self.router.nodes.iter().position(|n| n.id() == node)?;
        let property_index = self.router.nodes[node_index].property_index(property)?;
        Some(PropertyRef {
            node: node_index,
            property: property_index,
        })
    }

    pub fn property(&self, property: PropertyRef) -> Option<&Property<'a>> {
        self.router
            .nodes
            .get(property.node)?
            .properties()
            .get(property.property)
    }

    /// Filters the device is subscribed to.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter()
    }

    /// Number of value publishes waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.router.outbox.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Connect, publish the whole tree and become `ready`.
    ///
    /// The session is first opened clean and closed again to drop whatever
    /// the broker kept from a previous run, then reopened persistent. Set
    /// commands that arrive while the tree is being published (retained ones
    /// in particular) are drained and discarded after `settle_delay`, so a
    /// restart does not replay stale commands to the actuators.
    pub async fn bootstrap<D: DelayNs>(
        &mut self,
        delay: &mut D,
        now: Instant,
    ) -> Result<(), HomieError<T::Error>> {
        self.state = DeviceState::Init;
        self.subscriptions.clear();
        self.router.outbox.clear();
        self.router.requested = None;

        self.transport.set_last_will(&LastWill {
            topic: self.state_topic.as_str(),
            payload: DeviceState::Lost.as_str().as_bytes(),
            retain: true,
            qos: HOMIE_QOS,
        });
        self.transport.connect(true).await?;
        self.transport.disconnect().await?;
        self.transport.connect(false).await?;
        info!("connected as {}", self.device_topic.as_str());

        publish(
            &mut self.transport,
            &topic::child(&self.device_topic, "$homie")?,
            HOMIE_VERSION.as_bytes(),
            true,
        )
        .await?;
        publish(
            &mut self.transport,
            &topic::child(&self.device_topic, "$name")?,
            self.name.as_bytes(),
            true,
        )
        .await?;
        self.publish_state(now).await?;

        if self.expose().await? {
            let filter = topic::join(&[self.config.base_topic, self.router.id, "+", "+", SET])?;
            self.subscribe(&filter).await?;
        }

        delay
            .delay_ms(u32::try_from(self.config.settle_delay.as_millis()).unwrap_or(u32::MAX))
            .await;
        let mut stale = 0usize;
        while self.transport.poll(&mut Discard).await? {
            stale += 1;
            yield_now().await;
        }
        if stale > 0 {
            debug!("discarded {} stale messages", stale);
        }
        self.router.outbox.clear();
        self.router.requested = None;

        if self.router.broadcast.is_some() {
            let filter = topic::join(&[self.config.base_topic, BROADCAST, "#"])?;
            self.subscribe(&filter).await?;
        }

        self.transition(DeviceState::Ready, now).await
    }

    /// Publish `$nodes` and every node, in declaration order.
    ///
    /// Publishing is idempotent: everything is retained and re-exposing
    /// produces the same topics and payloads. Returns whether any property is
    /// settable.
    pub async fn expose(&mut self) -> Result<bool, HomieError<T::Error>> {
        let ids = topic::join_ids(self.router.nodes.iter().map(|n| n.id()))?;
        publish(
            &mut self.transport,
            &topic::child(&self.device_topic, "$nodes")?,
            ids.as_bytes(),
            true,
        )
        .await?;

        let mut settable = false;
        for node in self.router.nodes.iter_mut() {
            settable |= node.expose(&mut self.transport, &self.device_topic).await?;
        }
        self.exposed = true;
        Ok(settable)
    }

    /// Subscribe to an extra topic filter.
    ///
    /// Messages on it reach the user handler. Subscribing twice to the same
    /// filter is a no-op.
    pub async fn subscribe(&mut self, filter: &str) -> Result<(), HomieError<T::Error>> {
        if self.subscriptions.add(filter, HOMIE_QOS)? {
            debug!("subscribe {}", filter);
            self.transport.subscribe(filter, HOMIE_QOS).await?;
        }
        Ok(())
    }

    /// One iteration of the main loop: handle at most one inbound message,
    /// flush queued publishes and keep `$state` alive.
    pub async fn tick(&mut self, now: Instant) -> Result<(), HomieError<T::Error>> {
        if !self.state.is_running() {
            return Err(HomieError::NotReady);
        }
        self.transport.poll(&mut self.router).await?;
        self.flush(now).await?;
        self.keep_alive(now).await
    }

    /// Run periodic drivers against the tree, then flush.
    pub async fn drive(
        &mut self,
        now: Instant,
        drivers: &mut [&mut dyn PeriodicDriver],
    ) -> Result<(), HomieError<T::Error>> {
        if !self.state.is_running() {
            return Err(HomieError::NotReady);
        }
        for driver in drivers.iter_mut() {
            driver.periodic(now, &mut self.router);
        }
        self.flush(now).await
    }

    /// Publish queued values, then apply a requested state change.
    pub async fn flush(&mut self, now: Instant) -> Result<(), HomieError<T::Error>> {
        for req in self.router.outbox.take() {
            trace!(
                "{} = {}",
                req.topic.as_str(),
                core::str::from_utf8(&req.payload).unwrap_or("<binary>")
            );
            self.transport
                .publish(&req.topic, &req.payload, req.retain, req.qos)
                .await?;
        }
        if let Some(state) = self.router.requested.take() {
            self.transition(state, now).await?;
        }
        Ok(())
    }

    /// Store a property value and publish it.
    pub async fn send_value(
        &mut self,
        property: PropertyRef,
        value: &str,
        now: Instant,
    ) -> Result<(), HomieError<T::Error>> {
        self.router.set_value(property, value)?;
        self.flush(now).await
    }

    /// Feed one inbound message through the router without polling the
    /// transport. Returns whether it was consumed.
    pub fn dispatch(&mut self, msg: &Publish<'_>) -> bool {
        self.router.route(msg)
    }

    /// Enter `alert`. A no-op unless the device is `ready`.
    pub async fn alert(&mut self, now: Instant) -> Result<(), HomieError<T::Error>> {
        self.transition(DeviceState::Alert, now).await
    }

    /// Leave `alert`. A no-op unless the device is in `alert`.
    pub async fn ready(&mut self, now: Instant) -> Result<(), HomieError<T::Error>> {
        self.transition(DeviceState::Ready, now).await
    }

    /// Publish the current `$state`, retained.
    pub async fn publish_state(&mut self, now: Instant) -> Result<(), HomieError<T::Error>> {
        publish(
            &mut self.transport,
            &self.state_topic,
            self.state.as_str().as_bytes(),
            true,
        )
        .await?;
        self.last_state_publish = Some(now);
        Ok(())
    }

    /// Leave the broker in an orderly way.
    ///
    /// With `ShutdownPolicy::PublishLost` a retained `lost` is published first;
    /// a failure to do so is logged and the disconnect still attempted.
    pub async fn shutdown(&mut self) -> Result<(), HomieError<T::Error>> {
        if self.config.shutdown == ShutdownPolicy::PublishLost && self.state != DeviceState::Lost {
            let lost = DeviceState::Lost.as_str().as_bytes();
            if let Err(e) = publish(&mut self.transport, &self.state_topic, lost, true).await {
                warn!("cannot publish lost state: {}", e);
            }
        }
        self.state = DeviceState::Lost;
        self.last_state_publish = None;
        self.transport.disconnect().await?;
        info!("disconnected");
        Ok(())
    }

    async fn transition(
        &mut self,
        to: DeviceState,
        now: Instant,
    ) -> Result<(), HomieError<T::Error>> {
        if !self.state.can_transition(to) {
            trace!("ignoring state {} -> {}", self.state.as_str(), to.as_str());
            return Ok(());
        }
        info!("state {} -> {}", self.state.as_str(), to.as_str());
        self.state = to;
        self.publish_state(now).await
    }

    async fn keep_alive(&mut self, now: Instant) -> Result<(), HomieError<T::Error>> {
        let due = match self.last_state_publish {
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed > self.config.keep_alive),
            None => true,
        };
        if due {
            self.publish_state(now).await?;
        }
        Ok(())
    }
}
