#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_hal_async::delay::DelayNs;
use myrtio_homie::{HomieTransport, LastWill, MessageHandler, Publish, QoS, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect { clean_session: bool },
    Disconnect,
    Publish { topic: String, payload: String, retain: bool, qos: QoS },
    Subscribe { filter: String, qos: QoS },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Will {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub qos: QoS,
}

#[derive(Debug)]
pub struct MockError;

impl TransportError for MockError {}

/// Transport that records every call and replays queued inbound messages.
#[derive(Default)]
pub struct MockTransport {
    pub will: Option<Will>,
    pub events: Vec<Event>,
    pub inbox: VecDeque<(String, Vec<u8>)>,
    pub fail_publish: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &str) {
        self.inbox.push_back((topic.into(), payload.as_bytes().to_vec()));
    }

    /// `(topic, payload, retain)` of every publish, in order.
    pub fn publishes(&self) -> Vec<(&str, &str, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Publish { topic, payload, retain, .. } => {
                    Some((topic.as_str(), payload.as_str(), *retain))
                }
                _ => None,
            })
            .collect()
    }

    /// Payloads published to `topic`, in order.
    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.publishes()
            .into_iter()
            .filter(|(t, _, _)| *t == topic)
            .map(|(_, p, _)| p)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Subscribe { filter, .. } => Some(filter.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl HomieTransport for MockTransport {
    type Error = MockError;

    fn set_last_will(&mut self, will: &LastWill<'_>) {
        self.will = Some(Will {
            topic: will.topic.into(),
            payload: String::from_utf8_lossy(will.payload).into_owned(),
            retain: will.retain,
            qos: will.qos,
        });
    }

    async fn connect(&mut self, clean_session: bool) -> Result<(), MockError> {
        self.events.push(Event::Connect { clean_session });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MockError> {
        self.events.push(Event::Disconnect);
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), MockError> {
        if self.fail_publish {
            return Err(MockError);
        }
        self.events.push(Event::Publish {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
            qos,
        });
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), MockError> {
        self.events.push(Event::Subscribe {
            filter: filter.into(),
            qos,
        });
        Ok(())
    }

    async fn poll(&mut self, handler: &mut dyn MessageHandler) -> Result<bool, MockError> {
        match self.inbox.pop_front() {
            Some((topic, payload)) => {
                handler.on_message(&Publish::new(&topic, &payload));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Delay that returns immediately and counts what it was asked for.
#[derive(Default)]
pub struct NoDelay {
    pub total_ms: u64,
}

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}
