//! ---
//! fleet_section: "03-messaging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Pub/sub bus contract and in-memory broker."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{BusError, BusPublisher, BusSubscriber, Delivery, Result, SubscriptionMode};

/// Message as queued inside the broker.
#[derive(Debug)]
pub struct Envelope {
    /// Partition key supplied by the producer.
    pub partition_key: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Delivery attempt this envelope represents, starting at 1.
    pub attempts: u32,
}

struct Group {
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
    exclusive: bool,
}

#[derive(Default)]
struct TopicState {
    groups: HashMap<String, Group>,
    // retained for the first group to subscribe, so that publishes racing
    // subscription setup are not lost
    backlog: Vec<Envelope>,
}

/// Single-process broker for tests and the standalone daemon.
///
/// One unbounded queue per (topic, group); every group receives its own copy
/// of each publish, consumers within a group compete for messages. A single
/// queue per group makes delivery FIFO, which subsumes the per-partition-key
/// ordering guarantee for single-consumer groups.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<Mutex<HashMap<&'static str, TopicState>>>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a consumer group to a topic.
    pub fn subscribe(
        &self,
        topic: &'static str,
        group: &str,
        mode: SubscriptionMode,
    ) -> Result<InMemorySubscription> {
        let mut topics = self.topics.lock();
        let state = topics.entry(topic).or_default();

        if let Some(existing) = state.groups.get(group) {
            if existing.exclusive || mode == SubscriptionMode::Exclusive {
                return Err(BusError::GroupBusy(group.to_owned()));
            }
            return Ok(InMemorySubscription {
                topic,
                sender: existing.sender.clone(),
                receiver: Arc::clone(&existing.receiver),
            });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        for envelope in state.backlog.drain(..) {
            // first subscriber inherits everything published before it
            let _ = sender.send(envelope);
        }
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        state.groups.insert(
            group.to_owned(),
            Group {
                sender: sender.clone(),
                receiver: Arc::clone(&receiver),
                exclusive: mode == SubscriptionMode::Exclusive,
            },
        );
        Ok(InMemorySubscription {
            topic,
            sender,
            receiver,
        })
    }
}

#[async_trait]
impl BusPublisher for InMemoryBroker {
    async fn publish(
        &self,
        topic: &'static str,
        payload: Vec<u8>,
        partition_key: &str,
    ) -> Result<()> {
        let mut topics = self.topics.lock();
        let state = topics.entry(topic).or_default();

        if state.groups.is_empty() {
            state.backlog.push(Envelope {
                partition_key: partition_key.to_owned(),
                payload,
                attempts: 1,
            });
            return Ok(());
        }

        for (group, handle) in &state.groups {
            let envelope = Envelope {
                partition_key: partition_key.to_owned(),
                payload: payload.clone(),
                attempts: 1,
            };
            handle.sender.send(envelope).map_err(|_| BusError::Publish {
                topic: topic.to_owned(),
                reason: format!("group '{}' queue closed", group),
            })?;
        }
        Ok(())
    }
}

/// Consumer handle returned by [`InMemoryBroker::subscribe`].
pub struct InMemorySubscription {
    topic: &'static str,
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
}

#[async_trait]
impl BusSubscriber for InMemorySubscription {
    async fn receive(&self) -> Result<Delivery> {
        let mut receiver = self.receiver.lock().await;
        let envelope = receiver.recv().await.ok_or(BusError::Closed)?;
        Ok(Delivery {
            topic: self.topic,
            partition_key: envelope.partition_key,
            payload: envelope.payload,
            attempts: envelope.attempts,
            redeliver: Some(self.sender.clone()),
        })
    }
}
