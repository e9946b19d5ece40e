use std::collections::HashMap;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use super::{IngestError, IngestService};
use crate::config::Config;
use crate::db::models::ReadingKind;

/// Routes inbound broker messages to the ingest service by exact topic
/// match. Unknown topics are dropped silently; undecodable payloads are
/// dropped with a log entry. Neither can fail the subscriber.
pub(crate) struct Dispatcher {
    topics: HashMap<String, ReadingKind>,
    service: IngestService,
}

impl Dispatcher {
    pub(crate) fn new(topics: HashMap<String, ReadingKind>, service: IngestService) -> Self {
        Self { topics, service }
    }

    pub(crate) fn kind_for(&self, topic: &str) -> Option<ReadingKind> {
        self.topics.get(topic).copied()
    }

    pub(crate) async fn dispatch(&self, topic: &str, payload: &[u8]) {
        let Some(kind) = self.kind_for(topic) else {
            trace!(topic = %topic, "No handler registered for topic; dropping");
            return;
        };

        let payload: Value = match std::str::from_utf8(payload)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str(text).map_err(anyhow::Error::from))
        {
            Ok(v) => v,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Dropping undecodable payload");
                return;
            }
        };

        match self.service.ingest(kind, &payload).await {
            Ok(reading) => {
                debug!(topic = %topic, id = %reading.id, "Message handled");
            }
            Err(IngestError::InvalidValue { field }) => {
                warn!(topic = %topic, field, "Dropping payload with missing or non-numeric value");
            }
            Err(IngestError::Store(e)) => {
                // The message is lost, not retried; the subscriber keeps going.
                error!(topic = %topic, error = %e, "Failed to persist reading");
            }
        }
    }
}

/// Owns the process-wide broker connection: connects, subscribes to the
/// fixed topic set, and re-subscribes after every reconnect.
///
/// Spawn `run` via `tokio::spawn`; it never returns and never panics on
/// transport errors.
pub struct MqttSubscriber {
    client: AsyncClient,
    eventloop: EventLoop,
    dispatcher: Dispatcher,
    broker: String,
    reconnect_delay: Duration,
}

impl MqttSubscriber {
    pub fn new(config: &Config, service: IngestService) -> Self {
        let mut options = MqttOptions::new(
            config.mqtt_client_id.clone(),
            config.mqtt_host.clone(),
            config.mqtt_port,
        );
        options.set_keep_alive(Duration::from_secs(30));

        let (client, eventloop) = AsyncClient::new(options, 64);

        Self {
            client,
            eventloop,
            dispatcher: Dispatcher::new(config.topic_map(), service),
            broker: format!("{}:{}", config.mqtt_host, config.mqtt_port),
            reconnect_delay: Duration::from_secs(config.mqtt_reconnect_secs),
        }
    }

    pub async fn run(mut self) {
        info!(broker = %self.broker, "MQTT subscriber started");

        loop {
            match self.eventloop.poll().await {
                // Fires on the first connect and on every automatic
                // reconnect, so the full topic set is always re-subscribed.
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("Connected to broker");
                    // Borrow only the client and the topic map, not `self`:
                    // the event loop is not `Sync`, and a `&self` held
                    // across this await would make the task unspawnable.
                    Self::subscribe_all(&self.client, &self.dispatcher.topics).await;
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    // Awaited in place: per-topic delivery order is preserved
                    // and a message is fully handled before the next poll.
                    self.dispatcher.dispatch(&publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_secs = self.reconnect_delay.as_secs(),
                        "Broker connection error; will reconnect"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Issues one subscribe request per configured topic and returns how
    /// many were accepted. A failed request for one topic does not stop
    /// the remaining ones.
    async fn subscribe_all(client: &AsyncClient, topics: &HashMap<String, ReadingKind>) -> usize {
        let mut subscribed = 0;
        for (topic, kind) in topics {
            match client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                Ok(()) => {
                    info!(topic = %topic, kind = %kind, "Subscribed");
                    subscribed += 1;
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Subscribe failed");
                }
            }
        }
        subscribed
    }
}
