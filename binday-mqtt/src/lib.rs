//! Message-bus publisher for binday schedules.
//!
//! Each present category is announced with a retained discovery descriptor
//! and then updated through a retained state/attributes pair. Categories are
//! published independently; one failing does not stop the others.

/// Broker connection backed by `rumqttc`.
pub mod broker;
/// Topic layout and payload builders.
pub mod payload;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use binday_core::model::{Category, CouncilMeta, ScheduleEntry, ScheduleSnapshot};

use crate::payload::TopicLayout;

#[derive(thiserror::Error, Debug)]
/// Errors raised while talking to the broker.
pub enum MqttError {
    /// Request could not be queued on the client.
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    /// Connection to the broker failed.
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    /// Broker answered the connect with a failure code.
    #[error("MQTT broker refused connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),
    /// Broker did not acknowledge the connection in time.
    #[error("MQTT broker did not answer within {0:?}")]
    ConnectTimeout(Duration),
    /// Payload could not be encoded.
    #[error("Payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
/// Destination for retained messages.
pub trait MessageSink: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns an [`MqttError`] when the message cannot be handed to the transport.
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError>;
}

#[derive(Debug)]
/// Result of publishing one category.
pub struct CategoryOutcome {
    /// Category published.
    pub category: Category,
    /// Collection label that was published.
    pub label: String,
    /// Days until collection at publish time.
    pub days_until: i64,
    /// Transport result for the category.
    pub result: Result<(), MqttError>,
}

#[derive(Debug, Default)]
/// Per-category publish results.
pub struct PublishReport {
    /// One outcome per present category.
    pub outcomes: Vec<CategoryOutcome>,
}

impl PublishReport {
    /// Whether every present category was published.
    #[must_use]
    pub fn all_published(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    /// Number of categories published.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .count()
    }
}

/// Publishes snapshots through a [`MessageSink`].
pub struct Publisher<'a, S: MessageSink> {
    sink: &'a S,
    layout: TopicLayout,
    council: CouncilMeta,
}

impl<'a, S: MessageSink> Publisher<'a, S> {
    /// Publisher writing to `sink` with the given topic layout.
    #[must_use]
    pub fn new(sink: &'a S, layout: TopicLayout, council: CouncilMeta) -> Self {
        Self {
            sink,
            layout,
            council,
        }
    }

    /// Publish every present category of `snapshot`.
    pub async fn publish_snapshot(
        &self,
        snapshot: &ScheduleSnapshot,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> PublishReport {
        let mut report = PublishReport::default();

        for entry in snapshot.schedule.entries() {
            let result = self.publish_entry(entry, today, now).await;
            match &result {
                Ok(()) => tracing::info!(
                    category = %entry.category,
                    label = %entry.raw_date_label,
                    "published sensor"
                ),
                Err(err) => tracing::warn!(category = %entry.category, error = %err, "publish failed"),
            }
            report.outcomes.push(CategoryOutcome {
                category: entry.category,
                label: entry.raw_date_label.clone(),
                days_until: entry.days_until(today),
                result,
            });
        }

        report
    }

    async fn publish_entry(
        &self,
        entry: &ScheduleEntry,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), MqttError> {
        let category = entry.category;

        let discovery = payload::discovery_config(&self.layout, &self.council, category);
        self.sink
            .publish(
                &self.layout.discovery_topic(category),
                serde_json::to_vec(&discovery)?,
                true,
            )
            .await?;

        self.sink
            .publish(
                &self.layout.state_topic(category),
                entry.raw_date_label.clone().into_bytes(),
                true,
            )
            .await?;

        let attributes = payload::sensor_attributes(entry, today, now);
        self.sink
            .publish(
                &self.layout.attributes_topic(category),
                serde_json::to_vec(&attributes)?,
                true,
            )
            .await
    }
}
