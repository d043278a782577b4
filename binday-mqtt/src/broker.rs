//! MQTT broker connection backed by `rumqttc`.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tokio::time;

use crate::{MessageSink, MqttError};

/// Broker port used when none is configured.
pub const DEFAULT_PORT: u16 = 1883;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
/// How to reach the broker.
pub struct BrokerSettings {
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Username, used only together with a password.
    pub username: Option<String>,
    /// Password, used only together with a username.
    pub password: Option<String>,
    /// MQTT client id.
    pub client_id: String,
}

impl BrokerSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }
        options
    }
}

/// Live broker connection whose event loop runs on a background task.
pub struct BrokerSink {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl BrokerSink {
    /// Connect and wait for the broker to acknowledge the session.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError`] when the broker is unreachable, refuses the
    /// connection, or does not answer within `timeout`.
    pub async fn connect(settings: &BrokerSettings, timeout: Duration) -> Result<Self, MqttError> {
        tracing::info!(host = %settings.host, port = settings.port, "connecting to MQTT broker");

        let (client, mut event_loop) = AsyncClient::new(settings.options(), REQUEST_CAPACITY);

        time::timeout(timeout, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_elapsed| MqttError::ConnectTimeout(timeout))??;

        tracing::info!("connected to MQTT broker");
        Ok(Self {
            client,
            event_loop: tokio::spawn(drive(event_loop)),
        })
    }

    /// Flush queued messages and close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] when the disconnect request cannot be queued.
    pub async fn disconnect(self, timeout: Duration) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        match time::timeout(timeout, self.event_loop).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "MQTT event loop task failed"),
            Err(_elapsed) => tracing::warn!("MQTT event loop did not finish before timeout"),
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSink for BrokerSink {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await?;
        Ok(())
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), MqttError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = event_loop.poll().await? {
            return if ack.code == ConnectReturnCode::Success {
                Ok(())
            } else {
                Err(MqttError::Refused(ack.code))
            };
        }
    }
}

// Runs until the outgoing disconnect has been written or the connection drops.
async fn drive(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "MQTT connection closed");
                break;
            }
        }
    }
}
