use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;

use binday_core::service::BindayService;
use binday_mqtt::Publisher;
use binday_mqtt::broker::{self, BrokerSettings, BrokerSink};
use binday_mqtt::payload::{self, TopicLayout};

use crate::output;

#[derive(Args)]
pub(crate) struct PublishArgs {
    /// Street address to publish collections for
    address: String,

    /// MQTT broker host
    #[arg(long, env = "BINDAY_MQTT_BROKER")]
    mqtt_broker: String,

    /// MQTT broker port
    #[arg(long, env = "BINDAY_MQTT_PORT", default_value_t = broker::DEFAULT_PORT)]
    mqtt_port: u16,

    /// MQTT username
    #[arg(long, env = "BINDAY_MQTT_USER", requires = "mqtt_password")]
    mqtt_user: Option<String>,

    /// MQTT password
    #[arg(long, env = "BINDAY_MQTT_PASSWORD", requires = "mqtt_user", hide_env_values = true)]
    mqtt_password: Option<String>,

    /// Prefix for state and attribute topics
    #[arg(long, env = "BINDAY_MQTT_TOPIC_PREFIX", default_value = payload::DEFAULT_TOPIC_PREFIX)]
    mqtt_topic_prefix: String,

    /// Prefix discovery descriptors are published under
    #[arg(long, env = "BINDAY_DISCOVERY_PREFIX", default_value = payload::DEFAULT_DISCOVERY_PREFIX)]
    discovery_prefix: String,
}

pub(crate) async fn run(service: &BindayService, args: PublishArgs, timeout: Duration) -> Result<()> {
    let query = crate::parse_address(&args.address)?;
    let snapshot = service.waste_collection_info(&query).await?;

    if snapshot.schedule.is_empty() {
        tracing::warn!(address = %snapshot.address.canonical_address, "no collections to publish");
        return Ok(());
    }

    let settings = BrokerSettings {
        host: args.mqtt_broker,
        port: args.mqtt_port,
        username: args.mqtt_user,
        password: args.mqtt_password,
        client_id: format!("binday-{}", std::process::id()),
    };
    let sink = BrokerSink::connect(&settings, timeout)
        .await
        .with_context(|| format!("connecting to {}:{}", settings.host, settings.port))?;

    let layout = TopicLayout::new(args.mqtt_topic_prefix, args.discovery_prefix);
    let publisher = Publisher::new(&sink, layout, service.council().clone());
    let clock = service.clock();
    let report = publisher
        .publish_snapshot(&snapshot, clock.today(), clock.now())
        .await;

    sink.disconnect(timeout).await?;

    let mut out = io::stdout().lock();
    output::write_publish_report(&mut out, &report)?;
    out.flush()?;

    if !report.all_published() {
        bail!(
            "{} of {} sensors failed to publish",
            report.outcomes.len() - report.published_count(),
            report.outcomes.len()
        );
    }
    Ok(())
}
