use std::env;
use std::sync::Arc;

use mqtt_kafka_bridge::ConfigurationError;
use mqtt_kafka_bridge::prelude::*;
use rdkafka::config::ClientConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";

/// Setup tracing from the environment
///
/// `RUST_LOG_DISABLE` silences all output; otherwise `RUST_LOG` drives the
/// filter, defaulting to `info`.
fn setup_tracing() {
	if env::var("RUST_LOG_DISABLE").is_ok() {
		return;
	}
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| "info".into());
	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_thread_names(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.init();
}

/// Producer configuration from `KAFKA_BROKERS` and `KAFKA_*` variables.
///
/// `KAFKA_MESSAGE_TIMEOUT_MS=5000` becomes `message.timeout.ms=5000`.
fn kafka_config() -> ClientConfig {
	let mut config = ClientConfig::new();
	let brokers = env::var("KAFKA_BROKERS")
		.unwrap_or_else(|_| DEFAULT_KAFKA_BROKERS.to_string());
	config.set("bootstrap.servers", brokers);
	for (name, value) in env::vars() {
		let Some(key) = name.strip_prefix("KAFKA_") else {
			continue;
		};
		if key == "BROKERS" {
			continue;
		}
		config.set(key.to_ascii_lowercase().replace('_', "."), value);
	}
	config
}

async fn run() -> Result<(), BridgeError> {
	let config = BridgeConfig::from_env()?;
	let producer = KafkaProducer::from_config(&kafka_config())
		.map_err(|err| ConfigurationError::Producer(err.to_string()))?;

	let (bridge, connection) = BridgeBuilder::new(config)
		.producer(Arc::new(producer))
		.spawn()?;
	bridge.connect().await?;
	info!("Bridge running, press Ctrl-C to stop");

	if let Err(err) = tokio::signal::ctrl_c().await {
		error!(error = %err, "Failed to listen for Ctrl-C");
	}
	info!("Shutting down");
	connection.shutdown().await
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
	dotenv::dotenv().ok();
	setup_tracing();

	match run().await {
		| Ok(()) => std::process::ExitCode::SUCCESS,
		| Err(err) => {
			error!(error = %err, "Bridge failed");
			eprintln!("mqtt-kafka-bridge: {err}");
			std::process::ExitCode::FAILURE
		}
	}
}
