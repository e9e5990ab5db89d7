//! Kafka producer backed by `rdkafka`

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, warn};

use super::delivery::{DeliveryError, DeliveryHandler, DeliveryMetadata};
use super::error::ProducerError;
use super::producer::LogProducer;
use super::record::OutboundRecord;

const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// [`LogProducer`] writing to Kafka through a [`FutureProducer`].
///
/// Delivery futures are awaited on spawned tokio tasks, so `send` must be
/// called from within a runtime.
#[derive(Clone)]
pub struct KafkaProducer {
	producer: FutureProducer,
}

impl std::fmt::Debug for KafkaProducer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KafkaProducer").finish_non_exhaustive()
	}
}

impl KafkaProducer {
	/// Producer for a comma-separated bootstrap server list
	pub fn new(brokers: &str) -> Result<Self, KafkaError> {
		let mut config = ClientConfig::new();
		config.set("bootstrap.servers", brokers).set(
			"message.timeout.ms",
			DEFAULT_MESSAGE_TIMEOUT.as_millis().to_string(),
		);
		Self::from_config(&config)
	}

	pub fn from_config(config: &ClientConfig) -> Result<Self, KafkaError> {
		let producer: FutureProducer = config.create()?;
		Ok(Self { producer })
	}
}

fn to_producer_error(err: KafkaError) -> ProducerError {
	match err.rdkafka_error_code() {
		| Some(RDKafkaErrorCode::QueueFull) => ProducerError::QueueFull,
		| _ => ProducerError::Rejected(err.to_string()),
	}
}

impl LogProducer for KafkaProducer {
	fn send(
		&self,
		record: OutboundRecord,
		handler: Arc<dyn DeliveryHandler>,
	) -> Result<(), ProducerError> {
		let headers = record.headers.as_ref().map(|headers| {
			headers.iter().fold(OwnedHeaders::new(), |acc, header| {
				acc.insert(Header {
					key: header.key.as_str(),
					value: Some(header.value.as_str()),
				})
			})
		});

		let mut future_record = FutureRecord::to(record.destination.as_str())
			.key(record.key.as_str())
			.payload(record.payload.as_ref());
		if let Some(headers) = headers {
			future_record = future_record.headers(headers);
		}

		let delivery = self
			.producer
			.send_result(future_record)
			.map_err(|(err, _)| to_producer_error(err))?;

		let destination = record.destination.clone();
		tokio::spawn(async move {
			let report = match delivery.await {
				| Ok(Ok((partition, offset))) => Ok(DeliveryMetadata {
					destination,
					partition,
					offset,
				}),
				| Ok(Err((err, _message))) => {
					Err(DeliveryError::new(destination, err.to_string()))
				}
				| Err(_canceled) => {
					warn!(destination = %destination, "Delivery future canceled");
					Err(DeliveryError::new(destination, "producer dropped"))
				}
			};
			handler.on_delivery(report);
		});
		debug!(destination = %record.destination, "Record queued");
		Ok(())
	}
}
