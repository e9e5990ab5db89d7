use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use tracing::debug;

use super::delivery::{DeliveryHandler, LoggingDeliveryHandler};
use super::error::ForwardError;
use super::producer::LogProducer;
use super::record::OutboundRecord;
use crate::trace_context::TraceContextExtractor;

/// Builds outbound records and sends them to the streaming log.
pub struct MessageForwarder {
	producer: Option<Arc<dyn LogProducer>>,
	delivery_handler: Arc<dyn DeliveryHandler>,
	trace_extractor: TraceContextExtractor,
	trace_context: bool,
}

impl std::fmt::Debug for MessageForwarder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MessageForwarder")
			.field("has_producer", &self.producer.is_some())
			.field("trace_context", &self.trace_context)
			.field("trace_pattern", &self.trace_extractor.pattern())
			.finish()
	}
}

impl Default for MessageForwarder {
	fn default() -> Self {
		Self::new(Arc::new(LoggingDeliveryHandler::new()))
	}
}

impl MessageForwarder {
	/// Forwarder without a producer and with trace-context propagation off
	pub fn new(delivery_handler: Arc<dyn DeliveryHandler>) -> Self {
		Self {
			producer: None,
			delivery_handler,
			trace_extractor: TraceContextExtractor::default(),
			trace_context: false,
		}
	}

	pub fn set_producer(&mut self, producer: Arc<dyn LogProducer>) {
		self.producer = Some(producer);
	}

	pub fn has_producer(&self) -> bool {
		self.producer.is_some()
	}

	pub fn set_trace_context(&mut self, enabled: bool) {
		self.trace_context = enabled;
	}

	pub fn trace_context(&self) -> bool {
		self.trace_context
	}

	pub fn set_trace_extractor(&mut self, extractor: TraceContextExtractor) {
		self.trace_extractor = extractor;
	}

	/// Sends `payload` to `destination` keyed by `routing_key`.
	///
	/// Returns once the record is queued by the producer; the delivery
	/// handler receives the acknowledgment later. The payload is an
	/// immutable shared buffer, so the caller may drop or reuse its own
	/// handle immediately.
	pub fn forward(
		&self,
		destination: &ArcStr,
		routing_key: &ArcStr,
		payload: Bytes,
	) -> Result<(), ForwardError> {
		let producer =
			self.producer.as_ref().ok_or(ForwardError::ProducerMissing)?;

		let headers = if self.trace_context {
			self.trace_extractor.extract(&payload)
		} else {
			None
		};
		debug!(
			destination = %destination,
			key = %routing_key,
			payload_size = payload.len(),
			headers = headers.as_ref().map_or(0, Vec::len),
			"Forwarding message"
		);

		let record =
			OutboundRecord::new(destination.clone(), routing_key.clone(), payload)
				.with_headers(headers);
		producer
			.send(record, Arc::clone(&self.delivery_handler))
			.map_err(|source| ForwardError::Enqueue {
				destination: destination.to_string(),
				source,
			})
	}
}
