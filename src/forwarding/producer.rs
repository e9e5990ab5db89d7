use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::delivery::{
	DeliveryError, DeliveryHandler, DeliveryMetadata, DeliveryReport,
};
use super::error::ProducerError;
use super::record::OutboundRecord;

/// Streaming-log client used by the forwarder.
///
/// `send` must not wait for the acknowledgment: it queues the record
/// and returns. The outcome is reported later through `handler`.
pub trait LogProducer: Send + Sync + 'static {
	fn send(
		&self,
		record: OutboundRecord,
		handler: Arc<dyn DeliveryHandler>,
	) -> Result<(), ProducerError>;
}

/// How the in-memory producer acknowledges records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryMode {
	/// Acknowledge every record successfully as soon as it is sent
	Immediate,
	/// Keep records pending until the test completes them
	Manual,
	/// Refuse every record with a full queue
	Rejecting,
}

struct PendingDelivery {
	record: OutboundRecord,
	handler: Arc<dyn DeliveryHandler>,
}

struct InMemoryState {
	mode: DeliveryMode,
	sent: Vec<OutboundRecord>,
	pending: VecDeque<PendingDelivery>,
	next_offset: i64,
}

/// Producer that keeps records in memory, for tests and dry runs.
///
/// Clones share the same state, so a test can keep one handle while the
/// bridge owns another.
#[derive(Clone)]
pub struct InMemoryProducer {
	state: Arc<Mutex<InMemoryState>>,
}

impl std::fmt::Debug for InMemoryProducer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.lock();
		f.debug_struct("InMemoryProducer")
			.field("mode", &state.mode)
			.field("sent", &state.sent.len())
			.field("pending", &state.pending.len())
			.finish()
	}
}

impl Default for InMemoryProducer {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryProducer {
	/// Producer that acknowledges every record immediately
	pub fn new() -> Self {
		Self::with_mode(DeliveryMode::Immediate)
	}

	/// Producer that holds acknowledgments until
	/// [`complete_next`](Self::complete_next) is called
	pub fn manual() -> Self {
		Self::with_mode(DeliveryMode::Manual)
	}

	/// Producer whose queue is always full
	pub fn rejecting() -> Self {
		Self::with_mode(DeliveryMode::Rejecting)
	}

	fn with_mode(mode: DeliveryMode) -> Self {
		Self {
			state: Arc::new(Mutex::new(InMemoryState {
				mode,
				sent: Vec::new(),
				pending: VecDeque::new(),
				next_offset: 0,
			})),
		}
	}

	fn lock(&self) -> MutexGuard<'_, InMemoryState> {
		// A panicking test thread must not hide the records from the others
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Every record accepted so far, in send order
	pub fn sent(&self) -> Vec<OutboundRecord> {
		self.lock().sent.clone()
	}

	pub fn pending(&self) -> usize {
		self.lock().pending.len()
	}

	/// Acknowledges the oldest pending record.
	///
	/// `Err(reason)` reports a delivery failure. Returns false when
	/// nothing was pending.
	pub fn complete_next(&self, outcome: Result<(), String>) -> bool {
		let (pending, offset) = {
			let mut state = self.lock();
			let Some(pending) = state.pending.pop_front() else {
				return false;
			};
			let offset = state.next_offset;
			state.next_offset += 1;
			(pending, offset)
		};
		// Handler runs without the lock held
		pending
			.handler
			.on_delivery(report_for(&pending.record, offset, outcome));
		true
	}
}

fn report_for(
	record: &OutboundRecord,
	offset: i64,
	outcome: Result<(), String>,
) -> DeliveryReport {
	match outcome {
		| Ok(()) => Ok(DeliveryMetadata {
			destination: record.destination.clone(),
			partition: 0,
			offset,
		}),
		| Err(reason) => {
			Err(DeliveryError::new(record.destination.clone(), reason))
		}
	}
}

impl LogProducer for InMemoryProducer {
	fn send(
		&self,
		record: OutboundRecord,
		handler: Arc<dyn DeliveryHandler>,
	) -> Result<(), ProducerError> {
		let immediate = {
			let mut state = self.lock();
			match state.mode {
				| DeliveryMode::Rejecting => return Err(ProducerError::QueueFull),
				| DeliveryMode::Manual => {
					state.sent.push(record.clone());
					state.pending.push_back(PendingDelivery { record, handler });
					None
				}
				| DeliveryMode::Immediate => {
					state.sent.push(record.clone());
					let offset = state.next_offset;
					state.next_offset += 1;
					Some((record, handler, offset))
				}
			}
		};
		if let Some((record, handler, offset)) = immediate {
			handler.on_delivery(report_for(&record, offset, Ok(())));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;

	use super::*;
	use crate::forwarding::{DeliveryStats, LoggingDeliveryHandler};

	fn record(destination: &str) -> OutboundRecord {
		OutboundRecord::new(destination, "key", Bytes::from_static(b"v"))
	}

	#[test]
	fn test_immediate_mode_acknowledges_on_send() {
		let producer = InMemoryProducer::new();
		let handler = Arc::new(LoggingDeliveryHandler::new());

		producer.send(record("a"), handler.clone()).unwrap();
		producer.send(record("b"), handler.clone()).unwrap();

		assert_eq!(producer.sent().len(), 2);
		assert_eq!(producer.pending(), 0);
		assert_eq!(handler.stats().delivered, 2);
	}

	#[test]
	fn test_manual_mode_completes_in_order() {
		let producer = InMemoryProducer::manual();
		let handler = Arc::new(LoggingDeliveryHandler::new());

		producer.send(record("a"), handler.clone()).unwrap();
		producer.send(record("b"), handler.clone()).unwrap();
		assert_eq!(handler.stats(), DeliveryStats::default());

		assert!(producer.complete_next(Ok(())));
		assert!(producer.complete_next(Err("timed out".to_string())));
		assert!(!producer.complete_next(Ok(())));

		assert_eq!(
			handler.stats(),
			DeliveryStats {
				delivered: 1,
				failed: 1
			}
		);
	}

	#[test]
	fn test_rejecting_mode_keeps_nothing() {
		let producer = InMemoryProducer::rejecting();
		let handler = Arc::new(LoggingDeliveryHandler::new());

		assert_eq!(
			producer.send(record("a"), handler),
			Err(ProducerError::QueueFull)
		);
		assert!(producer.sent().is_empty());
	}
}
