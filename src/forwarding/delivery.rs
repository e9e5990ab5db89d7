use std::sync::atomic::{AtomicU64, Ordering};

use arcstr::ArcStr;
use thiserror::Error;
use tracing::{debug, error};

/// Where a record ended up in the streaming log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
	pub destination: ArcStr,
	pub partition: i32,
	pub offset: i64,
}

/// Downstream failure for one record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Delivery to '{destination}' failed: {reason}")]
pub struct DeliveryError {
	pub destination: ArcStr,
	pub reason: String,
}

impl DeliveryError {
	pub fn new(
		destination: impl Into<ArcStr>,
		reason: impl Into<String>,
	) -> Self {
		Self {
			destination: destination.into(),
			reason: reason.into(),
		}
	}
}

pub type DeliveryReport = Result<DeliveryMetadata, DeliveryError>;

/// Receives the acknowledgment of each send, out of band.
///
/// Called from the producer's own tasks, concurrently with the bridge.
pub trait DeliveryHandler: Send + Sync + 'static {
	fn on_delivery(&self, report: DeliveryReport);
}

/// Snapshot of the counters kept by [`LoggingDeliveryHandler`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
	pub delivered: u64,
	pub failed: u64,
}

/// Default handler: logs every report and counts outcomes.
///
/// Failed messages are lost.
#[derive(Debug, Default)]
pub struct LoggingDeliveryHandler {
	delivered: AtomicU64,
	failed: AtomicU64,
}

impl LoggingDeliveryHandler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stats(&self) -> DeliveryStats {
		DeliveryStats {
			delivered: self.delivered.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
		}
	}
}

impl DeliveryHandler for LoggingDeliveryHandler {
	fn on_delivery(&self, report: DeliveryReport) {
		match report {
			| Ok(metadata) => {
				self.delivered.fetch_add(1, Ordering::Relaxed);
				debug!(
					destination = %metadata.destination,
					partition = metadata.partition,
					offset = metadata.offset,
					"Message delivered"
				);
			}
			| Err(err) => {
				self.failed.fetch_add(1, Ordering::Relaxed);
				error!(
					destination = %err.destination,
					reason = %err.reason,
					"Message delivery failed, message dropped"
				);
			}
		}
	}
}
