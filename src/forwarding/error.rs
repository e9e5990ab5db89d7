use thiserror::Error;

/// Errors raised by a producer before the record is queued
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProducerError {
	/// Local send queue is full
	#[error("Producer queue is full")]
	QueueFull,
	/// Producer refused the record
	#[error("Producer rejected record: {0}")]
	Rejected(String),
}

/// Errors returned by
/// [`MessageForwarder::forward`](super::MessageForwarder::forward)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardError {
	/// No producer was installed; a configuration error, not a message
	/// error
	#[error("Configuration error: no streaming-log producer installed")]
	ProducerMissing,
	/// The producer refused to queue the record; the message is lost
	#[error("Failed to enqueue record for '{destination}': {source}")]
	Enqueue {
		destination: String,
		#[source]
		source: ProducerError,
	},
}

impl ForwardError {
	/// Returns true for errors that must stop the bridge from starting
	pub fn is_configuration_error(&self) -> bool {
		matches!(self, ForwardError::ProducerMissing)
	}
}
