use std::time::Duration;

use thiserror::Error;

/// Errors raised by broker backends
#[derive(Debug, Error)]
pub enum BackendError {
	/// A request was issued before [`attach`](super::BrokerBackend::attach)
	#[error("Broker backend has no event sink attached")]
	NotAttached,
	/// The MQTT client refused the request
	#[error("MQTT client error: {0}")]
	Client(#[from] rumqttc::ClientError),
	/// The request queue stayed full for too long
	#[error("MQTT request timed out after {0:?}")]
	Timeout(Duration),
	/// The network loop task panicked or lost its state
	#[error("MQTT event loop failed: {0}")]
	EventLoop(String),
	/// The broker refused the request
	#[error("Broker rejected request: {0}")]
	Rejected(String),
	/// The bridge stopped consuming events
	#[error("Event channel closed")]
	EventsClosed,
}

impl BackendError {
	pub fn rejected(reason: impl Into<String>) -> Self {
		Self::Rejected(reason.into())
	}
}
