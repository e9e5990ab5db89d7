//! Crate-level error type

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigurationError;
use crate::forwarding::ForwardError;
use crate::routing::{ControllerError, SubscriptionSetError};
use crate::trace_context::TraceContextError;

/// Errors that can occur in bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
	/// Invalid or missing configuration; fatal at startup
	#[error("Configuration error: {0}")]
	Configuration(#[from] ConfigurationError),
	/// A message could not be handed to the streaming log
	#[error("Forwarding error: {0}")]
	Forward(#[from] ForwardError),
	/// The broker session refused a request
	#[error("Broker error: {0}")]
	Backend(#[from] BackendError),
	/// The bridge controller is gone
	#[error("Controller error: {0}")]
	Controller(#[from] ControllerError),
}

impl From<SubscriptionSetError> for BridgeError {
	fn from(err: SubscriptionSetError) -> Self {
		BridgeError::Configuration(err.into())
	}
}

impl From<TraceContextError> for BridgeError {
	fn from(err: TraceContextError) -> Self {
		BridgeError::Configuration(err.into())
	}
}

impl From<rumqttc::OptionError> for BridgeError {
	fn from(err: rumqttc::OptionError) -> Self {
		BridgeError::Configuration(err.into())
	}
}

impl BridgeError {
	/// Returns true for errors that must stop the bridge from starting
	pub fn is_configuration_error(&self) -> bool {
		match self {
			| BridgeError::Configuration(_) => true,
			| BridgeError::Forward(err) => err.is_configuration_error(),
			| _ => false,
		}
	}
}
