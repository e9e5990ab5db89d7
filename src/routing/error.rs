use thiserror::Error;

/// The controller task is gone
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
	/// The command queue is closed; the bridge was shut down
	#[error("Bridge controller command channel closed")]
	ChannelClosed,
	/// The controller stopped before answering
	#[error("Bridge controller dropped the response")]
	ResponseLost,
}
