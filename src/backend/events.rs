use arcstr::ArcStr;
use bytes::Bytes;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::Level;

use super::error::BackendError;
use crate::routing::controller::Command;

/// Connect return code reported on success
pub const CONNECT_SUCCESS: u8 = 0;

/// Something that happened on the broker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
	/// Connection attempt finished; `code` 0 is success
	Connected { code: u8, session_present: bool },
	/// Session lost; `code` 0 is a requested disconnect
	Disconnected { code: u8 },
	/// Inbound publish
	Message { topic: ArcStr, payload: Bytes },
	SubscribeAck { pkid: u16 },
	UnsubscribeAck { pkid: u16 },
	PublishAck { pkid: u16 },
	/// Diagnostic text from the client library
	Log { level: Level, text: String },
	/// Session-level failure; reconnection is the backend's job
	Error { message: String },
}

impl BrokerEvent {
	pub fn connected() -> Self {
		Self::Connected {
			code: CONNECT_SUCCESS,
			session_present: false,
		}
	}

	pub fn message(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		Self::Message {
			topic: topic.into(),
			payload: payload.into(),
		}
	}
}

/// Sink for [`BrokerEvent`]s, feeding the bridge's command queue.
///
/// Events share the queue with reconfiguration commands, so both are
/// handled in arrival order.
#[derive(Debug, Clone)]
pub struct BrokerEvents {
	command_tx: Sender<Command>,
}

impl BrokerEvents {
	pub(crate) fn new(command_tx: Sender<Command>) -> Self {
		Self { command_tx }
	}

	/// Queues `event`, waiting for room.
	pub async fn emit(&self, event: BrokerEvent) -> Result<(), BackendError> {
		self.command_tx
			.send(Command::Event(event))
			.await
			.map_err(|_| BackendError::EventsClosed)
	}

	/// Queues `event` without waiting. For use from the controller task
	/// itself, where waiting on its own queue would deadlock.
	pub fn try_emit(&self, event: BrokerEvent) -> Result<(), BackendError> {
		match self.command_tx.try_send(Command::Event(event)) {
			| Ok(()) => Ok(()),
			| Err(TrySendError::Full(_)) => {
				Err(BackendError::rejected("event queue is full"))
			}
			| Err(TrySendError::Closed(_)) => Err(BackendError::EventsClosed),
		}
	}
}
