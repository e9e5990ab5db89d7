use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rumqttc::QoS;
use tracing::debug;

use super::error::BackendError;
use super::events::{BrokerEvent, BrokerEvents};
use super::BrokerBackend;
use crate::topic::TopicFilter;

/// Request received by an [`InMemoryBroker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
	Connect,
	Disconnect,
	Subscribe { filter: String, qos: QoS },
	Unsubscribe { filter: String },
	Shutdown,
}

impl BrokerCall {
	pub fn subscribe(filter: &str, qos: QoS) -> Self {
		Self::Subscribe {
			filter: filter.to_string(),
			qos,
		}
	}

	pub fn unsubscribe(filter: &str) -> Self {
		Self::Unsubscribe {
			filter: filter.to_string(),
		}
	}
}

#[derive(Default)]
struct BrokerState {
	calls: Vec<BrokerCall>,
	events: Option<BrokerEvents>,
	auto_connect: bool,
	failing_filters: HashSet<String>,
}

/// Broker backend that records requests and lets the caller inject
/// session events. No network involved.
///
/// Clones share the same state: keep one handle and give the other to
/// the bridge.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
	state: Arc<Mutex<BrokerState>>,
}

impl std::fmt::Debug for InMemoryBroker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.lock();
		f.debug_struct("InMemoryBroker")
			.field("calls", &state.calls.len())
			.field("attached", &state.events.is_some())
			.field("auto_connect", &state.auto_connect)
			.finish()
	}
}

impl InMemoryBroker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Acknowledge every `connect` request with a successful
	/// [`BrokerEvent::Connected`]
	pub fn with_auto_connect(self) -> Self {
		self.lock().auto_connect = true;
		self
	}

	/// Make every subscribe or unsubscribe request for `filter` fail
	pub fn fail_requests_for(&self, filter: &str) {
		self.lock().failing_filters.insert(filter.to_string());
	}

	fn lock(&self) -> MutexGuard<'_, BrokerState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Requests received so far, in order
	pub fn calls(&self) -> Vec<BrokerCall> {
		self.lock().calls.clone()
	}

	/// Returns the recorded requests and forgets them
	pub fn take_calls(&self) -> Vec<BrokerCall> {
		std::mem::take(&mut self.lock().calls)
	}

	/// Filters currently subscribed, replaying the recorded requests
	pub fn subscribed_filters(&self) -> Vec<String> {
		let mut active: Vec<String> = Vec::new();
		for call in self.lock().calls.iter() {
			match call {
				| BrokerCall::Subscribe { filter, .. } => {
					if !active.contains(filter) {
						active.push(filter.clone());
					}
				}
				| BrokerCall::Unsubscribe { filter } => {
					active.retain(|f| f != filter);
				}
				| BrokerCall::Disconnect | BrokerCall::Shutdown => active.clear(),
				| BrokerCall::Connect => {}
			}
		}
		active
	}

	/// Pushes `event` into the attached bridge.
	pub async fn emit(&self, event: BrokerEvent) -> Result<(), BackendError> {
		let events = self.lock().events.clone();
		match events {
			| Some(events) => events.emit(event).await,
			| None => Err(BackendError::NotAttached),
		}
	}

	pub async fn emit_connected(&self) -> Result<(), BackendError> {
		self.emit(BrokerEvent::connected()).await
	}

	pub async fn emit_disconnected(&self) -> Result<(), BackendError> {
		self.emit(BrokerEvent::Disconnected { code: 1 }).await
	}

	pub async fn emit_message(
		&self,
		topic: &str,
		payload: &[u8],
	) -> Result<(), BackendError> {
		self.emit(BrokerEvent::message(
			topic,
			bytes::Bytes::copy_from_slice(payload),
		))
		.await
	}

	fn record(&self, call: BrokerCall) -> Result<(), BackendError> {
		let mut state = self.lock();
		if state.events.is_none() {
			return Err(BackendError::NotAttached);
		}
		let failing = match &call {
			| BrokerCall::Subscribe { filter, .. }
			| BrokerCall::Unsubscribe { filter } => {
				state.failing_filters.contains(filter)
			}
			| _ => false,
		};
		debug!(call = ?call, failing, "In-memory broker request");
		state.calls.push(call);
		if failing {
			return Err(BackendError::rejected("request refused by test broker"));
		}
		Ok(())
	}
}

#[async_trait]
impl BrokerBackend for InMemoryBroker {
	fn attach(&mut self, events: BrokerEvents) {
		self.lock().events = Some(events);
	}

	async fn connect(&mut self) -> Result<(), BackendError> {
		self.record(BrokerCall::Connect)?;
		let auto_ack = {
			let state = self.lock();
			state.auto_connect.then(|| state.events.clone()).flatten()
		};
		if let Some(events) = auto_ack {
			// Called from the controller task: waiting here would deadlock
			events.try_emit(BrokerEvent::connected())?;
		}
		Ok(())
	}

	async fn disconnect(&mut self) -> Result<(), BackendError> {
		self.record(BrokerCall::Disconnect)
	}

	async fn subscribe(
		&mut self,
		filter: &TopicFilter,
		qos: QoS,
	) -> Result<(), BackendError> {
		self.record(BrokerCall::subscribe(filter.as_str(), qos))
	}

	async fn unsubscribe(
		&mut self,
		filter: &TopicFilter,
	) -> Result<(), BackendError> {
		self.record(BrokerCall::unsubscribe(filter.as_str()))
	}

	async fn shutdown(&mut self) -> Result<(), BackendError> {
		self.record(BrokerCall::Shutdown)?;
		self.lock().events = None;
		Ok(())
	}
}
