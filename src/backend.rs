//! Broker session backends
//!
//! The bridge talks to the MQTT broker through the [`BrokerBackend`]
//! trait. A backend executes session requests (connect, subscribe, ...)
//! and reports what happens on the session as [`BrokerEvent`]s pushed into
//! the bridge's command queue through [`BrokerEvents`].

/// Backend error types
pub mod error;
/// Session events and the sink backends push them into
pub mod events;
pub mod memory;
pub mod rumqttc_backend;

use async_trait::async_trait;
use rumqttc::QoS;

pub use error::BackendError;
pub use events::{BrokerEvent, BrokerEvents};
pub use memory::{BrokerCall, InMemoryBroker};
pub use rumqttc_backend::RumqttcBackend;

use crate::topic::TopicFilter;

/// Broker session owned by the bridge controller.
///
/// Requests must not wait on the session's network loop: they are issued
/// from the controller task, which also consumes the events the loop
/// produces.
#[async_trait]
pub trait BrokerBackend: Send + 'static {
	/// Installs the sink for session events. Called once, before any
	/// other request.
	fn attach(&mut self, events: BrokerEvents);

	/// Starts or resumes the session. Completion is reported later as
	/// [`BrokerEvent::Connected`].
	async fn connect(&mut self) -> Result<(), BackendError>;

	async fn disconnect(&mut self) -> Result<(), BackendError>;

	async fn subscribe(
		&mut self,
		filter: &TopicFilter,
		qos: QoS,
	) -> Result<(), BackendError>;

	async fn unsubscribe(
		&mut self,
		filter: &TopicFilter,
	) -> Result<(), BackendError>;

	/// Releases the session. No request is issued afterwards.
	async fn shutdown(&mut self) -> Result<(), BackendError>;
}
