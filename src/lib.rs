//! # MQTT to Kafka bridge
//!
//! Subscribes to a configurable set of MQTT topic filters, matches every
//! inbound message against them and forwards it to the streaming-log
//! topics mapped from each matching filter.
//!
//! ## Features
//!
//! - **Wildcard routing**: filters with `+` and `#`, one send per matching
//!   entry (fan-out, no deduplication)
//! - **Live reconfiguration**: the subscription set is swapped atomically
//!   and the broker is kept in sync
//! - **Trace-context propagation**: `key: value` markers found in the
//!   payload become record headers
//! - **Asynchronous forwarding**: sends return once queued; delivery
//!   reports arrive through a [`DeliveryHandler`]
//! - **Pluggable collaborators**: `rumqttc` and `rdkafka` in production,
//!   in-memory broker and producer in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mqtt_kafka_bridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BridgeError> {
//!     let url = "mqtt://localhost:1883?client_id=bridge";
//!     let config = BridgeConfig::from_url(url)?.with_subscriptions(
//!         SubscriptionSet::parse(
//!             "plant/+/temp=temperatures;alarms/#=alarms,audit",
//!         )?,
//!     );
//!
//!     let (bridge, connection) = BridgeBuilder::new(config)
//!         .producer(Arc::new(InMemoryProducer::new()))
//!         .spawn()?;
//!     bridge.connect().await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     connection.shutdown().await
//! }
//! ```
//!
//! ## Delivery guarantees
//!
//! None beyond what the broker QoS and the producer give. A record the
//! streaming log fails to store is logged and lost.

pub mod backend;
mod bridge;
pub mod config;
mod connection;
pub mod error;
pub mod forwarding;
pub mod routing;
pub mod topic;
pub mod trace_context;

// === Core Public API ===
pub use bridge::BridgeBuilder;
pub use config::{BridgeConfig, BridgeSettings, ConfigurationError};
pub use connection::BridgeConnection;
pub use error::BridgeError;
pub use routing::{
	BridgeHandle, BridgeStatus, ConnectionState, SubscriptionSet, SyncReport,
};

// Collaborators
pub use backend::{
	BrokerBackend, BrokerCall, BrokerEvent, BrokerEvents, InMemoryBroker,
	RumqttcBackend,
};
#[cfg(feature = "kafka")]
pub use forwarding::KafkaProducer;
pub use forwarding::{
	DeliveryHandler, DeliveryReport, InMemoryProducer, LogProducer,
	LoggingDeliveryHandler, MessageForwarder, OutboundRecord, RoutingKey,
};
pub use trace_context::{TraceContextExtractor, TraceHeader};

// Essential external types
pub use rumqttc::QoS;

/// Result type alias for operations that may fail with BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_kafka_bridge::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for running a bridge

	pub use crate::{
		BridgeBuilder, BridgeConfig, BridgeConnection, BridgeError,
		BridgeHandle, InMemoryProducer, LogProducer, QoS, RoutingKey,
		SubscriptionSet,
	};
	#[cfg(feature = "kafka")]
	pub use crate::KafkaProducer;
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_kafka_bridge::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::backend::BackendError;
	pub use crate::config::ConfigurationError;
	pub use crate::error::BridgeError;
	pub use crate::forwarding::{DeliveryError, ForwardError, ProducerError};
	pub use crate::routing::{ControllerError, SubscriptionSetError};
	pub use crate::topic::{TopicFilterError, TopicMatcherError};
	pub use crate::trace_context::TraceContextError;
}
