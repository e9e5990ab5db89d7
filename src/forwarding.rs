//! Forwarding to the streaming log
//!
//! The [`MessageForwarder`] turns a routed MQTT message into an
//! [`OutboundRecord`] and hands it to a [`LogProducer`]. Sends are
//! asynchronous: acknowledgments arrive later through a
//! [`DeliveryHandler`]. A failed delivery is logged and the message is
//! lost; there is no retry or dead-letter path.

/// Delivery acknowledgment handling
pub mod delivery;
/// Forwarding error types
pub mod error;
pub mod forwarder;
#[cfg(feature = "kafka")]
pub mod kafka;
/// Streaming-log producer interface and the in-memory producer
pub mod producer;
pub mod record;

pub use delivery::{
	DeliveryError, DeliveryHandler, DeliveryMetadata, DeliveryReport,
	DeliveryStats, LoggingDeliveryHandler,
};
pub use error::{ForwardError, ProducerError};
pub use forwarder::MessageForwarder;
#[cfg(feature = "kafka")]
pub use kafka::KafkaProducer;
pub use producer::{InMemoryProducer, LogProducer};
pub use record::{OutboundRecord, RoutingKey};
