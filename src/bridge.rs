use std::sync::Arc;

use tracing::info;

use crate::backend::{BrokerBackend, RumqttcBackend};
use crate::config::{BridgeConfig, ConfigurationError};
use crate::connection::BridgeConnection;
use crate::error::BridgeError;
use crate::forwarding::{DeliveryHandler, LogProducer, MessageForwarder};
use crate::routing::{ActorSetup, BridgeActor, BridgeHandle};

/// Assembles and starts a bridge.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use mqtt_kafka_bridge::{
///     BridgeBuilder, BridgeConfig, InMemoryProducer, SubscriptionSet,
/// };
///
/// # async fn run() -> Result<(), mqtt_kafka_bridge::BridgeError> {
/// let config = BridgeConfig::localhost("bridge")
///     .with_subscriptions(SubscriptionSet::parse("plant/+/temp=temps")?);
/// let (bridge, connection) = BridgeBuilder::new(config)
///     .producer(Arc::new(InMemoryProducer::new()))
///     .spawn()?;
/// bridge.connect().await?;
/// connection.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct BridgeBuilder {
	config: BridgeConfig,
	backend: Option<Box<dyn BrokerBackend>>,
	producer: Option<Arc<dyn LogProducer>>,
	delivery_handler: Option<Arc<dyn DeliveryHandler>>,
}

impl BridgeBuilder {
	pub fn new(config: BridgeConfig) -> Self {
		Self {
			config,
			backend: None,
			producer: None,
			delivery_handler: None,
		}
	}

	/// Broker backend to use instead of a [`RumqttcBackend`] built from
	/// the connection options
	pub fn backend(mut self, backend: impl BrokerBackend) -> Self {
		self.backend = Some(Box::new(backend));
		self
	}

	pub fn producer(mut self, producer: Arc<dyn LogProducer>) -> Self {
		self.producer = Some(producer);
		self
	}

	/// Handler for delivery reports; defaults to
	/// [`LoggingDeliveryHandler`](crate::forwarding::LoggingDeliveryHandler)
	pub fn delivery_handler(mut self, handler: Arc<dyn DeliveryHandler>) -> Self {
		self.delivery_handler = Some(handler);
		self
	}

	/// Validates the configuration and starts the controller task.
	///
	/// Fails without a producer. The broker session is not started; call
	/// [`BridgeHandle::connect`].
	pub fn spawn(self) -> Result<(BridgeHandle, BridgeConnection), BridgeError> {
		let BridgeBuilder {
			config,
			backend,
			producer,
			delivery_handler,
		} = self;
		let producer = producer.ok_or(ConfigurationError::ProducerMissing)?;
		config.settings.validate()?;

		let mut forwarder = match delivery_handler {
			| Some(handler) => MessageForwarder::new(handler),
			| None => MessageForwarder::default(),
		};
		forwarder.set_producer(producer);
		forwarder.set_trace_extractor(config.settings.trace_extractor()?);
		forwarder.set_trace_context(config.settings.trace_context);

		let backend: Box<dyn BrokerBackend> = match backend {
			| Some(backend) => backend,
			| None => Box::new(RumqttcBackend::new(
				config.connection.clone(),
				config.settings.event_loop_capacity,
			)),
		};

		info!(
			client_id = %config.connection.client_id(),
			routes = config.subscriptions.len(),
			qos = ?config.settings.qos,
			trace_context = config.settings.trace_context,
			"Starting bridge"
		);
		let (controller, handle) = BridgeActor::spawn(ActorSetup {
			backend,
			forwarder,
			subscriptions: config.subscriptions,
			qos: config.settings.qos,
			routing_key: config.settings.routing_key,
			command_channel_capacity: config.settings.command_channel_capacity,
		});
		Ok((handle, BridgeConnection::new(controller)))
	}
}
