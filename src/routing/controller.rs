use std::fmt;
use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, trace, warn, Level};

use super::error::ControllerError;
use super::subscription_set::SubscriptionSet;
use crate::backend::events::CONNECT_SUCCESS;
use crate::backend::{BackendError, BrokerBackend, BrokerEvent, BrokerEvents};
use crate::config::qos_from_level;
use crate::error::BridgeError;
use crate::forwarding::{LogProducer, MessageForwarder, RoutingKey};
use crate::topic::{TopicFilter, TopicRouter};

/// Broker session state as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
	#[default]
	Disconnected,
	Connected,
}

impl ConnectionState {
	pub fn is_connected(self) -> bool {
		self == ConnectionState::Connected
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| ConnectionState::Disconnected => write!(f, "disconnected"),
			| ConnectionState::Connected => write!(f, "connected"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
	Subscribe,
	Unsubscribe,
}

/// A broker request that failed while syncing subscriptions
#[derive(Debug)]
pub struct SyncFailure {
	pub operation: SyncOperation,
	pub filter: TopicFilter,
	pub error: BackendError,
}

/// Broker requests issued by a subscription change.
///
/// The local set always reflects the requested one, failures included.
#[derive(Debug, Default)]
pub struct SyncReport {
	/// Filters unsubscribed, in request order
	pub unsubscribed: Vec<TopicFilter>,
	/// Filters subscribed, in request order
	pub subscribed: Vec<TopicFilter>,
	pub failures: Vec<SyncFailure>,
}

impl SyncReport {
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Snapshot of the controller state
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeStatus {
	pub state: ConnectionState,
	pub qos: QoS,
	pub trace_context: bool,
	pub routing_key: RoutingKey,
	pub has_producer: bool,
	/// Number of filter to destination entries
	pub routes: usize,
	/// Distinct filters, as subscribed on the broker
	pub filters: Vec<TopicFilter>,
	pub counters: BridgeCounters,
}

/// Message counters since the bridge started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeCounters {
	pub messages_received: u64,
	/// Messages matching no filter
	pub messages_unrouted: u64,
	/// Records queued by the producer
	pub records_forwarded: u64,
	/// Records the producer refused
	pub forward_failures: u64,
}

type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
	Event(BrokerEvent),
	Connect(Reply<Result<(), BackendError>>),
	Disconnect(Reply<Result<(), BackendError>>),
	SetQos(QoS, Reply<()>),
	ReplaceSubscriptions(SubscriptionSet, Reply<SyncReport>),
	SetTraceContext(bool, Reply<()>),
	SetProducer(Arc<dyn LogProducer>, Reply<()>),
	SetRoutingKey(RoutingKey, Reply<()>),
	Status(Reply<BridgeStatus>),
}

impl fmt::Debug for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| Command::Event(event) => f.debug_tuple("Event").field(event).finish(),
			| Command::Connect(_) => f.write_str("Connect"),
			| Command::Disconnect(_) => f.write_str("Disconnect"),
			| Command::SetQos(qos, _) => f.debug_tuple("SetQos").field(qos).finish(),
			| Command::ReplaceSubscriptions(set, _) => f
				.debug_tuple("ReplaceSubscriptions")
				.field(&set.len())
				.finish(),
			| Command::SetTraceContext(enabled, _) => f
				.debug_tuple("SetTraceContext")
				.field(enabled)
				.finish(),
			| Command::SetProducer(..) => f.write_str("SetProducer"),
			| Command::SetRoutingKey(key, _) => {
				f.debug_tuple("SetRoutingKey").field(key).finish()
			}
			| Command::Status(_) => f.write_str("Status"),
		}
	}
}

/// Initial state handed to [`BridgeActor::spawn`]
pub(crate) struct ActorSetup {
	pub backend: Box<dyn BrokerBackend>,
	pub forwarder: MessageForwarder,
	pub subscriptions: SubscriptionSet,
	pub qos: QoS,
	pub routing_key: RoutingKey,
	pub command_channel_capacity: usize,
}

/// Single owner of the broker session, the subscription set and the
/// forwarder. Broker events and reconfiguration commands share one queue
/// and are handled one at a time.
pub(crate) struct BridgeActor {
	backend: Box<dyn BrokerBackend>,
	forwarder: MessageForwarder,
	router: TopicRouter,
	state: ConnectionState,
	qos: QoS,
	routing_key: RoutingKey,
	counters: BridgeCounters,
	command_rx: Receiver<Command>,
	shutdown_rx: oneshot::Receiver<()>,
}

impl BridgeActor {
	pub(crate) fn spawn(setup: ActorSetup) -> (BridgeController, BridgeHandle) {
		let ActorSetup {
			mut backend,
			forwarder,
			subscriptions,
			qos,
			routing_key,
			command_channel_capacity,
		} = setup;
		let (command_tx, command_rx) = channel(command_channel_capacity);
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		backend.attach(BrokerEvents::new(command_tx.clone()));

		let actor = Self {
			backend,
			forwarder,
			router: subscriptions.to_router(),
			state: ConnectionState::Disconnected,
			qos,
			routing_key,
			counters: BridgeCounters::default(),
			command_rx,
			shutdown_rx,
		};
		let join_handle = tokio::spawn(async move { actor.run().await });

		let controller = BridgeController {
			shutdown_tx,
			join_handle,
		};
		let handle = BridgeHandle { command_tx };
		(controller, handle)
	}

	async fn run(mut self) {
		loop {
			tokio::select! {
				_ = &mut self.shutdown_rx => {
					info!("Bridge controller: shutdown signal received");
					break;
				}
				cmd = self.command_rx.recv() => {
					match cmd {
						| Some(cmd) => self.handle_command(cmd).await,
						| None => {
							info!("Bridge controller: command channel closed, exiting");
							break;
						}
					}
				}
			}
		}
		self.release_session().await;
		info!("Bridge controller stopped");
	}

	async fn release_session(&mut self) {
		if self.state.is_connected() {
			if let Err(err) = self.backend.disconnect().await {
				warn!(error = %err, "Failed to disconnect broker session");
			}
			self.state = ConnectionState::Disconnected;
		}
		if let Err(err) = self.backend.shutdown().await {
			warn!(error = %err, "Failed to release broker backend");
		}
	}

	async fn handle_command(&mut self, cmd: Command) {
		trace!(command = ?cmd, "Bridge controller command");
		match cmd {
			| Command::Event(event) => self.handle_event(event).await,
			| Command::Connect(reply) => {
				let result = self.backend.connect().await;
				if let Err(err) = &result {
					error!(error = %err, "Failed to start broker session");
				}
				respond(reply, result);
			}
			| Command::Disconnect(reply) => {
				let result = self.backend.disconnect().await;
				self.enter_disconnected();
				respond(reply, result);
			}
			| Command::SetQos(qos, reply) => {
				info!(qos = ?qos, "Subscription QoS updated");
				self.qos = qos;
				respond(reply, ());
			}
			| Command::ReplaceSubscriptions(set, reply) => {
				let report = self.replace_subscriptions(set).await;
				respond(reply, report);
			}
			| Command::SetTraceContext(enabled, reply) => {
				info!(enabled, "Trace-context propagation updated");
				self.forwarder.set_trace_context(enabled);
				respond(reply, ());
			}
			| Command::SetProducer(producer, reply) => {
				info!("Streaming-log producer installed");
				self.forwarder.set_producer(producer);
				respond(reply, ());
			}
			| Command::SetRoutingKey(key, reply) => {
				self.routing_key = key;
				respond(reply, ());
			}
			| Command::Status(reply) => respond(reply, self.status()),
		}
	}

	async fn handle_event(&mut self, event: BrokerEvent) {
		match event {
			| BrokerEvent::Connected {
				code,
				session_present,
			} => {
				if code != CONNECT_SUCCESS {
					warn!(code, "Broker refused connection");
					return;
				}
				info!(session_present, "Connected to broker");
				self.state = ConnectionState::Connected;
				// Resubscribe even when the broker kept the session
				let filters = self.distinct_filters();
				let mut report = SyncReport::default();
				self.subscribe_all(&filters, &mut report).await;
				debug!(
					subscribed = report.subscribed.len(),
					failed = report.failures.len(),
					"Subscriptions restored"
				);
			}
			| BrokerEvent::Disconnected { code } => {
				if code == 0 {
					info!("Disconnected from broker");
				} else {
					warn!(code, "Broker connection lost");
				}
				self.enter_disconnected();
			}
			| BrokerEvent::Message { topic, payload } => {
				self.handle_message(topic, payload)
			}
			| BrokerEvent::SubscribeAck { pkid } => {
				debug!(pkid, "Subscribe acknowledged")
			}
			| BrokerEvent::UnsubscribeAck { pkid } => {
				debug!(pkid, "Unsubscribe acknowledged")
			}
			| BrokerEvent::PublishAck { pkid } => {
				debug!(pkid, "Publish acknowledged")
			}
			| BrokerEvent::Log { level, text } => log_broker_text(level, &text),
			| BrokerEvent::Error { message } => {
				error!(error = %message, "Broker session error")
			}
		}
	}

	fn enter_disconnected(&mut self) {
		// Subscriptions are kept for the next connect
		self.state = ConnectionState::Disconnected;
	}

	fn handle_message(&mut self, topic: ArcStr, payload: Bytes) {
		self.counters.messages_received += 1;
		let routes = self.router.route_topic(&topic);
		if routes.is_empty() {
			self.counters.messages_unrouted += 1;
			debug!(topic = %topic, "No subscription matches topic, message dropped");
			return;
		}
		for route in routes {
			let key = self.routing_key.select(&topic, route);
			match self.forwarder.forward(&route.destination, &key, payload.clone())
			{
				| Ok(()) => self.counters.records_forwarded += 1,
				| Err(err) => {
					self.counters.forward_failures += 1;
					error!(
						topic = %topic,
						destination = %route.destination,
						error = %err,
						"Failed to forward message, message dropped"
					);
				}
			}
		}
	}

	async fn replace_subscriptions(
		&mut self,
		set: SubscriptionSet,
	) -> SyncReport {
		let mut report = SyncReport::default();
		let connected = self.state.is_connected();
		if connected {
			let old_filters = self.distinct_filters();
			for filter in old_filters {
				match self.backend.unsubscribe(&filter).await {
					| Ok(()) => report.unsubscribed.push(filter),
					| Err(err) => {
						error!(filter = %filter, error = %err, "Failed to unsubscribe");
						report.failures.push(SyncFailure {
							operation: SyncOperation::Unsubscribe,
							filter,
							error: err,
						});
					}
				}
			}
		}

		self.router = set.to_router();
		info!(routes = self.router.len(), connected, "Subscription set replaced");

		if connected {
			let new_filters = self.distinct_filters();
			self.subscribe_all(&new_filters, &mut report).await;
		}
		report
	}

	async fn subscribe_all(
		&mut self,
		filters: &[TopicFilter],
		report: &mut SyncReport,
	) {
		for filter in filters {
			match self.backend.subscribe(filter, self.qos).await {
				| Ok(()) => {
					debug!(filter = %filter, qos = ?self.qos, "Subscribed");
					report.subscribed.push(filter.clone());
				}
				| Err(err) => {
					error!(filter = %filter, error = %err, "Failed to subscribe");
					report.failures.push(SyncFailure {
						operation: SyncOperation::Subscribe,
						filter: filter.clone(),
						error: err,
					});
				}
			}
		}
	}

	fn distinct_filters(&self) -> Vec<TopicFilter> {
		self.router.filters().into_iter().cloned().collect()
	}

	fn status(&self) -> BridgeStatus {
		BridgeStatus {
			state: self.state,
			qos: self.qos,
			trace_context: self.forwarder.trace_context(),
			routing_key: self.routing_key,
			has_producer: self.forwarder.has_producer(),
			routes: self.router.len(),
			filters: self.distinct_filters(),
			counters: self.counters,
		}
	}
}

fn respond<T>(reply: Reply<T>, value: T) {
	if reply.send(value).is_err() {
		warn!("Bridge controller: caller dropped before the response was sent");
	}
}

fn log_broker_text(level: Level, text: &str) {
	if level == Level::ERROR {
		error!(target: "mqtt_kafka_bridge::broker", "{text}");
	} else if level == Level::WARN {
		warn!(target: "mqtt_kafka_bridge::broker", "{text}");
	} else if level == Level::INFO {
		info!(target: "mqtt_kafka_bridge::broker", "{text}");
	} else if level == Level::DEBUG {
		debug!(target: "mqtt_kafka_bridge::broker", "{text}");
	} else {
		trace!(target: "mqtt_kafka_bridge::broker", "{text}");
	}
}

/// Stops the controller task
#[derive(Debug)]
pub struct BridgeController {
	shutdown_tx: oneshot::Sender<()>,
	join_handle: JoinHandle<()>,
}

impl BridgeController {
	pub async fn shutdown(self) -> Result<(), JoinError> {
		let _ = self.shutdown_tx.send(()).inspect_err(|_| {
			warn!("BridgeController: shutdown signal already sent");
		});
		self.join_handle.await.inspect_err(|e| {
			warn!(error = ?e, "BridgeController: actor run failed");
		})
	}
}

/// Cloneable front of the bridge controller.
///
/// Every call is queued behind the broker events received before it, so
/// a reply also means every earlier event was handled.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
	command_tx: Sender<Command>,
}

impl BridgeHandle {
	async fn request<T>(
		&self,
		command: impl FnOnce(Reply<T>) -> Command,
	) -> Result<T, ControllerError> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(command(tx))
			.await
			.map_err(|_| ControllerError::ChannelClosed)?;
		rx.await.map_err(|_| ControllerError::ResponseLost)
	}

	/// Starts or resumes the broker session.
	///
	/// Returns once the request is issued. Subscriptions are restored
	/// when the broker acknowledges the connection.
	pub async fn connect(&self) -> Result<(), BridgeError> {
		Ok(self.request(Command::Connect).await??)
	}

	/// Ends the broker session, keeping the subscription set
	pub async fn disconnect(&self) -> Result<(), BridgeError> {
		Ok(self.request(Command::Disconnect).await??)
	}

	/// Sets the QoS used by subsequent subscribe requests
	pub async fn set_qos(&self, level: u8) -> Result<(), BridgeError> {
		let qos = qos_from_level(level)?;
		Ok(self.request(|tx| Command::SetQos(qos, tx)).await?)
	}

	/// Swaps the subscription set, syncing the broker when connected.
	///
	/// Broker failures are reported in the returned [`SyncReport`], not as
	/// an error.
	pub async fn replace_subscriptions(
		&self,
		set: SubscriptionSet,
	) -> Result<SyncReport, BridgeError> {
		Ok(self
			.request(|tx| Command::ReplaceSubscriptions(set, tx))
			.await?)
	}

	pub async fn set_trace_context(
		&self,
		enabled: bool,
	) -> Result<(), BridgeError> {
		Ok(self
			.request(|tx| Command::SetTraceContext(enabled, tx))
			.await?)
	}

	pub async fn set_producer(
		&self,
		producer: Arc<dyn LogProducer>,
	) -> Result<(), BridgeError> {
		Ok(self.request(|tx| Command::SetProducer(producer, tx)).await?)
	}

	pub async fn set_routing_key(
		&self,
		key: RoutingKey,
	) -> Result<(), BridgeError> {
		Ok(self.request(|tx| Command::SetRoutingKey(key, tx)).await?)
	}

	pub async fn status(&self) -> Result<BridgeStatus, BridgeError> {
		Ok(self.request(Command::Status).await?)
	}

	/// Returns true once the controller has stopped
	pub fn is_closed(&self) -> bool {
		self.command_tx.is_closed()
	}
}
