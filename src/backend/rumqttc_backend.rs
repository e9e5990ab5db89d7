use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
	AsyncClient, ClientError, ConnAck, ConnectReturnCode, Event, EventLoop,
	MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::error::BackendError;
use super::events::{BrokerEvent, BrokerEvents, CONNECT_SUCCESS};
use super::BrokerBackend;
use crate::topic::TopicFilter;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Consecutive errors after which every further failure is logged at
/// error level
const ERROR_REPORT_THRESHOLD: u32 = 10;
/// How long a request may wait for room in the client's request queue
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
/// How long `disconnect` waits for the loop to flush the Disconnect packet
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

type EventSender = UnboundedSender<BrokerEvent>;

struct RunningLoop {
	stop_tx: oneshot::Sender<()>,
	handle: JoinHandle<EventLoop>,
}

/// Backend driving a `rumqttc` session.
///
/// The [`EventLoop`] is polled on its own tokio task while connected. The
/// task hands the loop back when it stops, so the same session options
/// and pending state are reused on the next `connect`.
///
/// The loop task never waits on the bridge: events go through an
/// unbounded relay that feeds the attached [`BrokerEvents`] in order, so
/// the request queue keeps draining while the bridge is busy.
pub struct RumqttcBackend {
	client: AsyncClient,
	event_loop: Option<EventLoop>,
	running: Option<RunningLoop>,
	events: Option<BrokerEvents>,
	relay: Option<EventSender>,
	/// True between a successful ConnAck and the end of that session
	session: Arc<AtomicBool>,
}

impl std::fmt::Debug for RumqttcBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RumqttcBackend")
			.field("running", &self.running.is_some())
			.field("attached", &self.events.is_some())
			.field("session", &self.session.load(Ordering::Acquire))
			.finish()
	}
}

impl RumqttcBackend {
	/// `capacity` bounds the client's request queue
	pub fn new(options: MqttOptions, capacity: usize) -> Self {
		let (client, event_loop) = AsyncClient::new(options, capacity);
		Self {
			client,
			event_loop: Some(event_loop),
			running: None,
			events: None,
			relay: None,
			session: Arc::new(AtomicBool::new(false)),
		}
	}

	fn is_running(&self) -> bool {
		self.running
			.as_ref()
			.is_some_and(|running| !running.handle.is_finished())
	}

	fn has_session(&self) -> bool {
		self.session.load(Ordering::Acquire)
	}

	/// Sender into the event relay, starting the relay on first use.
	///
	/// One relay serves every run of the loop, so events of a finished
	/// session always reach the bridge before those of the next one.
	fn event_relay(&mut self) -> Result<EventSender, BackendError> {
		if let Some(relay) = self.relay.as_ref().filter(|tx| !tx.is_closed()) {
			return Ok(relay.clone());
		}
		let events = self.events.clone().ok_or(BackendError::NotAttached)?;
		let (relay_tx, relay_rx) = mpsc::unbounded_channel();
		tokio::spawn(relay_events(relay_rx, events));
		self.relay = Some(relay_tx.clone());
		Ok(relay_tx)
	}

	/// Recovers the event loop from a finished or stopped task
	async fn reclaim_loop(
		&mut self,
		grace: Duration,
	) -> Result<(), BackendError> {
		let Some(RunningLoop {
			stop_tx,
			mut handle,
		}) = self.running.take()
		else {
			return Ok(());
		};
		let event_loop = match time::timeout(grace, &mut handle).await {
			| Ok(joined) => joined,
			| Err(_) => {
				debug!("Stopping MQTT event loop task");
				let _ = stop_tx.send(());
				handle.await
			}
		};
		self.session.store(false, Ordering::Release);
		let event_loop =
			event_loop.map_err(|err| BackendError::EventLoop(err.to_string()))?;
		self.event_loop = Some(event_loop);
		Ok(())
	}

	/// Polls the event loop until a Disconnect packet goes out or a stop
	/// signal arrives, then returns the loop.
	async fn run(
		mut event_loop: EventLoop,
		events: EventSender,
		session: Arc<AtomicBool>,
		mut stop_rx: oneshot::Receiver<()>,
	) -> EventLoop {
		let mut poll_state = PollState {
			session,
			error_count: 0,
		};
		loop {
			tokio::select! {
				biased;
				_ = &mut stop_rx => {
					info!("MQTT event loop stop requested");
					break;
				}
				keep_running = poll_once(
					&mut event_loop,
					&events,
					&mut poll_state,
				) => {
					if !keep_running {
						break;
					}
				}
			}
		}
		info!("MQTT event loop terminated");
		event_loop
	}
}

/// Forwards loop events to the bridge, waiting for room as needed
async fn relay_events(
	mut relay_rx: UnboundedReceiver<BrokerEvent>,
	events: BrokerEvents,
) {
	while let Some(event) = relay_rx.recv().await {
		if events.emit(event).await.is_err() {
			warn!("Bridge stopped consuming MQTT events");
			break;
		}
	}
	debug!("MQTT event relay finished");
}

/// Issues a request without waiting, falling back to a bounded wait when
/// the client's request queue is full
async fn request<F, Fut>(
	client: &AsyncClient,
	try_request: impl FnOnce(&AsyncClient) -> Result<(), ClientError>,
	wait_request: F,
) -> Result<(), BackendError>
where
	F: FnOnce(AsyncClient) -> Fut,
	Fut: std::future::Future<Output = Result<(), ClientError>>,
{
	match try_request(client) {
		| Ok(()) => Ok(()),
		| Err(ClientError::TryRequest(_)) => {
			time::timeout(REQUEST_TIMEOUT, wait_request(client.clone()))
				.await
				.map_err(|_| BackendError::Timeout(REQUEST_TIMEOUT))?
				.map_err(BackendError::from)
		}
		| Err(err) => Err(err.into()),
	}
}

struct PollState {
	session: Arc<AtomicBool>,
	error_count: u32,
}

impl PollState {
	fn set_session(&self, established: bool) {
		self.session.store(established, Ordering::Release);
	}

	/// Ends the session, returning whether one was established
	fn end_session(&self) -> bool {
		self.session.swap(false, Ordering::AcqRel)
	}
}

fn connect_code(code: ConnectReturnCode) -> u8 {
	match code {
		| ConnectReturnCode::Success => CONNECT_SUCCESS,
		| ConnectReturnCode::RefusedProtocolVersion => 1,
		| ConnectReturnCode::BadClientId => 2,
		| ConnectReturnCode::ServiceUnavailable => 3,
		| ConnectReturnCode::BadUserNamePassword => 4,
		| ConnectReturnCode::NotAuthorized => 5,
	}
}

/// One poll of the event loop. Returns false when the loop should stop.
async fn poll_once(
	event_loop: &mut EventLoop,
	events: &EventSender,
	state: &mut PollState,
) -> bool {
	let event = match event_loop.poll().await {
		| Ok(Event::Incoming(Packet::ConnAck(ConnAck {
			session_present,
			code,
		}))) => {
			state.error_count = 0;
			state.set_session(code == ConnectReturnCode::Success);
			Some(BrokerEvent::Connected {
				code: connect_code(code),
				session_present,
			})
		}
		| Ok(Event::Incoming(Packet::Publish(publish))) => {
			state.error_count = 0;
			debug!(
				topic = %publish.topic,
				payload_size = publish.payload.len(),
				"Received MQTT message"
			);
			Some(BrokerEvent::Message {
				topic: publish.topic.into(),
				payload: publish.payload,
			})
		}
		| Ok(Event::Incoming(Packet::SubAck(ack))) => {
			Some(BrokerEvent::SubscribeAck { pkid: ack.pkid })
		}
		| Ok(Event::Incoming(Packet::UnsubAck(ack))) => {
			Some(BrokerEvent::UnsubscribeAck { pkid: ack.pkid })
		}
		| Ok(Event::Incoming(Packet::PubAck(ack))) => {
			Some(BrokerEvent::PublishAck { pkid: ack.pkid })
		}
		| Ok(Event::Incoming(Packet::Disconnect)) => {
			info!("Received MQTT Disconnect packet from server");
			state.end_session();
			Some(BrokerEvent::Disconnected { code: 1 })
		}
		| Ok(Event::Outgoing(Outgoing::Disconnect)) => {
			info!("Sent MQTT Disconnect packet to server");
			state.end_session();
			// The loop stops either way
			let _ = events.send(BrokerEvent::Disconnected { code: 0 });
			return false;
		}
		| Ok(notification) => {
			state.error_count = 0;
			debug!(notification = ?notification, "Received MQTT notification");
			None
		}
		| Err(err) => {
			state.error_count += 1;
			if state.error_count >= ERROR_REPORT_THRESHOLD {
				error!(
					error_count = state.error_count,
					error = %err,
					"MQTT event loop keeps failing"
				);
			} else {
				warn!(
					error_count = state.error_count,
					error = %err,
					"MQTT event loop error"
				);
			}
			if state.end_session()
				&& events.send(BrokerEvent::Disconnected { code: 1 }).is_err()
			{
				return false;
			}
			let message = err.to_string();
			if events.send(BrokerEvent::Error { message }).is_err() {
				return false;
			}

			let delay = INITIAL_RETRY_DELAY
				* 2_u32.pow((state.error_count - 1).min(10));
			let delay = delay.min(MAX_RETRY_DELAY);
			debug!(
				delay = ?delay,
				error_count = state.error_count,
				"Retrying MQTT connection"
			);
			time::sleep(delay).await;
			None
		}
	};

	match event {
		| Some(event) => {
			if events.send(event).is_err() {
				warn!("MQTT event relay is gone");
				return false;
			}
			true
		}
		| None => true,
	}
}

#[async_trait]
impl BrokerBackend for RumqttcBackend {
	fn attach(&mut self, events: BrokerEvents) {
		self.events = Some(events);
		self.relay = None;
	}

	async fn connect(&mut self) -> Result<(), BackendError> {
		if self.is_running() {
			debug!("MQTT event loop already running");
			return Ok(());
		}
		let relay = self.event_relay()?;
		self.reclaim_loop(Duration::ZERO).await?;
		let event_loop = self.event_loop.take().ok_or_else(|| {
			BackendError::EventLoop("event loop was lost".to_string())
		})?;

		let (stop_tx, stop_rx) = oneshot::channel();
		let session = Arc::clone(&self.session);
		let handle =
			tokio::spawn(Self::run(event_loop, relay, session, stop_rx));
		self.running = Some(RunningLoop { stop_tx, handle });
		info!("MQTT event loop started");
		Ok(())
	}

	async fn disconnect(&mut self) -> Result<(), BackendError> {
		if self.running.is_none() {
			return Ok(());
		}
		if self.has_session() && self.is_running() {
			match self.client.try_disconnect() {
				| Ok(()) => return self.reclaim_loop(DISCONNECT_TIMEOUT).await,
				| Err(err) => {
					warn!(error = %err, "Failed to queue MQTT disconnect")
				}
			}
		}
		// No session to close: a queued Disconnect would end the next one
		debug!("No MQTT session established, stopping event loop");
		self.reclaim_loop(Duration::ZERO).await
	}

	async fn subscribe(
		&mut self,
		filter: &TopicFilter,
		qos: QoS,
	) -> Result<(), BackendError> {
		let topic = filter.to_string();
		let retry_topic = topic.clone();
		request(
			&self.client,
			move |client| client.try_subscribe(topic, qos),
			move |client| async move { client.subscribe(retry_topic, qos).await },
		)
		.await
	}

	async fn unsubscribe(
		&mut self,
		filter: &TopicFilter,
	) -> Result<(), BackendError> {
		let topic = filter.to_string();
		let retry_topic = topic.clone();
		request(
			&self.client,
			move |client| client.try_unsubscribe(topic),
			move |client| async move { client.unsubscribe(retry_topic).await },
		)
		.await
	}

	async fn shutdown(&mut self) -> Result<(), BackendError> {
		let result = self.disconnect().await;
		self.relay = None;
		self.events = None;
		self.event_loop = None;
		result
	}
}
