//! End-to-end tests of the bridge controller
//!
//! Every test drives a real controller task with the in-memory broker and
//! producer, so no MQTT broker or Kafka cluster is needed. A call to
//! `status()` is queued behind previously emitted broker events, which
//! makes it a synchronization point.

use std::sync::Arc;

use mqtt_kafka_bridge::errors::ConfigurationError;
use mqtt_kafka_bridge::forwarding::{DeliveryStats, LoggingDeliveryHandler};
use mqtt_kafka_bridge::{
	BridgeBuilder, BridgeConfig, BridgeConnection, BridgeError, BridgeHandle,
	BrokerCall, BrokerEvent, ConnectionState, InMemoryBroker, InMemoryProducer,
	QoS, RoutingKey, SubscriptionSet, TraceHeader,
};

struct TestBridge {
	broker: InMemoryBroker,
	producer: InMemoryProducer,
	handle: BridgeHandle,
	connection: BridgeConnection,
}

fn subscriptions(pairs: &[(&str, &str)]) -> SubscriptionSet {
	SubscriptionSet::from_pairs(pairs.iter().copied()).unwrap()
}

fn start_with(config: BridgeConfig, producer: InMemoryProducer) -> TestBridge {
	let broker = InMemoryBroker::new().with_auto_connect();
	let (handle, connection) = BridgeBuilder::new(config)
		.backend(broker.clone())
		.producer(Arc::new(producer.clone()))
		.spawn()
		.unwrap();
	TestBridge {
		broker,
		producer,
		handle,
		connection,
	}
}

fn start(pairs: &[(&str, &str)]) -> TestBridge {
	let config = BridgeConfig::localhost("bridge-test")
		.with_subscriptions(subscriptions(pairs));
	start_with(config, InMemoryProducer::new())
}

async fn connected(pairs: &[(&str, &str)]) -> TestBridge {
	let bridge = start(pairs);
	bridge.handle.connect().await.unwrap();
	assert_eq!(
		bridge.handle.status().await.unwrap().state,
		ConnectionState::Connected
	);
	bridge
}

fn sent_pairs(producer: &InMemoryProducer) -> Vec<(String, String)> {
	let mut pairs: Vec<(String, String)> = producer
		.sent()
		.iter()
		.map(|r| (r.destination.to_string(), r.key.to_string()))
		.collect();
	pairs.sort();
	pairs
}

fn sub(filter: &str) -> BrokerCall {
	BrokerCall::subscribe(filter, QoS::AtMostOnce)
}

fn unsub(filter: &str) -> BrokerCall {
	BrokerCall::unsubscribe(filter)
}

#[tokio::test]
async fn test_connect_subscribes_each_distinct_filter() {
	let bridge =
		connected(&[("a/+", "d1"), ("a/b", "d2"), ("a/+", "d3")]).await;

	assert_eq!(
		bridge.broker.calls(),
		vec![BrokerCall::Connect, sub("a/+"), sub("a/b")]
	);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_broker_calls_before_connect() {
	let bridge = start(&[("a/#", "d")]);
	let status = bridge.handle.status().await.unwrap();

	assert_eq!(status.state, ConnectionState::Disconnected);
	assert!(bridge.broker.calls().is_empty());

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replace_while_connected_unsubscribes_then_subscribes() {
	let bridge = connected(&[("a/+", "d1"), ("b/#", "d2"), ("a/+", "d3")]).await;
	bridge.broker.take_calls();

	let report = bridge
		.handle
		.replace_subscriptions(subscriptions(&[("c/+", "d4"), ("d", "d5")]))
		.await
		.unwrap();

	assert!(report.is_clean());
	assert_eq!(
		bridge.broker.calls(),
		vec![unsub("a/+"), unsub("b/#"), sub("c/+"), sub("d")]
	);
	let unsubscribed: Vec<&str> =
		report.unsubscribed.iter().map(|f| f.as_str()).collect();
	let subscribed: Vec<&str> =
		report.subscribed.iter().map(|f| f.as_str()).collect();
	assert_eq!(unsubscribed, vec!["a/+", "b/#"]);
	assert_eq!(subscribed, vec!["c/+", "d"]);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replace_from_empty_set_only_subscribes() {
	let bridge = connected(&[]).await;
	assert_eq!(bridge.broker.take_calls(), vec![BrokerCall::Connect]);

	bridge
		.handle
		.replace_subscriptions(subscriptions(&[("x/y", "d")]))
		.await
		.unwrap();

	assert_eq!(bridge.broker.calls(), vec![sub("x/y")]);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replace_while_disconnected_makes_no_calls() {
	let bridge = start(&[("a/+", "d1")]);

	let report = bridge
		.handle
		.replace_subscriptions(subscriptions(&[("c/+", "d2")]))
		.await
		.unwrap();

	assert!(report.unsubscribed.is_empty());
	assert!(report.subscribed.is_empty());
	assert!(bridge.broker.calls().is_empty());

	// The new set is what gets subscribed on connect
	bridge.handle.connect().await.unwrap();
	bridge.handle.status().await.unwrap();
	assert_eq!(
		bridge.broker.calls(),
		vec![BrokerCall::Connect, sub("c/+")]
	);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_resubscribes_current_set() {
	let bridge = connected(&[("a/+", "d1")]).await;
	bridge
		.handle
		.replace_subscriptions(subscriptions(&[("b/+", "d2"), ("c/#", "d3")]))
		.await
		.unwrap();

	bridge.broker.emit_disconnected().await.unwrap();
	assert_eq!(
		bridge.handle.status().await.unwrap().state,
		ConnectionState::Disconnected
	);
	bridge.broker.take_calls();

	// Session state reported by the broker does not matter
	bridge
		.broker
		.emit(BrokerEvent::Connected {
			code: 0,
			session_present: true,
		})
		.await
		.unwrap();
	let status = bridge.handle.status().await.unwrap();

	assert_eq!(status.state, ConnectionState::Connected);
	assert_eq!(bridge.broker.calls(), vec![sub("b/+"), sub("c/#")]);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_keeps_set_without_unsubscribing() {
	let bridge = connected(&[("a/+", "d1"), ("b", "d2")]).await;
	bridge.broker.take_calls();

	bridge.handle.disconnect().await.unwrap();
	let status = bridge.handle.status().await.unwrap();

	assert_eq!(status.state, ConnectionState::Disconnected);
	assert_eq!(status.routes, 2);
	assert_eq!(bridge.broker.calls(), vec![BrokerCall::Disconnect]);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_message_fans_out_to_every_matching_entry() {
	let bridge = connected(&[("a/+", "d1"), ("a/b", "d2"), ("x/#", "d3")]).await;

	bridge.broker.emit_message("a/b", b"21.5").await.unwrap();
	bridge.handle.status().await.unwrap();

	assert_eq!(
		sent_pairs(&bridge.producer),
		vec![
			("d1".to_string(), "a/b".to_string()),
			("d2".to_string(), "a/b".to_string()),
		]
	);
	assert!(
		bridge
			.producer
			.sent()
			.iter()
			.all(|r| r.payload.as_ref() == b"21.5")
	);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unmatched_and_system_topics_are_dropped() {
	let bridge = connected(&[("#", "all"), ("a/+/c", "abc")]).await;

	bridge.broker.emit_message("$SYS/uptime", b"1").await.unwrap();
	bridge.broker.emit_message("a/x/y/c", b"2").await.unwrap();
	let counters = bridge.handle.status().await.unwrap().counters;

	// `#` takes a/x/y/c but never $SYS
	assert_eq!(
		sent_pairs(&bridge.producer),
		vec![("all".to_string(), "a/x/y/c".to_string())]
	);
	assert_eq!(counters.messages_received, 2);
	assert_eq!(counters.messages_unrouted, 1);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_routing_key_can_use_matched_filter() {
	let bridge = connected(&[("plant/+/temp", "temps")]).await;
	bridge
		.handle
		.set_routing_key(RoutingKey::Filter)
		.await
		.unwrap();

	bridge
		.broker
		.emit_message("plant/line1/temp", b"20")
		.await
		.unwrap();
	bridge.handle.status().await.unwrap();

	assert_eq!(
		sent_pairs(&bridge.producer),
		vec![("temps".to_string(), "plant/+/temp".to_string())]
	);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_trace_headers_follow_toggle() {
	let bridge = connected(&[("t", "d")]).await;
	let payload = b"trace-id: abc123 span-id: 7";

	bridge.broker.emit_message("t", payload).await.unwrap();
	bridge.handle.set_trace_context(true).await.unwrap();
	bridge.broker.emit_message("t", payload).await.unwrap();
	bridge.broker.emit_message("t", b"no markers").await.unwrap();
	assert!(bridge.handle.status().await.unwrap().trace_context);

	let sent = bridge.producer.sent();
	assert_eq!(sent.len(), 3);
	assert_eq!(sent[0].headers, None);
	assert_eq!(
		sent[1].headers,
		Some(vec![
			TraceHeader::new("trace-id", "abc123"),
			TraceHeader::new("span-id", "7"),
		])
	);
	assert_eq!(sent[2].headers, None);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_trace_context_enabled_from_config() {
	let mut config = BridgeConfig::localhost("bridge-test")
		.with_subscriptions(subscriptions(&[("t", "d")]));
	config.settings.trace_context = true;
	config.settings.trace_pattern = r"(\w+)=(\w+)".to_string();
	let bridge = start_with(config, InMemoryProducer::new());
	bridge.handle.connect().await.unwrap();

	bridge
		.broker
		.emit_message("t", b"trace=1 ignored: 2")
		.await
		.unwrap();
	bridge.handle.status().await.unwrap();

	assert_eq!(
		bridge.producer.sent()[0].headers,
		Some(vec![TraceHeader::new("trace", "1")])
	);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_spawn_without_producer_is_refused() {
	let broker = InMemoryBroker::new();
	let result = BridgeBuilder::new(BridgeConfig::localhost("bridge-test"))
		.backend(broker.clone())
		.spawn();

	let err = match result {
		| Ok(_) => panic!("bridge started without a producer"),
		| Err(err) => err,
	};
	assert!(err.is_configuration_error());
	assert!(matches!(
		err,
		BridgeError::Configuration(ConfigurationError::ProducerMissing)
	));
	assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_trace_pattern_is_refused() {
	let mut config = BridgeConfig::localhost("bridge-test");
	config.settings.trace_pattern = "(only-one-group)".to_string();
	let result = BridgeBuilder::new(config)
		.backend(InMemoryBroker::new())
		.producer(Arc::new(InMemoryProducer::new()))
		.spawn();

	assert!(matches!(
		result,
		Err(BridgeError::Configuration(ConfigurationError::TracePattern(_)))
	));
}

#[tokio::test]
async fn test_enqueue_failures_do_not_stop_the_bridge() {
	let config = BridgeConfig::localhost("bridge-test")
		.with_subscriptions(subscriptions(&[("a", "d")]));
	let bridge = start_with(config, InMemoryProducer::rejecting());
	bridge.handle.connect().await.unwrap();

	bridge.broker.emit_message("a", b"1").await.unwrap();
	bridge.broker.emit_message("a", b"2").await.unwrap();
	let status = bridge.handle.status().await.unwrap();

	assert_eq!(status.counters.forward_failures, 2);
	assert_eq!(status.counters.records_forwarded, 0);

	// A working producer takes over for later messages
	let replacement = InMemoryProducer::new();
	bridge
		.handle
		.set_producer(Arc::new(replacement.clone()))
		.await
		.unwrap();
	bridge.broker.emit_message("a", b"3").await.unwrap();
	bridge.handle.status().await.unwrap();
	assert_eq!(replacement.sent().len(), 1);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delivery_reports_reach_the_handler() {
	let producer = InMemoryProducer::manual();
	let handler = Arc::new(LoggingDeliveryHandler::new());
	let broker = InMemoryBroker::new().with_auto_connect();
	let (handle, connection) = BridgeBuilder::new(
		BridgeConfig::localhost("bridge-test")
			.with_subscriptions(subscriptions(&[("a/#", "d")])),
	)
	.backend(broker.clone())
	.producer(Arc::new(producer.clone()))
	.delivery_handler(handler.clone())
	.spawn()
	.unwrap();
	handle.connect().await.unwrap();

	broker.emit_message("a/1", b"x").await.unwrap();
	broker.emit_message("a/2", b"y").await.unwrap();
	handle.status().await.unwrap();
	assert_eq!(producer.pending(), 2);

	producer.complete_next(Ok(()));
	producer.complete_next(Err("message timed out".to_string()));

	assert_eq!(
		handler.stats(),
		DeliveryStats {
			delivered: 1,
			failed: 1
		}
	);

	connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_qos_is_rejected_before_use() {
	let bridge = start(&[("a", "d")]);

	assert!(matches!(
		bridge.handle.set_qos(7).await,
		Err(BridgeError::Configuration(ConfigurationError::InvalidQos {
			level: 7
		}))
	));
	bridge.handle.set_qos(1).await.unwrap();
	bridge.handle.connect().await.unwrap();
	bridge.handle.status().await.unwrap();

	assert_eq!(
		bridge.broker.calls(),
		vec![
			BrokerCall::Connect,
			BrokerCall::subscribe("a", QoS::AtLeastOnce)
		]
	);

	bridge.connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_handle_fails_after_shutdown() {
	let bridge = start(&[]);
	let handle = bridge.handle.clone();

	bridge.connection.shutdown().await.unwrap();

	assert!(handle.is_closed());
	assert!(matches!(
		handle.connect().await,
		Err(BridgeError::Controller(_))
	));
}
