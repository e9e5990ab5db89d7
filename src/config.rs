//! Configuration for bridge initialization

use std::env;
use std::time::Duration;

use rumqttc::{MqttOptions, OptionError, QoS};
use thiserror::Error;
use uuid::Uuid;

use crate::forwarding::RoutingKey;
use crate::routing::{SubscriptionSet, SubscriptionSetError};
use crate::trace_context::{
	TraceContextError, TraceContextExtractor, DEFAULT_TRACE_PATTERN,
};

/// Default broker when `MQTT_BROKER` is not set
pub const DEFAULT_BROKER_URL: &str = "mqtt://localhost:1883";
/// Prefix of generated client ids
pub const CLIENT_ID_PREFIX: &str = "mqtt-kafka-bridge";

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Invalid or missing configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
	#[error("Invalid QoS level {level}, expected 0, 1 or 2")]
	InvalidQos { level: u8 },
	#[error("No streaming-log producer installed")]
	ProducerMissing,
	#[error("Failed to create streaming-log producer: {0}")]
	Producer(String),
	#[error("Invalid trace-context pattern: {0}")]
	TracePattern(#[from] TraceContextError),
	#[error("Invalid subscription mapping: {0}")]
	Subscriptions(#[from] SubscriptionSetError),
	#[error("Invalid broker options: {0}")]
	BrokerOptions(#[from] OptionError),
	#[error("Invalid value '{value}' for {name}: {reason}")]
	InvalidEnv {
		name: String,
		value: String,
		reason: String,
	},
	#[error("{name} must be greater than zero")]
	ZeroCapacity { name: &'static str },
}

impl ConfigurationError {
	pub fn invalid_env(
		name: &str,
		value: &str,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidEnv {
			name: name.to_string(),
			value: value.to_string(),
			reason: reason.into(),
		}
	}
}

/// Validates an MQTT QoS level
pub fn qos_from_level(level: u8) -> Result<QoS, ConfigurationError> {
	match level {
		| 0 => Ok(QoS::AtMostOnce),
		| 1 => Ok(QoS::AtLeastOnce),
		| 2 => Ok(QoS::ExactlyOnce),
		| _ => Err(ConfigurationError::InvalidQos { level }),
	}
}

/// Bridge-level behavior settings
#[derive(Debug, Clone)]
pub struct BridgeSettings {
	/// QoS applied to every subscription
	pub qos: QoS,
	/// Attach trace-context headers extracted from payloads
	pub trace_context: bool,
	/// Two-group pattern used for trace-context extraction
	pub trace_pattern: String,
	/// Which string becomes the record key
	pub routing_key: RoutingKey,
	/// Capacity of the MQTT client's request queue (must be > 0)
	pub event_loop_capacity: usize,
	/// Capacity of the controller's command queue (must be > 0)
	pub command_channel_capacity: usize,
}

impl Default for BridgeSettings {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
			trace_context: false,
			trace_pattern: DEFAULT_TRACE_PATTERN.to_string(),
			routing_key: RoutingKey::Topic,
			event_loop_capacity: 10,
			command_channel_capacity: 100,
		}
	}
}

impl BridgeSettings {
	pub fn validate(&self) -> Result<(), ConfigurationError> {
		if self.event_loop_capacity == 0 {
			return Err(ConfigurationError::ZeroCapacity {
				name: "event_loop_capacity",
			});
		}
		if self.command_channel_capacity == 0 {
			return Err(ConfigurationError::ZeroCapacity {
				name: "command_channel_capacity",
			});
		}
		self.trace_extractor().map(|_| ())
	}

	/// Compiles the configured trace pattern
	pub fn trace_extractor(
		&self,
	) -> Result<TraceContextExtractor, ConfigurationError> {
		Ok(TraceContextExtractor::new(&self.trace_pattern)?)
	}
}

/// Configuration for bridge creation
#[derive(Debug, Clone)]
pub struct BridgeConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Bridge-level behavior settings
	pub settings: BridgeSettings,
	/// Filter to destination mapping installed at startup
	pub subscriptions: SubscriptionSet,
}

impl BridgeConfig {
	/// Create new config with common defaults
	///
	/// # Example
	/// ```rust
	/// use mqtt_kafka_bridge::BridgeConfig;
	///
	/// let config = BridgeConfig::new("bridge", "broker.hivemq.com", 1883);
	/// assert!(config.subscriptions.is_empty());
	/// ```
	pub fn new(client_id: &str, host: &str, port: u16) -> Self {
		Self {
			connection: MqttOptions::new(client_id, host, port),
			settings: BridgeSettings::default(),
			subscriptions: SubscriptionSet::new(),
		}
	}

	/// Parse connection options from a URL string
	///
	/// Supports the schemes rumqttc understands (`mqtt://`, `mqtts://`,
	/// `tcp://`, `ssl://`, `ws://`, `wss://`). The URL must carry a
	/// `client_id` query parameter.
	///
	/// # Example
	/// ```rust
	/// use mqtt_kafka_bridge::BridgeConfig;
	///
	/// let config =
	///     BridgeConfig::from_url("mqtt://localhost:1883?client_id=bridge")?;
	/// # Ok::<(), rumqttc::OptionError>(())
	/// ```
	pub fn from_url(url: &str) -> Result<Self, OptionError> {
		Ok(Self {
			connection: MqttOptions::parse_url(url)?,
			settings: BridgeSettings::default(),
			subscriptions: SubscriptionSet::new(),
		})
	}

	/// Convenience method for localhost development
	pub fn localhost(client_id: &str) -> Self {
		Self::new(client_id, "localhost", 1883)
	}

	pub fn with_subscriptions(mut self, subscriptions: SubscriptionSet) -> Self {
		self.subscriptions = subscriptions;
		self
	}

	/// Load configuration from the process environment.
	///
	/// `.env` is loaded first; variables already set take precedence.
	///
	/// | Variable | Meaning | Default |
	/// |---|---|---|
	/// | `MQTT_BROKER` | broker URL | `mqtt://localhost:1883` |
	/// | `MQTT_CLIENT_ID` | client id | `mqtt-kafka-bridge_<8 random hex>` |
	/// | `BRIDGE_QOS` | 0, 1 or 2 | 0 |
	/// | `BRIDGE_TOPICS` | `filter=dest[,dest];filter=dest` | empty |
	/// | `BRIDGE_TRACE_CONTEXT` | true/false | false |
	/// | `BRIDGE_TRACE_PATTERN` | two-group regex | built-in pattern |
	/// | `BRIDGE_ROUTING_KEY` | `topic` or `filter` | `topic` |
	pub fn from_env() -> Result<Self, ConfigurationError> {
		dotenv::dotenv().ok();
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Like [`from_env`](Self::from_env), reading variables through
	/// `lookup`
	pub fn from_lookup(
		lookup: impl Fn(&str) -> Option<String>,
	) -> Result<Self, ConfigurationError> {
		let broker =
			lookup("MQTT_BROKER").unwrap_or_else(|| DEFAULT_BROKER_URL.to_string());
		let client_id = lookup("MQTT_CLIENT_ID").unwrap_or_else(generate_client_id);
		let mut config = Self::from_url(&with_client_id(&broker, &client_id))?;
		config.connection.set_keep_alive(DEFAULT_KEEP_ALIVE);

		let settings = &mut config.settings;
		if let Some(value) = lookup("BRIDGE_QOS") {
			let level = value.trim().parse::<u8>().map_err(|err| {
				ConfigurationError::invalid_env("BRIDGE_QOS", &value, err.to_string())
			})?;
			settings.qos = qos_from_level(level)?;
		}
		if let Some(value) = lookup("BRIDGE_TRACE_CONTEXT") {
			settings.trace_context = parse_flag("BRIDGE_TRACE_CONTEXT", &value)?;
		}
		if let Some(value) = lookup("BRIDGE_TRACE_PATTERN") {
			settings.trace_pattern = value;
		}
		if let Some(value) = lookup("BRIDGE_ROUTING_KEY") {
			settings.routing_key = value.parse().map_err(|reason: String| {
				ConfigurationError::invalid_env("BRIDGE_ROUTING_KEY", &value, reason)
			})?;
		}
		settings.validate()?;

		if let Some(value) = lookup("BRIDGE_TOPICS") {
			config.subscriptions = SubscriptionSet::parse(&value)?;
		}
		Ok(config)
	}
}

/// Client id made of the crate prefix and 8 random hex characters
pub fn generate_client_id() -> String {
	let uuid = Uuid::new_v4().simple().to_string();
	format!("{CLIENT_ID_PREFIX}_{}", &uuid[.. 8])
}

fn with_client_id(url: &str, client_id: &str) -> String {
	if url.contains("client_id=") {
		url.to_string()
	} else if url.contains('?') {
		format!("{url}&client_id={client_id}")
	} else {
		format!("{url}?client_id={client_id}")
	}
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigurationError> {
	match value.trim().to_ascii_lowercase().as_str() {
		| "1" | "true" | "yes" | "on" => Ok(true),
		| "0" | "false" | "no" | "off" | "" => Ok(false),
		| _ => Err(ConfigurationError::invalid_env(
			name,
			value,
			"expected true or false",
		)),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn lookup_from(
		vars: &[(&str, &str)],
	) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_qos_levels() {
		assert_eq!(qos_from_level(0).unwrap(), QoS::AtMostOnce);
		assert_eq!(qos_from_level(2).unwrap(), QoS::ExactlyOnce);
		assert!(matches!(
			qos_from_level(3),
			Err(ConfigurationError::InvalidQos { level: 3 })
		));
	}

	#[test]
	fn test_defaults_from_empty_environment() {
		let config = BridgeConfig::from_lookup(lookup_from(&[])).unwrap();
		let (host, port) = config.connection.broker_address();
		assert_eq!(host, "localhost");
		assert_eq!(port, 1883);
		assert!(config.connection.client_id().starts_with("mqtt-kafka-bridge_"));
		assert_eq!(config.connection.client_id().len(), CLIENT_ID_PREFIX.len() + 9);
		assert_eq!(config.settings.qos, QoS::AtMostOnce);
		assert!(!config.settings.trace_context);
		assert_eq!(config.settings.routing_key, RoutingKey::Topic);
		assert!(config.subscriptions.is_empty());
	}

	#[test]
	fn test_environment_overrides() {
		let config = BridgeConfig::from_lookup(lookup_from(&[
			("MQTT_BROKER", "mqtt://broker.local:1884"),
			("MQTT_CLIENT_ID", "bridge-1"),
			("BRIDGE_QOS", "1"),
			("BRIDGE_TOPICS", "plant/+/temp=temps;alarms/#=alarms,audit"),
			("BRIDGE_TRACE_CONTEXT", "true"),
			("BRIDGE_ROUTING_KEY", "filter"),
		]))
		.unwrap();

		assert_eq!(
			config.connection.broker_address(),
			("broker.local".to_string(), 1884)
		);
		assert_eq!(config.connection.client_id(), "bridge-1");
		assert_eq!(config.settings.qos, QoS::AtLeastOnce);
		assert!(config.settings.trace_context);
		assert_eq!(config.settings.routing_key, RoutingKey::Filter);
		assert_eq!(config.subscriptions.len(), 3);
	}

	#[test]
	fn test_invalid_environment_values() {
		assert!(matches!(
			BridgeConfig::from_lookup(lookup_from(&[("BRIDGE_QOS", "5")])),
			Err(ConfigurationError::InvalidQos { level: 5 })
		));
		assert!(matches!(
			BridgeConfig::from_lookup(lookup_from(&[("BRIDGE_QOS", "high")])),
			Err(ConfigurationError::InvalidEnv { .. })
		));
		assert!(matches!(
			BridgeConfig::from_lookup(lookup_from(&[(
				"BRIDGE_TRACE_PATTERN",
				"no-groups"
			)])),
			Err(ConfigurationError::TracePattern(_))
		));
		assert!(matches!(
			BridgeConfig::from_lookup(lookup_from(&[("BRIDGE_TOPICS", "a/#/b=x")])),
			Err(ConfigurationError::Subscriptions(_))
		));
	}

	#[test]
	fn test_zero_capacity_is_rejected() {
		let settings = BridgeSettings {
			command_channel_capacity: 0,
			..BridgeSettings::default()
		};
		assert!(matches!(
			settings.validate(),
			Err(ConfigurationError::ZeroCapacity {
				name: "command_channel_capacity"
			})
		));
	}

	#[test]
	fn test_client_id_is_appended_once() {
		assert_eq!(
			with_client_id("mqtt://h:1883", "c"),
			"mqtt://h:1883?client_id=c"
		);
		assert_eq!(
			with_client_id("mqtt://h:1883?keep_alive_secs=5", "c"),
			"mqtt://h:1883?keep_alive_secs=5&client_id=c"
		);
		assert_eq!(
			with_client_id("mqtt://h:1883?client_id=x", "c"),
			"mqtt://h:1883?client_id=x"
		);
	}
}
