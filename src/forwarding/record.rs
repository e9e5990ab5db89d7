use std::str::FromStr;

use arcstr::ArcStr;
use bytes::Bytes;

use crate::trace_context::TraceHeader;
use crate::topic::Route;

/// Record handed to the streaming log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
	/// Streaming-log topic the record is written to
	pub destination: ArcStr,
	/// Record key
	pub key: ArcStr,
	/// Owned copy of the MQTT payload
	pub payload: Bytes,
	/// Trace-context headers, in payload order
	pub headers: Option<Vec<TraceHeader>>,
}

impl OutboundRecord {
	pub fn new(
		destination: impl Into<ArcStr>,
		key: impl Into<ArcStr>,
		payload: Bytes,
	) -> Self {
		Self {
			destination: destination.into(),
			key: key.into(),
			payload,
			headers: None,
		}
	}

	pub fn with_headers(mut self, headers: Option<Vec<TraceHeader>>) -> Self {
		self.headers = headers;
		self
	}
}

/// Which string becomes the record key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingKey {
	/// The topic name the message was published on
	#[default]
	Topic,
	/// The subscription filter that matched the topic
	Filter,
}

impl RoutingKey {
	pub fn select(self, topic: &ArcStr, route: &Route) -> ArcStr {
		match self {
			| RoutingKey::Topic => topic.clone(),
			| RoutingKey::Filter => route.filter.as_arcstr(),
		}
	}
}

impl FromStr for RoutingKey {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			| "topic" => Ok(RoutingKey::Topic),
			| "filter" => Ok(RoutingKey::Filter),
			| other => Err(format!(
				"unknown routing key '{other}', expected 'topic' or 'filter'"
			)),
		}
	}
}
