//! Trace-context extraction from message payloads
//!
//! Payloads may carry distributed-tracing markers such as
//! `trace-id: abc123 span-id: 7`. When propagation is enabled, every
//! key/value pair found in the payload becomes a record header on the
//! outbound record.

use std::fmt;

use regex::bytes::Regex;
use thiserror::Error;

/// Pattern used when none is configured: `key: value` pairs
pub const DEFAULT_TRACE_PATTERN: &str = r"([A-Za-z0-9_-]+):\s*([A-Za-z0-9_.-]+)";

/// Errors raised while building an extractor
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceContextError {
	/// The pattern is not a valid regular expression
	#[error("Invalid trace-context pattern '{pattern}': {reason}")]
	InvalidPattern { pattern: String, reason: String },

	/// The pattern needs one group for the key and one for the value
	#[error(
		"Trace-context pattern '{pattern}' has {groups} capture group(s), \
		 expected at least 2"
	)]
	MissingGroups { pattern: String, groups: usize },
}

/// One extracted header pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
	pub key: String,
	pub value: String,
}

impl TraceHeader {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
		}
	}
}

impl fmt::Display for TraceHeader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}={}", self.key, self.value)
	}
}

/// Scans payloads with a two-group pattern (group 1 = key, group 2 = value).
///
/// The regex is compiled once when the extractor is built, so a bad
/// pattern is reported at startup and extraction itself never fails.
/// Scanning works on raw bytes; payloads that are not UTF-8 are still
/// searched and matched text is converted lossily.
#[derive(Debug, Clone)]
pub struct TraceContextExtractor {
	regex: Regex,
}

impl TraceContextExtractor {
	pub fn new(pattern: &str) -> Result<Self, TraceContextError> {
		let regex = Regex::new(pattern).map_err(|err| {
			TraceContextError::InvalidPattern {
				pattern: pattern.to_string(),
				reason: err.to_string(),
			}
		})?;
		// captures_len counts the implicit whole-match group
		let groups = regex.captures_len() - 1;
		if groups < 2 {
			return Err(TraceContextError::MissingGroups {
				pattern: pattern.to_string(),
				groups,
			});
		}
		Ok(Self { regex })
	}

	pub fn pattern(&self) -> &str {
		self.regex.as_str()
	}

	/// Returns the headers found in `payload`, in order of appearance,
	/// or `None` when nothing matched.
	pub fn extract(&self, payload: &[u8]) -> Option<Vec<TraceHeader>> {
		let headers: Vec<TraceHeader> = self
			.regex
			.captures_iter(payload)
			.filter_map(|caps| {
				let key = caps.get(1)?;
				let value = caps.get(2)?;
				Some(TraceHeader {
					key: String::from_utf8_lossy(key.as_bytes()).into_owned(),
					value: String::from_utf8_lossy(value.as_bytes())
						.into_owned(),
				})
			})
			.collect();

		if headers.is_empty() {
			None
		} else {
			Some(headers)
		}
	}
}

impl Default for TraceContextExtractor {
	fn default() -> Self {
		Self {
			regex: Regex::new(DEFAULT_TRACE_PATTERN)
				.expect("default trace-context pattern is valid"),
		}
	}
}
