//! MQTT topic filter segment types

use std::convert::TryFrom;

use arcstr::Substr;
use thiserror::Error;

/// Error types for topic filter parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicFilterError {
	/// Multi-level wildcard (#) used anywhere but the last segment
	#[error(
		"Invalid topic filter '{filter}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The invalid filter
		filter: String,
	},

	/// Wildcard characters (+ or #) mixed with other characters in a segment
	#[error("Invalid wildcard usage: {usage}")]
	WildcardUsage {
		/// Offending segment or filter
		usage: String,
	},

	/// Empty filter is not valid
	#[error("Topic filter cannot be empty")]
	EmptyFilter,

	/// Filter exceeds the MQTT string length limit
	#[error("Topic filter is too long: {len} bytes")]
	TooLong {
		/// Length of the rejected filter
		len: usize,
	},
}

impl TopicFilterError {
	/// Creates a new HashPosition error
	pub fn hash_position(filter: impl Into<String>) -> Self {
		Self::HashPosition {
			filter: filter.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(usage: impl Into<String>) -> Self {
		Self::WildcardUsage {
			usage: usage.into(),
		}
	}
}

/// MQTT topic filter segment: literal string or wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicFilterItem {
	/// Literal string segment (may be empty, as in `a//b`)
	Str(Substr),
	/// Single-level wildcard `+`
	Plus,
	/// Multi-level wildcard `#`
	Hash,
}

impl TopicFilterItem {
	/// Returns string representation of the filter item.
	pub fn as_str(&self) -> &str {
		match self {
			| TopicFilterItem::Str(s) => s,
			| TopicFilterItem::Plus => "+",
			| TopicFilterItem::Hash => "#",
		}
	}

	/// Returns true if this item is a wildcard (+ or #).
	pub fn is_wildcard(&self) -> bool {
		matches!(self, TopicFilterItem::Plus | TopicFilterItem::Hash)
	}
}

impl std::fmt::Display for TopicFilterItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl TryFrom<Substr> for TopicFilterItem {
	type Error = TopicFilterError;
	fn try_from(item: Substr) -> Result<Self, Self::Error> {
		let res = match item.as_str() {
			| "+" => TopicFilterItem::Plus,
			| "#" => TopicFilterItem::Hash,
			| _ if item.contains(['+', '#']) => {
				return Err(TopicFilterError::wildcard_usage(item.as_str()));
			}
			| _ => TopicFilterItem::Str(item),
		};
		Ok(res)
	}
}
