use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::slice::Iter;
use std::str::FromStr;

use arcstr::ArcStr;

use super::topic_filter_item::{TopicFilterError, TopicFilterItem};
use super::topic_path::TopicPath;
use super::validation::validate_filter_text;

/// Parsed MQTT subscription filter with wildcard support
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
	filter: ArcStr,
	segments: Vec<TopicFilterItem>,
}

impl TopicFilter {
	/// Parses and validates a subscription filter.
	///
	/// `+` and `#` must occupy a whole segment, and `#` is only legal as
	/// the final segment.
	pub fn new(filter: impl Into<ArcStr>) -> Result<Self, TopicFilterError> {
		let filter = filter.into();
		validate_filter_text(&filter)?;

		let segments = filter
			.split('/')
			.map(|s| filter.substr_from(s))
			.map(TopicFilterItem::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(*s, TopicFilterItem::Hash))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicFilterError::hash_position(filter.as_str()));
			}
		}

		Ok(Self { filter, segments })
	}

	/// The filter as sent to the broker
	pub fn as_str(&self) -> &str {
		&self.filter
	}

	pub fn as_arcstr(&self) -> ArcStr {
		self.filter.clone()
	}

	pub fn iter(&self) -> Iter<'_, TopicFilterItem> {
		self.segments.iter()
	}

	pub fn slice(&self) -> &[TopicFilterItem] {
		&self.segments
	}

	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// True when the filter contains `+` or `#`
	pub fn has_wildcards(&self) -> bool {
		self.segments.iter().any(TopicFilterItem::is_wildcard)
	}

	/// Walks the filter and the topic segment by segment.
	///
	/// A literal segment must be equal, `+` consumes exactly one topic
	/// segment and `#` consumes the rest of the topic, including nothing.
	/// The filter matches only if the whole topic is consumed. Topics
	/// starting with `$` are not matched by a wildcard in the first position.
	pub fn matches(&self, topic: &TopicPath) -> bool {
		let leading_wildcard = self
			.segments
			.first()
			.is_some_and(TopicFilterItem::is_wildcard);
		if topic.is_system() && leading_wildcard {
			return false;
		}
		let mut topic_segments = topic.segments.iter();
		for item in &self.segments {
			match item {
				| TopicFilterItem::Hash => return true,
				| TopicFilterItem::Plus => {
					if topic_segments.next().is_none() {
						return false;
					}
				}
				| TopicFilterItem::Str(expected) => match topic_segments.next() {
					| Some(found) if found.as_str() == expected.as_str() => {}
					| _ => return false,
				},
			}
		}
		topic_segments.next().is_none()
	}
}

impl Display for TopicFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.filter)
	}
}

impl TryFrom<&str> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(ArcStr::from(value))
	}
}

impl TryFrom<String> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(ArcStr::from(value))
	}
}

impl FromStr for TopicFilter {
	type Err = TopicFilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(ArcStr::from(s))
	}
}
