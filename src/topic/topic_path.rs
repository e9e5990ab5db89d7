use std::fmt;

use arcstr::{ArcStr, Substr};

use super::topic_matcher::TopicMatcherError;
use super::validation::validate_topic_name;

/// A topic name split into its `/`-delimited segments.
///
/// Segments are substrings of the original name, so splitting does not
/// copy the topic.
#[derive(Debug, Clone)]
pub struct TopicPath {
	pub path: ArcStr,
	pub segments: Vec<Substr>,
}

impl TopicPath {
	pub fn new(path: ArcStr) -> Self {
		let segments: Vec<Substr> =
			path.split('/').map(|s| path.substr_from(s)).collect();
		Self { path, segments }
	}

	/// Splits a topic name after checking it is a legal publish topic
	pub fn parse(path: impl Into<ArcStr>) -> Result<Self, TopicMatcherError> {
		let path = path.into();
		validate_topic_name(&path)?;
		Ok(Self::new(path))
	}

	/// Broker-reserved topics (`$SYS/...`) are hidden from leading wildcards.
	pub fn is_system(&self) -> bool {
		self.path.starts_with('$')
	}
}

impl fmt::Display for TopicPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}
