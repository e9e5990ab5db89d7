//! Shared limits and validation helpers for the topic module
//!
//! The error types stay in their respective modules.

/// Topic processing limits and constants
pub mod limits {
	/// Maximum length of a topic name or filter, as allowed by the MQTT
	/// string encoding (two-byte length prefix)
	pub const MAX_TOPIC_LENGTH: usize = 65_535;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::limits::MAX_TOPIC_LENGTH;
	use crate::topic::topic_filter_item::TopicFilterError;
	use crate::topic::topic_matcher::TopicMatcherError;

	/// Validates a topic name received from the broker.
	///
	/// Topic names are never empty and never carry wildcard characters.
	pub fn validate_topic_name(topic: &str) -> Result<(), TopicMatcherError> {
		if topic.is_empty() {
			return Err(TopicMatcherError::EmptyTopicPath);
		}
		if topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicMatcherError::TooLong { len: topic.len() });
		}
		if let Some((position, segment)) = topic
			.split('/')
			.enumerate()
			.find(|(_, s)| s.contains(['+', '#', '\0']))
		{
			return Err(TopicMatcherError::invalid_segment(segment, position));
		}
		Ok(())
	}

	/// Validates the raw text of a subscription filter before it is split
	/// into segments.
	pub fn validate_filter_text(filter: &str) -> Result<(), TopicFilterError> {
		if filter.is_empty() {
			return Err(TopicFilterError::EmptyFilter);
		}
		if filter.len() > MAX_TOPIC_LENGTH {
			return Err(TopicFilterError::TooLong { len: filter.len() });
		}
		if filter.contains('\0') {
			return Err(TopicFilterError::wildcard_usage(filter));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::validation::*;
	use super::*;
	use crate::topic::topic_filter_item::TopicFilterError;
	use crate::topic::topic_matcher::TopicMatcherError;

	#[test]
	fn test_topic_name_validation() {
		assert!(validate_topic_name("sensors/kitchen/temp").is_ok());
		assert!(validate_topic_name("a//b").is_ok());
		assert_eq!(
			validate_topic_name(""),
			Err(TopicMatcherError::EmptyTopicPath)
		);
		assert!(matches!(
			validate_topic_name("sensors/+/temp"),
			Err(TopicMatcherError::InvalidSegment { position: 1, .. })
		));
		assert!(validate_topic_name("sensors/#").is_err());
	}

	#[test]
	fn test_filter_text_validation() {
		assert!(validate_filter_text("sensors/#").is_ok());
		assert_eq!(
			validate_filter_text(""),
			Err(TopicFilterError::EmptyFilter)
		);
		assert!(validate_filter_text("a\0b").is_err());
		let too_long = "a".repeat(limits::MAX_TOPIC_LENGTH + 1);
		assert!(matches!(
			validate_filter_text(&too_long),
			Err(TopicFilterError::TooLong { .. })
		));
	}
}
