use std::collections::HashMap;

use arcstr::Substr;
use thiserror::Error;

use super::topic_filter::TopicFilter;
use super::topic_filter_item::TopicFilterItem;
use super::topic_path::TopicPath;

/// Errors raised while validating a topic name for matching
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicMatcherError {
	/// Topic path provided for matching is empty
	#[error("Topic path cannot be empty for matching")]
	EmptyTopicPath,

	/// Invalid topic segment encountered during matching
	#[error("Invalid topic segment '{segment}' at position {position}")]
	InvalidSegment { segment: String, position: usize },

	/// Topic exceeds the MQTT string length limit
	#[error("Topic path is too long: {len} bytes")]
	TooLong { len: usize },
}

impl TopicMatcherError {
	/// Creates a new InvalidSegment error
	pub fn invalid_segment(
		segment: impl Into<String>,
		position: usize,
	) -> Self {
		Self::InvalidSegment {
			segment: segment.into(),
			position,
		}
	}
}

/// Node in the filter matching tree that represents one filter segment.
#[derive(Debug)]
pub struct TopicMatcherNode<T> {
	/// Data for filters ending exactly at this node
	exact_match_data: Option<T>,

	/// Children nodes for literal matches of the next segment
	exact_children: HashMap<Substr, TopicMatcherNode<T>>,

	/// Node for '+' wildcard match (single segment)
	single_level_wildcard_node: Option<Box<TopicMatcherNode<T>>>,

	/// Data for '#' wildcard match (remaining segments)
	multi_level_wildcard_data: Option<T>,
}

impl<T: Default> Default for TopicMatcherNode<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Default> TopicMatcherNode<T> {
	/// Creates a new empty topic matcher node
	pub fn new() -> Self {
		Self {
			exact_match_data: None,
			exact_children: HashMap::new(),
			single_level_wildcard_node: None,
			multi_level_wildcard_data: None,
		}
	}

	/// Finds or creates the data slot for the given filter
	pub fn get_or_create_subscription_table(
		&mut self,
		filter: &TopicFilter,
	) -> &mut T {
		let mut current_node = self;

		for segment in filter.iter() {
			match segment {
				| TopicFilterItem::Str(s) => {
					current_node = current_node
						.exact_children
						.entry(s.clone())
						.or_default()
				}
				| TopicFilterItem::Plus => {
					current_node = current_node
						.single_level_wildcard_node
						.get_or_insert_with(|| Box::new(TopicMatcherNode::new()))
				}
				| TopicFilterItem::Hash => {
					// '#' is always the last segment
					return current_node
						.multi_level_wildcard_data
						.get_or_insert_with(T::default);
				}
			}
		}
		current_node.exact_match_data.get_or_insert_with(T::default)
	}

	/// Recursively collects all data whose filter matches the given segments
	fn collect_matching_subscriptions<'a>(
		&'a self,
		topic: &[Substr],
		wildcards_allowed: bool,
		matching_data: &mut Vec<&'a T>,
	) {
		match topic {
			| [] => {
				// End of topic: filters ending here, plus a trailing '#'
				// which also matches zero further segments
				self.exact_match_data
					.iter()
					.for_each(|data| matching_data.push(data));
				self.multi_level_wildcard_data
					.iter()
					.for_each(|data| matching_data.push(data))
			}
			| [segment, remaining_segments @ ..] => {
				if let Some(child) = self.exact_children.get(segment) {
					child.collect_matching_subscriptions(
						remaining_segments,
						true,
						matching_data,
					);
				}
				if !wildcards_allowed {
					return;
				}
				self.single_level_wildcard_node
					.iter()
					.for_each(|plus_node| {
						plus_node.collect_matching_subscriptions(
							remaining_segments,
							true,
							matching_data,
						)
					});
				self.multi_level_wildcard_data
					.iter()
					.for_each(|hash_data| matching_data.push(hash_data));
			}
		}
	}

	/// Finds all data entries whose filter matches the given topic
	pub fn find_by_path<'a>(&'a self, topic: &TopicPath) -> Vec<&'a T> {
		let mut matching_subscribers = Vec::new();
		self.collect_matching_subscriptions(
			&topic.segments,
			!topic.is_system(),
			&mut matching_subscribers,
		);
		matching_subscribers
	}
}
