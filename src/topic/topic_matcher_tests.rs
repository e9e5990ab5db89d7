use std::collections::HashSet;

use arcstr::ArcStr;

use super::topic_filter::TopicFilter;
use super::topic_matcher::TopicMatcherNode;
use super::topic_path::TopicPath;

// Helper function to test subscription matching
fn test_subscriptions(
	// Filter strings with the id stored under them
	subscriptions: &[(&str, usize)],
	// Topic names with the ids expected to match
	expected_matches: &[(&str, Vec<usize>)],
) {
	let mut root = TopicMatcherNode::<HashSet<usize>>::new();
	let mut filters = Vec::new();

	for (filter_str, sub_id) in subscriptions {
		let filter = TopicFilter::try_from(*filter_str).unwrap();
		root.get_or_create_subscription_table(&filter).insert(*sub_id);
		filters.push((filter, *sub_id));
	}

	for (path, expected_sub_ids) in expected_matches {
		let expected: HashSet<usize> =
			expected_sub_ids.iter().copied().collect();

		let topic = TopicPath::new(ArcStr::from(*path));
		let actual: HashSet<usize> = root
			.find_by_path(&topic)
			.iter()
			.flat_map(|set| set.iter().copied())
			.collect();

		assert_eq!(
			actual, expected,
			"Path '{}' matched subscriptions {:?}, expected {:?}",
			path, actual, expected
		);

		// The segment walk on a single filter must agree with the tree
		let walked: HashSet<usize> = filters
			.iter()
			.filter(|(filter, _)| filter.matches(&topic))
			.map(|(_, id)| *id)
			.collect();
		assert_eq!(
			walked, expected,
			"Path '{}' walked to {:?}, expected {:?}",
			path, walked, expected
		);
	}
}

#[test]
fn test_exact_matches() {
	let subscriptions = [
		("sensors/temperature", 1),
		("sensors/humidity", 2),
		("devices/light/status", 3),
	];

	let expected_matches = [
		("sensors/temperature", vec![1]),
		("sensors/humidity", vec![2]),
		("devices/light/status", vec![3]),
		("sensors/pressure", vec![]),
		("sensors", vec![]),
		("sensors/temperature/extra", vec![]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_plus_wildcards() {
	let subscriptions = [("a/+/c", 1), ("devices/+/+/state", 2), ("home/+", 3)];

	let expected_matches = [
		("a/x/c", vec![1]),
		("a/y/c", vec![1]),
		("a/x/y/c", vec![]),
		("a/c", vec![]),
		("devices/light/kitchen/state", vec![2]),
		("devices/light/state", vec![]),
		("home/kitchen", vec![3]),
		("home/kitchen/temperature", vec![]),
		("home", vec![]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_hash_wildcards() {
	let subscriptions = [("a/#", 1), ("home/livingroom/#", 2), ("#", 3)];

	let expected_matches = [
		("a", vec![1, 3]),
		("a/b", vec![1, 3]),
		("a/b/c", vec![1, 3]),
		("home/livingroom", vec![2, 3]),
		("home/livingroom/light", vec![2, 3]),
		("home/kitchen", vec![3]),
		("ab", vec![3]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_complex_subscriptions() {
	let subscriptions = [
		("home/kitchen/temperature", 1),
		("home/+/temperature", 2),
		("home/kitchen/+", 3),
		("home/#", 4),
		("+/kitchen/#", 5),
	];

	let expected_matches = [
		("home/kitchen/temperature", vec![1, 2, 3, 4, 5]),
		("home/livingroom/temperature", vec![2, 4]),
		("home/kitchen/humidity", vec![3, 4, 5]),
		("home/kitchen/temperature/celsius", vec![4, 5]),
		("office/kitchen/temperature", vec![5]),
		("office/kitchen", vec![5]),
		("home", vec![4]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_edge_cases() {
	let subscriptions = [("#", 2), ("+", 3), ("+/+", 4), ("+/#", 5)];

	let expected_matches = [
		("segment", vec![2, 3, 5]),
		("segment1/segment2", vec![2, 4, 5]),
		("segment1/segment2/segment3", vec![2, 5]),
		// A leading slash produces an empty first segment
		("/segment", vec![2, 4, 5]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_empty_segments_are_literal() {
	let subscriptions = [("a//b", 1), ("a/+/b", 2)];

	let expected_matches = [("a//b", vec![1, 2]), ("a/x/b", vec![2])];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_system_topics_hidden_from_leading_wildcards() {
	let subscriptions = [("#", 1), ("+/broker/clients", 2), ("$SYS/#", 3)];

	let expected_matches = [
		("$SYS/broker/clients", vec![3]),
		("$SYS", vec![3]),
		("data/broker/clients", vec![1, 2]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_multiple_subscribers_to_same_filter() {
	let mut root = TopicMatcherNode::<HashSet<usize>>::new();
	let filter = TopicFilter::try_from("sensors/temperature").unwrap();

	let subscribers = root.get_or_create_subscription_table(&filter);
	subscribers.insert(1);
	subscribers.insert(2);

	let topic = TopicPath::new(ArcStr::from("sensors/temperature"));
	let matches = root.find_by_path(&topic);
	assert_eq!(matches.len(), 1);

	let expected: HashSet<usize> = [1, 2].into_iter().collect();
	assert_eq!(*matches[0], expected);
}

#[test]
fn test_empty_tree() {
	let root = TopicMatcherNode::<HashSet<usize>>::new();
	let topic = TopicPath::new(ArcStr::from("anything/at/all"));
	assert!(root.find_by_path(&topic).is_empty());
}
