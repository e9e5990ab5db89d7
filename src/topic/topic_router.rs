use std::collections::HashSet;
use std::fmt;

use arcstr::ArcStr;
use smallvec::SmallVec;
use tracing::debug;

use super::topic_filter::TopicFilter;
use super::topic_matcher::TopicMatcherNode;
use super::topic_path::TopicPath;

/// One subscription entry: messages matching `filter` go to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
	pub filter: TopicFilter,
	pub destination: ArcStr,
}

impl Route {
	pub fn new(filter: TopicFilter, destination: impl Into<ArcStr>) -> Self {
		Self {
			filter,
			destination: destination.into(),
		}
	}
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -> {}", self.filter, self.destination)
	}
}

/// Matched routes for one topic. Most topics fan out to very few routes.
pub type RouteMatches<'a> = SmallVec<[&'a Route; 4]>;

/// Index of route positions, keyed by filter segments
type RouteTable = Vec<usize>;

/// Multimap from topic filters to destinations, indexed for matching.
///
/// Keys are not unique: the same filter may map to several destinations
/// and the same destination may be reachable through several filters.
/// Every entry is evaluated on its own, so a topic matching several
/// entries yields all of them, duplicates included.
#[derive(Debug)]
pub struct TopicRouter {
	topic_matcher: TopicMatcherNode<RouteTable>,
	routes: Vec<Route>,
}

impl Default for TopicRouter {
	fn default() -> Self {
		Self::new()
	}
}

impl TopicRouter {
	pub fn new() -> Self {
		Self {
			topic_matcher: TopicMatcherNode::new(),
			routes: Vec::new(),
		}
	}

	pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Self {
		let mut router = Self::new();
		routes.into_iter().for_each(|route| router.add_route(route));
		router
	}

	pub fn add_route(&mut self, route: Route) {
		let index = self.routes.len();
		self.topic_matcher
			.get_or_create_subscription_table(&route.filter)
			.push(index);
		self.routes.push(route);
	}

	/// Returns every route whose filter matches `topic`.
	pub fn route<'a>(&'a self, topic: &TopicPath) -> RouteMatches<'a> {
		self.topic_matcher
			.find_by_path(topic)
			.into_iter()
			.flatten()
			.map(|index| &self.routes[*index])
			.collect()
	}

	/// Like [`TopicRouter::route`] for a raw topic name.
	///
	/// Names that are not legal publish topics match nothing.
	pub fn route_topic<'a>(&'a self, topic: &str) -> RouteMatches<'a> {
		match TopicPath::parse(topic) {
			| Ok(path) => self.route(&path),
			| Err(err) => {
				debug!(topic = %topic, error = %err, "Topic cannot match any filter");
				RouteMatches::new()
			}
		}
	}

	/// Destination names for `topic`, one per matching entry
	pub fn destinations(&self, topic: &str) -> Vec<ArcStr> {
		self.route_topic(topic)
			.into_iter()
			.map(|route| route.destination.clone())
			.collect()
	}

	/// Distinct filters in insertion order, as subscribed on the broker
	pub fn filters(&self) -> Vec<&TopicFilter> {
		let mut seen = HashSet::new();
		self.routes
			.iter()
			.map(|route| &route.filter)
			.filter(|filter| seen.insert(filter.as_str()))
			.collect()
	}

	pub fn routes(&self) -> &[Route] {
		&self.routes
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}
}
