use std::str::FromStr;

use arcstr::ArcStr;
use thiserror::Error;

use crate::topic::{Route, TopicFilter, TopicFilterError, TopicRouter};

/// Errors raised while building a [`SubscriptionSet`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionSetError {
	#[error("Invalid filter '{filter}': {source}")]
	InvalidFilter {
		filter: String,
		#[source]
		source: TopicFilterError,
	},
	#[error("Filter '{filter}' has an empty destination")]
	EmptyDestination { filter: String },
	#[error("Malformed mapping entry '{entry}', expected filter=destination")]
	MalformedEntry { entry: String },
}

/// Filter to destination multimap.
///
/// Filters may repeat and every entry is kept: a topic matching the same
/// filter twice is forwarded twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
	routes: Vec<Route>,
}

impl SubscriptionSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a set from `(filter, destination)` pairs, validating every
	/// filter.
	pub fn from_pairs<F, D>(
		pairs: impl IntoIterator<Item = (F, D)>,
	) -> Result<Self, SubscriptionSetError>
	where
		F: AsRef<str>,
		D: AsRef<str>,
	{
		let mut set = Self::new();
		for (filter, destination) in pairs {
			set.insert(filter.as_ref(), destination.as_ref())?;
		}
		Ok(set)
	}

	/// Parses `filter=dest[,dest...];filter=dest`.
	///
	/// Whitespace around entries, filters and destinations is ignored, as
	/// are empty entries.
	pub fn parse(text: &str) -> Result<Self, SubscriptionSetError> {
		let mut set = Self::new();
		for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
			let (filter, destinations) = entry.split_once('=').ok_or_else(|| {
				SubscriptionSetError::MalformedEntry {
					entry: entry.to_string(),
				}
			})?;
			for destination in destinations.split(',') {
				set.insert(filter.trim(), destination.trim())?;
			}
		}
		Ok(set)
	}

	pub fn insert(
		&mut self,
		filter: &str,
		destination: &str,
	) -> Result<(), SubscriptionSetError> {
		let topic_filter = TopicFilter::new(filter).map_err(|source| {
			SubscriptionSetError::InvalidFilter {
				filter: filter.to_string(),
				source,
			}
		})?;
		if destination.is_empty() {
			return Err(SubscriptionSetError::EmptyDestination {
				filter: filter.to_string(),
			});
		}
		self.routes
			.push(Route::new(topic_filter, ArcStr::from(destination)));
		Ok(())
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

	/// Builds the matching index for this set
	pub fn to_router(&self) -> TopicRouter {
		TopicRouter::from_routes(self.routes.iter().cloned())
	}
}

impl FromStr for SubscriptionSet {
	type Err = SubscriptionSetError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl FromIterator<Route> for SubscriptionSet {
	fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
		Self {
			routes: iter.into_iter().collect(),
		}
	}
}
