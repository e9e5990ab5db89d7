//! Topic handling module
//!
//! This module provides the components for working with MQTT topic filters:
//! parsing and validating filters, splitting topic names into segments,
//! and routing topic names to the destinations mapped from every filter
//! that matches them.

// Submodules
pub mod error;
pub mod topic_filter;
pub mod topic_filter_item;
pub mod topic_matcher;
pub mod topic_path;
pub mod topic_router;

#[cfg(test)]
mod topic_matcher_tests;

// Re-export commonly used types for convenience
pub use error::{limits, validation};
pub use topic_filter::TopicFilter;
pub use topic_filter_item::{TopicFilterError, TopicFilterItem};
pub use topic_matcher::{TopicMatcherError, TopicMatcherNode};
pub use topic_path::TopicPath;
pub use topic_router::{Route, TopicRouter};
