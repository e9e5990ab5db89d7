//! Subscription management and message routing
//!
//! The controller actor owns the broker session state and the active
//! subscription set. Reconfiguration requests and broker events are
//! queued on one channel and handled in order, so the set seen by the
//! broker always matches the last set requested.

pub mod controller;
/// Controller error types
pub mod error;
/// Filter to destination mapping
pub mod subscription_set;

pub use controller::{
	BridgeController, BridgeCounters, BridgeHandle, BridgeStatus,
	ConnectionState, SyncFailure, SyncOperation, SyncReport,
};
pub use error::ControllerError;
pub use subscription_set::{SubscriptionSet, SubscriptionSetError};

pub(crate) use controller::{ActorSetup, BridgeActor};
