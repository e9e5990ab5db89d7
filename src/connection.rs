use tracing::{error, info, warn};

use crate::error::BridgeError;
use crate::routing::BridgeController;

/// Owner of a running bridge.
///
/// Must be shut down explicitly; dropping it leaves the controller task
/// running until the runtime stops.
pub struct BridgeConnection {
	controller: Option<BridgeController>,
}

impl BridgeConnection {
	pub(crate) fn new(controller: BridgeController) -> Self {
		Self {
			controller: Some(controller),
		}
	}

	/// Gracefully stop the bridge:
	/// 1. Stop the controller, so no further records are sent
	/// 2. Disconnect the broker session if connected
	/// 3. Release the backend
	///
	/// Deliveries already queued by the producer may still complete.
	pub async fn shutdown(mut self) -> Result<(), BridgeError> {
		match self.controller.take() {
			| Some(controller) => {
				if let Err(e) = controller.shutdown().await {
					warn!(error = %e, "Bridge controller task failed");
				}
			}
			| None => {
				warn!("No bridge controller available for shutdown");
			}
		}
		info!("Bridge stopped");
		Ok(())
	}
}

impl Drop for BridgeConnection {
	fn drop(&mut self) {
		if self.controller.is_some() {
			error!(
				"BridgeConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
		}
	}
}
