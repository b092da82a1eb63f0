//! ConfigMap Controller - sample kubeplug controller
//!
//! Reads each changed ConfigMap through the host-injected client and logs one
//! line per reconcile. A ConfigMap that no longer exists is a no-op.
//!
//! ## Building
//!
//! ```bash
//! cargo build --release -p configmap-controller
//! ```
//!
//! ## Installing
//!
//! ```bash
//! mkdir -p plugins
//! cp target/release/libconfigmap_controller.so plugins/
//! kubeplug run --plugins-dir ./plugins
//! ```

use std::sync::Arc;

use kubeplug_api::{
    Action, Client, ClientAware, Controller, ControllerError, ReconcileContext, ReconcileRequest,
    ResourceKind, export_controller, ignore_not_found,
};

/// Logs every ConfigMap it is asked to reconcile.
#[derive(Default)]
pub struct ConfigMapController {
    client: Option<Arc<dyn Client>>,
}

impl ConfigMapController {
    pub fn new() -> Result<Self, ControllerError> {
        Ok(Self::default())
    }
}

impl ClientAware for ConfigMapController {
    fn set_client(&mut self, client: Arc<dyn Client>) {
        self.client = Some(client);
    }
}

impl Controller for ConfigMapController {
    fn reconcile(
        &self,
        ctx: &ReconcileContext,
        request: &ReconcileRequest,
    ) -> Result<Action, ControllerError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ControllerError::MissingCapability("client".into()))?;

        let found = ignore_not_found(client.get(&ResourceKind::config_map(), &request.key))?;
        let Some(config_map) = found else {
            // Deleted since the event was queued
            return Ok(Action::await_change());
        };

        ctx.log_info(&format!("ConfigMap reconciled: {}", config_map.key));
        Ok(Action::await_change())
    }

    fn resource_kind(&self) -> Option<ResourceKind> {
        Some(ResourceKind::config_map())
    }

    fn as_client_aware(&mut self) -> Option<&mut dyn ClientAware> {
        Some(self)
    }
}

export_controller!("configmap-controller", ConfigMapController::new);
