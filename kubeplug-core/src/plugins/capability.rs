//! Capability injection
//!
//! An [`Injector`] offers one host service to controllers that opt in via a
//! capability probe on [`Controller`]. Controllers that do not opt in are left
//! alone; that is never an error.

use std::sync::Arc;

use kubeplug_api::{Client, Controller};

/// Supplies one capability to controllers that declare it
pub trait Injector: Send + Sync {
    /// Short name of the capability, used in logs
    fn capability(&self) -> &'static str;

    /// Inject into `controller` if it opts in. Returns whether it did.
    fn inject(&self, controller: &mut dyn Controller) -> bool;
}

/// Injects the shared data-access client into [`kubeplug_api::ClientAware`] controllers
pub struct ClientInjector {
    client: Arc<dyn Client>,
}

impl ClientInjector {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }
}

impl Injector for ClientInjector {
    fn capability(&self) -> &'static str {
        "client"
    }

    fn inject(&self, controller: &mut dyn Controller) -> bool {
        match controller.as_client_aware() {
            Some(aware) => {
                aware.set_client(Arc::clone(&self.client));
                true
            }
            None => false,
        }
    }
}
