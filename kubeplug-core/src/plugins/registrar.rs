//! Registrar - prepares loaded controllers and binds them to the engine

use std::sync::Arc;

use kubeplug_api::{Client, Controller, ResourceKind};

use super::capability::{ClientInjector, Injector};
use super::error::BindError;
use super::loader::LoadedController;
use crate::engine::{Binding, ReconcileEngine};

/// Injects host capabilities and wires controllers into a [`ReconcileEngine`]
pub struct Registrar {
    injectors: Vec<Box<dyn Injector>>,
    default_kind: ResourceKind,
}

impl Registrar {
    /// Registrar that injects `client` and binds undeclared controllers to `default_kind`
    pub fn new(client: Arc<dyn Client>, default_kind: ResourceKind) -> Self {
        Self {
            injectors: vec![Box::new(ClientInjector::new(client))],
            default_kind,
        }
    }

    /// Add another capability injector
    pub fn with_injector(mut self, injector: Box<dyn Injector>) -> Self {
        self.injectors.push(injector);
        self
    }

    pub fn default_kind(&self) -> &ResourceKind {
        &self.default_kind
    }

    /// Offer every capability to the controller.
    ///
    /// Returns the capabilities it accepted. Must run before the controller is
    /// shared, so no reconcile can observe a half-injected instance.
    pub fn inject(&self, controller: &mut LoadedController) -> Vec<&'static str> {
        let mut accepted = Vec::new();
        for injector in &self.injectors {
            if injector.inject(controller.instance_mut()) {
                tracing::debug!(
                    controller = %controller.name(),
                    capability = injector.capability(),
                    "Injected capability"
                );
                accepted.push(injector.capability());
            }
        }
        accepted
    }

    /// The kind a controller should watch: its own declaration, else the default
    pub fn target_kind(&self, controller: &LoadedController) -> ResourceKind {
        controller
            .resource_kind()
            .unwrap_or_else(|| self.default_kind.clone())
    }

    /// Register a watch on `kind` with `engine`.
    ///
    /// On success the controller records `kind` as its bound kind. On failure
    /// nothing is recorded and the controller stays unbound.
    pub fn bind(
        &self,
        controller: Arc<LoadedController>,
        kind: ResourceKind,
        engine: &dyn ReconcileEngine,
    ) -> Result<(), BindError> {
        let binding = Binding {
            controller_name: controller.name().to_string(),
            kind: kind.clone(),
            controller: Arc::clone(&controller) as Arc<dyn Controller>,
        };
        engine.watch(binding)?;

        if !controller.mark_bound(kind.clone()) {
            tracing::warn!(
                controller = %controller.name(),
                kind = %kind,
                "Controller was already bound; keeping first kind"
            );
        }
        tracing::info!(controller = %controller.name(), kind = %kind, "Controller bound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_support::{Probe, load_controller, probe};
    use kubeplug_api::{MemoryRecorder, ObjectKey, ReconcileContext, ReconcileRequest};
    use std::sync::Mutex;

    use crate::client::MemoryClient;

    /// Engine that records bindings and can be told to refuse
    #[derive(Default)]
    struct RecordingEngine {
        bindings: Mutex<Vec<(String, ResourceKind)>>,
        refuse: bool,
    }

    impl ReconcileEngine for RecordingEngine {
        fn watch(&self, binding: Binding) -> Result<(), BindError> {
            if self.refuse {
                return Err(BindError::Rejected {
                    controller: binding.controller_name,
                    reason: "refused".into(),
                });
            }
            self.bindings
                .lock()
                .unwrap()
                .push((binding.controller_name, binding.kind));
            Ok(())
        }
    }

    fn registrar() -> Registrar {
        Registrar::new(Arc::new(MemoryClient::new()), ResourceKind::config_map())
    }

    fn reconcile(controller: &LoadedController) -> Result<(), kubeplug_api::ControllerError> {
        let ctx = ReconcileContext::new(controller.name(), Arc::new(MemoryRecorder::new()));
        let request = ReconcileRequest::new(ObjectKey::new("default", "x"));
        controller.reconcile(&ctx, &request).map(|_| ())
    }

    #[test]
    fn test_inject_into_client_aware_controller() {
        let mut controller = load_controller("aware", || Ok(Box::new(Probe::client_aware())));
        assert!(reconcile(&controller).is_err());

        let accepted = registrar().inject(&mut controller);

        assert_eq!(accepted, vec!["client"]);
        assert!(reconcile(&controller).is_ok());
    }

    #[test]
    fn test_inject_skips_controller_without_capability() {
        let mut controller = probe("plain");
        let accepted = registrar().inject(&mut controller);
        assert!(accepted.is_empty());
        assert!(reconcile(&controller).is_ok());
    }

    #[test]
    fn test_target_kind_prefers_declaration() {
        let declared =
            load_controller("declared", || Ok(Box::new(Probe::with_kind(ResourceKind::secret()))));
        let undeclared = probe("undeclared");
        let registrar = registrar();

        assert_eq!(registrar.target_kind(&declared), ResourceKind::secret());
        assert_eq!(registrar.target_kind(&undeclared), ResourceKind::config_map());
    }

    #[test]
    fn test_bind_records_kind() {
        let engine = RecordingEngine::default();
        let controller = Arc::new(probe("alpha"));

        registrar()
            .bind(controller.clone(), ResourceKind::config_map(), &engine)
            .unwrap();

        assert_eq!(controller.bound_kind(), Some(&ResourceKind::config_map()));
        assert_eq!(
            *engine.bindings.lock().unwrap(),
            vec![("alpha".to_string(), ResourceKind::config_map())]
        );
    }

    #[test]
    fn test_bind_failure_leaves_controller_unbound() {
        let engine = RecordingEngine {
            refuse: true,
            ..RecordingEngine::default()
        };
        let controller = Arc::new(probe("alpha"));

        let err = registrar()
            .bind(controller.clone(), ResourceKind::config_map(), &engine)
            .unwrap_err();

        assert!(matches!(err, BindError::Rejected { .. }));
        assert!(controller.bound_kind().is_none());
    }

    #[test]
    fn test_with_injector_adds_capability() {
        struct Marker;
        impl Injector for Marker {
            fn capability(&self) -> &'static str {
                "marker"
            }
            fn inject(&self, _controller: &mut dyn Controller) -> bool {
                true
            }
        }

        let mut controller = probe("plain");
        let accepted = registrar()
            .with_injector(Box::new(Marker))
            .inject(&mut controller);
        assert_eq!(accepted, vec!["marker"]);
    }
}
