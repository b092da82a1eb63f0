//! Secret Controller - sample kubeplug controller
//!
//! Same shape as the ConfigMap controller, bound to `v1/Secret`. It logs the
//! number of keys in each Secret and never the values.

use std::sync::Arc;

use kubeplug_api::{
    Action, Client, ClientAware, Controller, ControllerError, ReconcileContext, ReconcileRequest,
    ResourceKind, export_controller, ignore_not_found,
};

#[derive(Default)]
pub struct SecretController {
    client: Option<Arc<dyn Client>>,
}

impl SecretController {
    pub fn new() -> Result<Self, ControllerError> {
        Ok(Self::default())
    }

    fn client(&self) -> Result<&Arc<dyn Client>, ControllerError> {
        self.client
            .as_ref()
            .ok_or_else(|| ControllerError::MissingCapability("client".into()))
    }
}

impl ClientAware for SecretController {
    fn set_client(&mut self, client: Arc<dyn Client>) {
        self.client = Some(client);
    }
}

impl Controller for SecretController {
    fn reconcile(
        &self,
        ctx: &ReconcileContext,
        request: &ReconcileRequest,
    ) -> Result<Action, ControllerError> {
        let secret = ignore_not_found(self.client()?.get(&ResourceKind::secret(), &request.key))?;

        if let Some(secret) = secret {
            ctx.log_info(&format!(
                "Secret reconciled: {} ({} keys)",
                secret.key,
                secret.data.len()
            ));
        }
        Ok(Action::await_change())
    }

    fn resource_kind(&self) -> Option<ResourceKind> {
        Some(ResourceKind::secret())
    }

    fn as_client_aware(&mut self) -> Option<&mut dyn ClientAware> {
        Some(self)
    }
}

export_controller!("secret-controller", SecretController::new);

#[cfg(test)]
mod tests {
    use super::*;
    use kubeplug_api::{ClientError, MemoryRecorder, ObjectKey, Resource};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Map-backed client that remembers which keys were read
    #[derive(Default)]
    struct MapClient {
        objects: Mutex<BTreeMap<ObjectKey, Resource>>,
        reads: Mutex<Vec<ObjectKey>>,
    }

    impl Client for MapClient {
        fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Resource, ClientError> {
            self.reads.lock().unwrap().push(key.clone());
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .filter(|r| &r.kind == kind)
                .cloned()
                .ok_or_else(|| ClientError::NotFound {
                    kind: kind.clone(),
                    key: key.clone(),
                })
        }

        fn list(
            &self,
            kind: &ResourceKind,
            _namespace: Option<&str>,
        ) -> Result<Vec<Resource>, ClientError> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .values()
                .filter(|r| &r.kind == kind)
                .cloned()
                .collect())
        }

        fn apply(&self, resource: Resource) -> Result<Resource, ClientError> {
            self.objects
                .lock()
                .unwrap()
                .insert(resource.key.clone(), resource.clone());
            Ok(resource)
        }

        fn delete(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<(), ClientError> {
            self.objects
                .lock()
                .unwrap()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| ClientError::NotFound {
                    kind: kind.clone(),
                    key: key.clone(),
                })
        }
    }

    fn controller_with(client: Arc<MapClient>) -> SecretController {
        let mut controller = SecretController::new().unwrap();
        controller.set_client(client);
        controller
    }

    #[test]
    fn test_logs_key_count_not_values() {
        let client = Arc::new(MapClient::default());
        client
            .apply(
                Resource::new(ResourceKind::secret(), ObjectKey::new("system", "token"))
                    .with_data("password", "hunter2")
                    .with_data("user", "admin"),
            )
            .unwrap();
        let controller = controller_with(client.clone());
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = ReconcileContext::new("secret-controller", recorder.clone());

        controller
            .reconcile(&ctx, &ReconcileRequest::new(ObjectKey::new("system", "token")))
            .unwrap();

        let lines = recorder.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "Secret reconciled: system/token (2 keys)");
        assert!(!lines[0].message.contains("hunter2"));
        assert_eq!(client.reads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_config_map_with_same_name_is_ignored() {
        let client = Arc::new(MapClient::default());
        client
            .apply(Resource::new(
                ResourceKind::config_map(),
                ObjectKey::new("default", "shared"),
            ))
            .unwrap();
        let controller = controller_with(client);
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = ReconcileContext::new("secret-controller", recorder.clone());

        let action = controller
            .reconcile(&ctx, &ReconcileRequest::new(ObjectKey::new("default", "shared")))
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_declares_secret_kind_and_client_capability() {
        let mut controller = SecretController::default();
        assert_eq!(controller.resource_kind(), Some(ResourceKind::secret()));
        assert!(controller.as_client_aware().is_some());
    }

    #[test]
    fn test_exported_constructor() {
        let raw = _kubeplug_controller_create();
        let result = unsafe { *Box::from_raw(raw) };
        let controller = result.unwrap();
        assert_eq!(controller.resource_kind(), Some(ResourceKind::secret()));
    }
}
