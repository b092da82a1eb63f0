//! kubeplug-api - Controller API for the kubeplug host
//!
//! This crate provides the traits and types needed to write controllers that
//! kubeplug loads at runtime. A controller is built as its own dynamic library,
//! exports a name and a constructor, and is bound by the host to a watch on one
//! resource kind. The host then calls [`Controller::reconcile`] whenever an
//! object of that kind changes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kubeplug_api::{
//!     Action, Client, ClientAware, Controller, ControllerError, ReconcileContext,
//!     ReconcileRequest, ResourceKind, export_controller, ignore_not_found,
//! };
//!
//! #[derive(Default)]
//! pub struct MyController {
//!     client: Option<Arc<dyn Client>>,
//! }
//!
//! impl MyController {
//!     fn new() -> Result<Self, ControllerError> {
//!         Ok(Self::default())
//!     }
//! }
//!
//! impl ClientAware for MyController {
//!     fn set_client(&mut self, client: Arc<dyn Client>) {
//!         self.client = Some(client);
//!     }
//! }
//!
//! impl Controller for MyController {
//!     fn reconcile(
//!         &self,
//!         ctx: &ReconcileContext,
//!         request: &ReconcileRequest,
//!     ) -> Result<Action, ControllerError> {
//!         let client = self.client.as_ref().ok_or_else(|| {
//!             ControllerError::MissingCapability("client".into())
//!         })?;
//!         if let Some(obj) = ignore_not_found(client.get(&ResourceKind::config_map(), &request.key))? {
//!             ctx.log_info(&format!("seen {}", obj.key));
//!         }
//!         Ok(Action::await_change())
//!     }
//!
//!     fn as_client_aware(&mut self) -> Option<&mut dyn ClientAware> {
//!         Some(self)
//!     }
//! }
//!
//! export_controller!("my-controller", MyController::new);
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod types;

use std::sync::Arc;

pub use client::Client;
pub use context::{LogLevel, MemoryRecorder, NullRecorder, ReconcileContext, RecordedLine, Recorder};
pub use error::{ClientError, ControllerError, ignore_not_found};
pub use types::*;

/// Current controller API version. Artifacts must match this exactly.
/// This is checked when loading controllers to ensure compatibility.
pub const API_VERSION: u32 = 1;

/// Exported symbol returning the artifact's [`API_VERSION`]
pub const API_VERSION_SYMBOL: &str = "_kubeplug_api_version";

/// Exported symbol returning the controller name as a NUL-terminated string
pub const NAME_SYMBOL: &str = "_kubeplug_controller_name";

/// Exported symbol constructing a controller instance
pub const CREATE_SYMBOL: &str = "_kubeplug_controller_create";

/// What a controller constructor produces
pub type ConstructResult = Result<Box<dyn Controller>, ControllerError>;

/// Signature of the [`API_VERSION_SYMBOL`] export
pub type ApiVersionFn = extern "C" fn() -> u32;

/// Signature of the [`NAME_SYMBOL`] export
pub type ControllerNameFn = extern "C" fn() -> *const std::os::raw::c_char;

/// Signature of the [`CREATE_SYMBOL`] export. Ownership of the returned box
/// passes to the caller.
pub type CreateControllerFn = extern "C" fn() -> *mut ConstructResult;

/// The core controller trait - implement this to create a kubeplug controller.
pub trait Controller: Send + Sync {
    /// Drive the object named by `request` toward its desired state.
    ///
    /// An object that no longer exists should be treated as done, not as an
    /// error. Any returned error is retried by the engine with backoff.
    fn reconcile(
        &self,
        ctx: &ReconcileContext,
        request: &ReconcileRequest,
    ) -> Result<Action, ControllerError>;

    /// The resource kind this controller reconciles.
    ///
    /// `None` lets the host bind the controller to its configured default kind.
    fn resource_kind(&self) -> Option<ResourceKind> {
        None
    }

    // ─── Capability Probes (default: not supported) ──────────────────

    /// Return `Some(self)` to have the host inject its shared data-access client
    fn as_client_aware(&mut self) -> Option<&mut dyn ClientAware> {
        None
    }
}

/// Capability: receive the host's shared data-access client before binding.
pub trait ClientAware {
    fn set_client(&mut self, client: Arc<dyn Client>);
}

/// Export a controller for dynamic loading.
///
/// Takes the controller name (a string literal, used as the registry key) and
/// a constructor path with signature `fn() -> Result<T, ControllerError>`,
/// where `T: Controller + 'static`.
///
/// # Usage
///
/// ```ignore
/// kubeplug_api::export_controller!("configmap-controller", ConfigMapController::new);
/// ```
///
/// # Generated Functions
///
/// - `_kubeplug_api_version()`: Returns the API version
/// - `_kubeplug_controller_name()`: Returns the controller name
/// - `_kubeplug_controller_create()`: Runs the constructor; panics are caught
///   and returned as [`ControllerError::Panicked`]
#[macro_export]
macro_rules! export_controller {
    ($name:literal, $constructor:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _kubeplug_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _kubeplug_controller_name() -> *const ::std::os::raw::c_char {
            concat!($name, "\0").as_ptr().cast()
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _kubeplug_controller_create() -> *mut $crate::ConstructResult {
            let result: $crate::ConstructResult = match ::std::panic::catch_unwind($constructor) {
                Ok(Ok(controller)) => Ok(::std::boxed::Box::new(controller)
                    as ::std::boxed::Box<dyn $crate::Controller>),
                Ok(Err(e)) => Err(e),
                Err(payload) => Err($crate::ControllerError::from_panic(payload.as_ref())),
            };
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(result))
        }
    };
}
