//! Resource handlers.
//!
//! Each resource module contributes an init function that appends its
//! actions to the registry. Handlers only see the request context, the
//! parameter accessors and the decoded body, and talk to storage through the
//! [`Core`] facade.

pub mod set;

use std::future::Future;
use std::sync::Arc;

use topo_core::MapStr;

use crate::context::{ContextParams, PathParams, QueryParams};
use crate::service::action::{Action, ActionRegistry, HandlerResult, RegistryError, Verb};
use crate::traits::Core;

/// Registration unit for one resource type.
type InitFn = fn(&Arc<TopoApi>, &mut ActionRegistry) -> Result<(), RegistryError>;

const INIT_FUNCS: &[InitFn] = &[set::init_set];

/// Shared state of the resource handlers.
pub struct TopoApi {
    core: Arc<dyn Core>,
}

impl TopoApi {
    #[must_use]
    pub fn new(core: Arc<dyn Core>) -> Arc<Self> {
        Arc::new(Self { core })
    }

    /// Runs every resource's init function against `registry`.
    ///
    /// # Errors
    ///
    /// Returns the first `RegistryError` raised by a resource.
    pub fn register_actions(self: &Arc<Self>, registry: &mut ActionRegistry) -> Result<(), RegistryError> {
        for init in INIT_FUNCS {
            init(self, registry)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn core(&self) -> &dyn Core {
        self.core.as_ref()
    }

    /// Builds an action whose handler is a method taking `Arc<TopoApi>`.
    fn action<F, Fut>(self: &Arc<Self>, verb: Verb, path: &str, method: F) -> Action
    where
        F: Fn(Arc<TopoApi>, ContextParams, PathParams, QueryParams, MapStr) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let api = Arc::clone(self);
        Action::new(verb, path, move |ctx, path_params, query_params, data| {
            method(Arc::clone(&api), ctx, path_params, query_params, data)
        })
    }
}
