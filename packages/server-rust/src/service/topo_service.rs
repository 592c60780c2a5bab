//! Assembles the resource handlers, the registry and the dispatcher into
//! one mountable router.

use std::sync::Arc;

use axum::Router;
use topo_core::{ErrorResolver, LanguageResolver};
use tracing::info;

use super::action::{Action, ActionRegistry, RegistryError};
use super::config::ServerConfig;
use super::dispatch::Dispatcher;
use crate::api::TopoApi;
use crate::traits::Core;

/// Every resource route is mounted under this prefix.
pub const ROUTE_PREFIX: &str = "/topo/{version}";

/// The topology action service.
///
/// Registration happens once in [`TopoService::new`]; afterwards the action
/// list is read-only and can be bound to any number of routers.
pub struct TopoService {
    actions: Vec<Action>,
    dispatcher: Dispatcher,
}

impl TopoService {
    /// Registers every resource's actions against `core`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if two resources register the same route.
    pub fn new(
        core: Arc<dyn Core>,
        errors: Arc<dyn ErrorResolver>,
        languages: Arc<dyn LanguageResolver>,
    ) -> Result<Self, RegistryError> {
        let mut registry = ActionRegistry::new();
        TopoApi::new(core).register_actions(&mut registry)?;

        for action in registry.actions() {
            info!("registered {} {}{}", action.verb(), ROUTE_PREFIX, action.path());
        }

        Ok(Self {
            actions: registry.actions().to_vec(),
            dispatcher: Dispatcher::new(errors, languages),
        })
    }

    /// Builds the service from configuration, loading the language
    /// catalogs it names.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalog directory cannot be loaded or route
    /// registration fails.
    pub fn from_config(core: Arc<dyn Core>, config: &ServerConfig) -> anyhow::Result<Self> {
        let (errors, languages) = config.load_catalogs()?;
        let service = Self::new(core, Arc::new(errors), Arc::new(languages))?;
        Ok(service.with_body_limit(config.body_limit))
    }

    #[must_use]
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.dispatcher = self.dispatcher.with_body_limit(body_limit);
        self
    }

    /// Registered actions, in registration order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Router with every action mounted under [`ROUTE_PREFIX`].
    pub fn router(&self) -> Router {
        Router::new().nest(ROUTE_PREFIX, self.dispatcher.bind(&self.actions))
    }
}
