//! Action registration and dispatch.
//!
//! 1. **Actions** (`action`): route descriptors and the append-only registry
//! 2. **Dispatch** (`dispatch`): per-request pipeline from HTTP request to envelope
//! 3. **Envelope** (`envelope`): the uniform JSON response
//! 4. **Service** (`topo_service`): resource registration mounted under one prefix

pub mod action;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod topo_service;

pub use action::{Action, ActionRegistry, HandlerFn, HandlerResult, RegistryError, Verb};
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use envelope::ApiResponse;
pub use topo_service::{TopoService, ROUTE_PREFIX};
