//! Topo Server: action dispatch over axum, the Set resource handlers and an
//! in-memory operation facade.

pub mod api;
pub mod context;
pub mod facade;
pub mod network;
pub mod service;
pub mod traits;

pub use context::{ContextParams, PathParams, QueryParams};
pub use service::{ApiResponse, ServerConfig, TopoService};
pub use traits::{Core, InstOperation, ObjectOperation};
