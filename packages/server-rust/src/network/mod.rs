//! HTTP server plumbing: configuration, middleware and the server lifecycle.

pub mod config;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use middleware::apply_http_layers;
pub use module::NetworkModule;
