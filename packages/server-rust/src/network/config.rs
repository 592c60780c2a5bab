//! Listener and CORS settings for the topo HTTP server.

/// Where the server listens and which browser origins may call it.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick; [`NetworkModule::start`](super::NetworkModule::start)
    /// returns the bound port.
    pub port: u16,
    /// `"*"` allows every origin.
    pub cors_origins: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        }
    }
}
