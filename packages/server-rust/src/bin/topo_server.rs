//! Standalone topo server backed by the in-memory facade.
//!
//! ```bash
//! TOPO_PORT=8080 TOPO_DEFAULT_LANGUAGE=en cargo run --bin topo-server
//!
//! curl -X POST http://localhost:8080/topo/v3/set/5 \
//!   -H "HTTP_BLUEKING_SUPPLIER_ID: 0" \
//!   -d '{"bk_set_name": "Set-A"}'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use topo_core::fields::{BK_INNER_OBJ_ID_SET, BK_SET_ID_FIELD};
use topo_core::{Object, DEFAULT_LANGUAGE};
use topo_server::facade::MemoryCore;
use topo_server::network::{NetworkConfig, NetworkModule};
use topo_server::service::dispatch::DEFAULT_BODY_LIMIT;
use topo_server::service::{ServerConfig, TopoService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "topo-server", version, about = "Topology action-dispatch server")]
struct Args {
    /// Bind address
    #[arg(long, env = "TOPO_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on (0 = OS-assigned)
    #[arg(long, env = "TOPO_PORT", default_value_t = 8080)]
    port: u16,

    /// Language used when a request names none or an unknown one
    #[arg(long, env = "TOPO_DEFAULT_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    default_language: String,

    /// Directory of `<language>.json` error message tables
    #[arg(long, env = "TOPO_ERRORS_DIR")]
    errors_dir: Option<PathBuf>,

    /// Directory of `<language>.json` text tables
    #[arg(long, env = "TOPO_LANGUAGE_DIR")]
    language_dir: Option<PathBuf>,

    /// Maximum request body size in bytes
    #[arg(long, env = "TOPO_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,

    /// Emit logs as JSON lines
    #[arg(long, env = "TOPO_LOG_JSON")]
    log_json: bool,

    /// Supplier account that gets a built-in Set model at startup
    #[arg(long, env = "TOPO_SEED_OWNER", default_value = "0")]
    seed_owner: String,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c, error: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let core = Arc::new(MemoryCore::new());
    core.add_object(Object::new(
        1,
        BK_INNER_OBJ_ID_SET,
        "Set",
        args.seed_owner.clone(),
        BK_SET_ID_FIELD,
    ));

    let server_config = ServerConfig {
        default_language: args.default_language,
        errors_dir: args.errors_dir,
        language_dir: args.language_dir,
        body_limit: args.body_limit,
    };
    let service = TopoService::from_config(core, &server_config)?;

    let network_config = NetworkConfig {
        host: args.host,
        port: args.port,
        ..NetworkConfig::default()
    };
    let mut network = NetworkModule::new(network_config, service.router());
    let port = network.start().await?;
    info!("topo server listening on port {}", port);

    network.serve(shutdown_signal()).await
}
