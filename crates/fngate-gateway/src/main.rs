//! fngate: entry point.
//!
//! Loads [`GatewaySettings`] and starts the axum-based HTTP gateway.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FNGATE_CONFIG` | *(none)* | Settings file (`.toml`, `.json`, `.yaml`). |
//! | `FNGATE__*` | *(none)* | Overrides, e.g. `FNGATE__SERVER__PORT=8080`. |
//! | `RUST_LOG` | `fngate_gateway=info` | Log filter directives. |

use std::path::PathBuf;
use std::process::ExitCode;

use fngate_gateway::server::GatewayServer;
use fngate_gateway::settings::GatewaySettings;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "fngate_gateway=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = std::env::var_os("FNGATE_CONFIG").map(PathBuf::from);
    let settings = match GatewaySettings::load(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "failed to load settings");
            return ExitCode::FAILURE;
        }
    };

    if settings.routes.is_empty() {
        tracing::warn!("no routes configured; every request will answer 404");
    }
    info!(
        target_prefix = %settings.target_prefix,
        profiles = ?settings.client_context.active_profiles,
        "settings loaded"
    );

    match GatewayServer::new(settings).start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "gateway stopped");
            ExitCode::FAILURE
        }
    }
}
