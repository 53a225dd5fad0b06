//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when enabled
//! - Resolve the bearer token
//! - Build the shared API client wired to the shutdown token

use std::net::SocketAddr;

use crate::auth::TokenStore;
use crate::config::ClientConfig;
use crate::http::client::ApiClient;
use crate::http::types::ApiResult;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// Build the client for `config`. An explicit `token` wins over the environment.
pub fn start(config: &ClientConfig, token: Option<String>, shutdown: &Shutdown) -> ApiResult<ApiClient> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tokens = match token {
        Some(token) => TokenStore::with_token(token),
        None => TokenStore::from_env(&config.api.token_env),
    };
    if !tokens.is_set() {
        tracing::warn!(env = %config.api.token_env, "No bearer token configured; requests are unauthenticated");
    }

    let client = ApiClient::new(config, tokens)?.with_shutdown(shutdown.child());
    tracing::info!(
        base_url = %client.base_url(),
        max_attempts = config.retries.max_attempts,
        breaker_threshold = config.circuit_breaker.threshold,
        "API client ready"
    );
    Ok(client)
}
