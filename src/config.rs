//! Environment-derived configuration.
//!
//! Each integration is enabled only when everything it needs is present;
//! endpoints that depend on a disabled integration answer with an explicit
//! error rather than silently doing nothing.

use std::env;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// GitHub token for the repository sync. `GITHUB_TOKEN`.
    pub github_token: Option<String>,
    /// Remote session gateway. `FLEETDECK_GATEWAY_URL` +
    /// `FLEETDECK_GATEWAY_TOKEN`; both are required.
    pub gateway: Option<GatewayConfig>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: String,
}

impl Config {
    pub fn from_env() -> Self {
        let github_token = non_empty_var("GITHUB_TOKEN");
        let gateway = match (
            non_empty_var("FLEETDECK_GATEWAY_URL"),
            non_empty_var("FLEETDECK_GATEWAY_TOKEN"),
        ) {
            (Some(base_url), Some(token)) => Some(GatewayConfig { base_url, token }),
            _ => None,
        };
        Self { github_token, gateway }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
