use crate::error::{EnvironmentError, Result};
use crate::notification::RoutingMode;
use std::collections::HashMap;
use std::env;

fn parse_mode(var: &str, raw: &str) -> Result<RoutingMode> {
    match raw.to_lowercase().as_str() {
        "silent" => Ok(RoutingMode::Silent),
        "session" => Ok(RoutingMode::Session),
        "symbol" => Ok(RoutingMode::Symbol),
        other => Err(EnvironmentError::ConfigInvalid {
            reason: format!("invalid {var} '{other}', expected silent|session|symbol"),
        }),
    }
}

#[derive(Debug, serde::Deserialize, Default)]
struct NotificationOverlay {
    #[serde(default)]
    symbol_channels: HashMap<String, String>,
    #[serde(default)]
    session_channels: HashMap<String, String>,
}

/// Loads `NOTIFY_TRADE`/`NOTIFY_ORDER`/`NOTIFY_SUBMIT_ORDER`/`NOTIFY_PNL`
/// plus an optional TOML overlay (`RUSTRADE_ENV_TOML`, default
/// `environment.toml`) for the structured `symbol_channels`/
/// `session_channels` maps — scalars come from env vars, maps come from
/// the overlay, matching how the teacher reserves TOML for config shapes
/// env vars can't express cleanly.
#[derive(Debug, Clone)]
pub struct NotificationEnvConfig {
    pub trade: RoutingMode,
    pub order: RoutingMode,
    pub submit_order: RoutingMode,
    pub pnl: RoutingMode,
    pub symbol_channels: HashMap<String, String>,
    pub session_channels: HashMap<String, String>,
}

impl NotificationEnvConfig {
    pub fn from_env() -> Result<Self> {
        let trade = parse_mode(
            "NOTIFY_TRADE",
            &env::var("NOTIFY_TRADE").unwrap_or_else(|_| "silent".to_string()),
        )?;
        let order = parse_mode(
            "NOTIFY_ORDER",
            &env::var("NOTIFY_ORDER").unwrap_or_else(|_| "silent".to_string()),
        )?;
        let submit_order = parse_mode(
            "NOTIFY_SUBMIT_ORDER",
            &env::var("NOTIFY_SUBMIT_ORDER").unwrap_or_else(|_| "silent".to_string()),
        )?;
        let pnl = parse_mode(
            "NOTIFY_PNL",
            &env::var("NOTIFY_PNL").unwrap_or_else(|_| "silent".to_string()),
        )?;

        let overlay_path =
            env::var("RUSTRADE_ENV_TOML").unwrap_or_else(|_| "environment.toml".to_string());
        let overlay = if std::path::Path::new(&overlay_path).exists() {
            let content = std::fs::read_to_string(&overlay_path).map_err(|e| EnvironmentError::ConfigInvalid {
                reason: format!("failed to read {overlay_path}: {e}"),
            })?;
            toml::from_str::<NotificationOverlay>(&content).map_err(|e| EnvironmentError::ConfigInvalid {
                reason: format!("failed to parse {overlay_path}: {e}"),
            })?
        } else {
            NotificationOverlay::default()
        };

        Ok(Self {
            trade,
            order,
            submit_order,
            pnl,
            symbol_channels: overlay.symbol_channels,
            session_channels: overlay.session_channels,
        })
    }
}
