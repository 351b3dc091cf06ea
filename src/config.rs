//! # config — settings from environment variables (`.env` is loaded first)

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::market::binance::ApiCredentials;

/// Where closed trades are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    /// `sqlite://…` URL handed to sqlx.
    Sqlite(String),
    /// Process-local only, nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:        SocketAddr,
    pub storage:          StorageBackend,
    /// Binance USDⓈ-M REST base, e.g. `https://fapi.binance.com`
    pub binance_url:      String,
    /// Only needed for the signed commission-rate endpoint.
    pub binance_creds:    Option<ApiCredentials>,
    /// Symbol selected at startup, before the first symbol-list refresh.
    pub default_symbol:   String,
    /// Period of the price / matching cycle.
    pub fetch_interval:   Duration,
    /// Period of the tradable-symbol refresh.
    pub symbol_refresh:   Duration,
    pub symbol_limit:     usize,
    /// Required `X-API-Key` value; unset or empty means no auth.
    pub api_key:          Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000")
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let storage = match env_or("DATABASE_URL", "sqlite://trades.db").as_str() {
            "memory" => StorageBackend::Memory,
            url if url.starts_with("sqlite:") => StorageBackend::Sqlite(url.to_string()),
            other => bail!("Unsupported DATABASE_URL '{other}'. Use 'sqlite://<path>' or 'memory'"),
        };

        let binance_creds = match (std::env::var("BINANCE_API_KEY"), std::env::var("BINANCE_API_SECRET")) {
            (Ok(api_key), Ok(secret)) if !api_key.is_empty() && !secret.is_empty() => {
                Some(ApiCredentials { api_key, secret })
            }
            _ => None,
        };

        let fetch_ms: u64 = env_or("FETCH_INTERVAL_MS", "500")
            .parse()
            .context("FETCH_INTERVAL_MS must be a number")?;
        if fetch_ms == 0 {
            bail!("FETCH_INTERVAL_MS must be greater than 0");
        }

        let refresh_secs: u64 = env_or("SYMBOL_REFRESH_SECS", "600")
            .parse()
            .context("SYMBOL_REFRESH_SECS must be a number")?;

        Ok(Self {
            bind_addr,
            storage,
            binance_url:    env_or("BINANCE_FAPI_URL", "https://fapi.binance.com"),
            binance_creds,
            default_symbol: env_or("DEFAULT_SYMBOL", "BTCUSDT").to_uppercase(),
            fetch_interval: Duration::from_millis(fetch_ms),
            symbol_refresh: Duration::from_secs(refresh_secs.max(1)),
            symbol_limit:   env_or("SYMBOL_LIMIT", "30").parse().unwrap_or(30),
            api_key:        std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
