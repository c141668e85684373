use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::constants::{
    ChainId, CHAIN_SWITCH_DEBOUNCE_MS, CHAIN_SWITCH_SETTLE_MS, CONFIRMATION_POLL_ATTEMPTS,
    CONFIRMATION_POLL_INTERVAL_MS, DEFAULT_QUOTE_API_URL,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Payment provider
    pub quote_api_url: String,
    pub platform_api_key: Option<String>,

    // Checkout link generation
    pub checkout_base_url: String,

    // Chain RPC endpoints (read access + settlement submission)
    pub ethereum_rpc_url: Option<String>,
    pub optimism_rpc_url: Option<String>,
    pub polygon_rpc_url: Option<String>,
    pub arbitrum_rpc_url: Option<String>,
    pub base_rpc_url: Option<String>,
    pub avalanche_rpc_url: Option<String>,
    pub linea_rpc_url: Option<String>,
    pub scroll_rpc_url: Option<String>,

    // Payer signing session
    pub payer_private_key: Option<String>,

    // Settlement confirmation polling (attempts of 0 waits indefinitely)
    pub confirmation_poll_interval_ms: u64,
    pub confirmation_poll_attempts: usize,

    // Chain alignment timing
    pub chain_switch_debounce_ms: u64,
    pub chain_switch_settle_ms: u64,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            quote_api_url: env::var("BINDPAY_API_URL")
                .unwrap_or_else(|_| DEFAULT_QUOTE_API_URL.to_string()),
            platform_api_key: env::var("BINDPAY_API_KEY").ok(),

            checkout_base_url: env::var("CHECKOUT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            ethereum_rpc_url: env::var("ETHEREUM_RPC_URL").ok(),
            optimism_rpc_url: env::var("OPTIMISM_RPC_URL").ok(),
            polygon_rpc_url: env::var("POLYGON_RPC_URL").ok(),
            arbitrum_rpc_url: env::var("ARBITRUM_RPC_URL").ok(),
            base_rpc_url: env::var("BASE_RPC_URL").ok(),
            avalanche_rpc_url: env::var("AVALANCHE_RPC_URL").ok(),
            linea_rpc_url: env::var("LINEA_RPC_URL").ok(),
            scroll_rpc_url: env::var("SCROLL_RPC_URL").ok(),

            payer_private_key: env::var("PAYER_PRIVATE_KEY").ok(),

            confirmation_poll_interval_ms: env::var("CONFIRMATION_POLL_INTERVAL_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(CONFIRMATION_POLL_INTERVAL_MS),
            confirmation_poll_attempts: env::var("CONFIRMATION_POLL_ATTEMPTS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(CONFIRMATION_POLL_ATTEMPTS),

            chain_switch_debounce_ms: env::var("CHAIN_SWITCH_DEBOUNCE_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(CHAIN_SWITCH_DEBOUNCE_MS),
            chain_switch_settle_ms: env::var("CHAIN_SWITCH_SETTLE_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(CHAIN_SWITCH_SETTLE_MS),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.quote_api_url.trim().is_empty() {
            anyhow::bail!("BINDPAY_API_URL is empty");
        }
        if self.checkout_base_url.trim().is_empty() {
            anyhow::bail!("CHECKOUT_BASE_URL is empty");
        }

        if self.platform_api_key.as_deref().unwrap_or("").trim().is_empty() {
            tracing::warn!("BINDPAY_API_KEY not set; merchant registration is disabled");
        }
        if self.payer_private_key.as_deref().unwrap_or("").trim().is_empty() {
            tracing::warn!("PAYER_PRIVATE_KEY not set; settlement will report the wallet as unavailable");
        }
        if self.rpc_endpoints().is_empty() {
            tracing::warn!("No chain RPC endpoints configured; balance resolution will return empty results");
        }

        if self.confirmation_poll_interval_ms == 0 {
            tracing::warn!("CONFIRMATION_POLL_INTERVAL_MS should be > 0");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn rpc_url_for(&self, chain: ChainId) -> Option<&str> {
        let url = match chain {
            ChainId::Ethereum => self.ethereum_rpc_url.as_deref(),
            ChainId::Optimism => self.optimism_rpc_url.as_deref(),
            ChainId::Polygon => self.polygon_rpc_url.as_deref(),
            ChainId::Arbitrum => self.arbitrum_rpc_url.as_deref(),
            ChainId::Base => self.base_rpc_url.as_deref(),
            ChainId::Avalanche => self.avalanche_rpc_url.as_deref(),
            ChainId::Linea => self.linea_rpc_url.as_deref(),
            ChainId::Scroll => self.scroll_rpc_url.as_deref(),
        };
        url.map(str::trim).filter(|value| !value.is_empty())
    }

    /// All configured endpoints keyed by numeric chain id.
    pub fn rpc_endpoints(&self) -> HashMap<u64, String> {
        crate::constants::SUPPORTED_CHAINS
            .iter()
            .filter_map(|chain| {
                self.rpc_url_for(chain.id)
                    .map(|url| (chain.id.id(), url.to_string()))
            })
            .collect()
    }
}
