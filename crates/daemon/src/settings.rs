//! Daemon configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file
//! (`JOBBOARD_CONFIG`, default `jobboard.toml`), then `JOBBOARD_*` environment
//! variables with `__` separating nested keys (`JOBBOARD_RPC__PORT=9700`).

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use jobboard_core::application::sweeper::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_LEASE_MS, DEFAULT_POLL_INTERVAL,
};
use jobboard_core::application::SweeperConfig;
use jobboard_core::domain::{PricingTable, PricingTier};
use jobboard_infra_payment::DEFAULT_STRIPE_API_BASE;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "JOBBOARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "jobboard.toml";
const ENV_PREFIX: &str = "JOBBOARD";

const DEFAULT_DB_PATH: &str = "~/.jobboard/board.db";
const DEFAULT_RPC_PORT: i64 = 9640;
const DEFAULT_WEBHOOK_PORT: i64 = 9641;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub database_path: String,
    /// Externally reachable base URL (checkout redirects, sandbox page)
    pub public_url: String,
    pub currency: String,
    pub rpc: RpcSection,
    pub webhook: WebhookSection,
    pub stripe: StripeSection,
    pub sweeper: SweeperSection,
    /// Replaces the built-in tiers when present
    #[serde(default)]
    pub pricing: Option<Vec<PricingTier>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    pub host: String,
    pub port: u16,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSection {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSection {
    /// Without a key the sandbox gateway is used
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperSection {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub lease_ms: i64,
}

impl DaemonConfig {
    /// Load from the file named by `JOBBOARD_CONFIG` and the process environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with(Some(&path), None)
    }

    /// `env` replaces the process environment (for tests)
    pub fn load_with(
        path: Option<&str>,
        env: Option<std::collections::HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Toml).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: DaemonConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            bail!("database_path must not be empty");
        }
        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            bail!("public_url must be an http(s) URL, got {:?}", self.public_url);
        }
        if self.currency.trim().is_empty() {
            bail!("currency must not be empty");
        }
        if self.sweeper.poll_interval_ms == 0 || self.sweeper.batch_size == 0 {
            bail!("sweeper.poll_interval_ms and sweeper.batch_size must be positive");
        }
        if self.sweeper.lease_ms <= 0 {
            bail!("sweeper.lease_ms must be positive");
        }
        if self.stripe_secret_key().is_some() && self.webhook_secret().is_none() {
            bail!("stripe.webhook_secret is required when stripe.secret_key is set");
        }
        self.pricing_table()?;
        Ok(())
    }

    /// SQLite URL with `~` expanded; `:memory:` stays in memory
    pub fn database_url(&self) -> String {
        if self.database_path == ":memory:" {
            return "sqlite::memory:".to_string();
        }
        format!("sqlite://{}", self.expanded_database_path())
    }

    pub fn expanded_database_path(&self) -> String {
        shellexpand::tilde(&self.database_path).into_owned()
    }

    pub fn pricing_table(&self) -> Result<PricingTable> {
        match &self.pricing {
            None => Ok(PricingTable::default()),
            Some(tiers) => PricingTable::new(tiers.clone()).context("Invalid pricing tiers"),
        }
    }

    pub fn stripe_secret_key(&self) -> Option<&str> {
        non_blank(self.stripe.secret_key.as_deref())
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        non_blank(self.stripe.webhook_secret.as_deref())
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            poll_interval: Duration::from_millis(self.sweeper.poll_interval_ms),
            batch_size: self.sweeper.batch_size,
            lease_ms: self.sweeper.lease_ms,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    let public_url = format!("http://127.0.0.1:{}", DEFAULT_WEBHOOK_PORT);
    let builder = Config::builder()
        .set_default("database_path", DEFAULT_DB_PATH)?
        .set_default("public_url", public_url)?
        .set_default("currency", "usd")?
        .set_default("rpc.host", "127.0.0.1")?
        .set_default("rpc.port", DEFAULT_RPC_PORT)?
        .set_default("rpc.rate_limit_burst", 200_i64)?
        .set_default("rpc.rate_limit_per_sec", 100_i64)?
        .set_default("webhook.host", "127.0.0.1")?
        .set_default("webhook.port", DEFAULT_WEBHOOK_PORT)?
        .set_default("stripe.api_base", DEFAULT_STRIPE_API_BASE)?
        .set_default(
            "sweeper.poll_interval_ms",
            DEFAULT_POLL_INTERVAL.as_millis() as i64,
        )?
        .set_default("sweeper.batch_size", DEFAULT_BATCH_SIZE as i64)?
        .set_default("sweeper.lease_ms", DEFAULT_LEASE_MS)?;
    Ok(builder)
}
