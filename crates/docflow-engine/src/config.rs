//! # Engine Configuration
//!
//! Rates, thresholds and limits used by the workflow engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DOCFLOW_TAX_RATE_BPS=1600                                          │
//! │     DOCFLOW_DB_PATH=/srv/docflow/docflow.db                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/docflow/engine.toml (Linux)                              │
//! │     ~/Library/Application Support/com.docflow.docflow/engine.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/docflow/docflow.db"
//! max_connections = 5
//!
//! [pricing]
//! tax_rate_bps = 1600
//! wholesale_discount_bps = 500
//! cost_of_goods_bps = 7000
//!
//! [inventory]
//! low_stock_threshold = 5
//!
//! [payments]
//! card_approval_limit_cents = 1000000
//!
//! [workflow]
//! transaction_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use docflow_core::totals::{
    DEFAULT_COST_OF_GOODS_BPS, DEFAULT_TAX_RATE_BPS, DEFAULT_WHOLESALE_DISCOUNT_BPS,
};
use docflow_core::{DiscountRate, Money, Pricing, TaxRate};
use docflow_db::DbConfig;

use crate::error::ConfigError;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` selects an in-memory database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "docflow", "docflow")
        .map(|dirs| dirs.data_dir().join("docflow.db"))
        .unwrap_or_else(|| PathBuf::from("./docflow.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

/// All rates in basis points (1600 = 16%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default = "default_tax_rate")]
    pub tax_rate_bps: u32,

    /// Automatic discount for wholesale clients.
    #[serde(default = "default_wholesale_discount")]
    pub wholesale_discount_bps: u32,

    /// Estimated cost of goods posted when invoicing.
    #[serde(default = "default_cost_of_goods")]
    pub cost_of_goods_bps: u32,
}

fn default_tax_rate() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_wholesale_discount() -> u32 {
    DEFAULT_WHOLESALE_DISCOUNT_BPS
}

fn default_cost_of_goods() -> u32 {
    DEFAULT_COST_OF_GOODS_BPS
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            tax_rate_bps: default_tax_rate(),
            wholesale_discount_bps: default_wholesale_discount(),
            cost_of_goods_bps: default_cost_of_goods(),
        }
    }
}

// =============================================================================
// Inventory / Payments / Workflow Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Products with stock strictly below this are reported after invoicing.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

fn default_low_stock_threshold() -> i64 {
    5
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Card payments above this total are declined. Default $10,000.00.
    #[serde(default = "default_card_limit")]
    pub card_approval_limit_cents: i64,
}

fn default_card_limit() -> i64 {
    1_000_000
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            card_approval_limit_cents: default_card_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Upper bound for one workflow or payment transaction.
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_secs: u64,
}

fn default_transaction_timeout() -> u64 {
    10
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        WorkflowSettings {
            transaction_timeout_secs: default_transaction_timeout(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub inventory: InventorySettings,

    #[serde(default)]
    pub payments: PaymentSettings,

    #[serde(default)]
    pub workflow: WorkflowSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document and validates it. Environment is not consulted.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, bps) in [
            ("pricing.tax_rate_bps", self.pricing.tax_rate_bps),
            ("pricing.wholesale_discount_bps", self.pricing.wholesale_discount_bps),
            ("pricing.cost_of_goods_bps", self.pricing.cost_of_goods_bps),
        ] {
            if bps > 10_000 {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be between 0 and 10000, got {bps}"
                )));
            }
        }

        if self.inventory.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "inventory.low_stock_threshold must not be negative".into(),
            ));
        }

        if self.payments.card_approval_limit_cents <= 0 {
            return Err(ConfigError::Invalid(
                "payments.card_approval_limit_cents must be greater than 0".into(),
            ));
        }

        if self.workflow.transaction_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "workflow.transaction_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(ConfigError::Invalid(format!(
                "database connections: min {} / max {} is not a valid pool size",
                self.database.min_connections, self.database.max_connections
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `DOCFLOW_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DOCFLOW_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        override_parsed(&lookup, "DOCFLOW_DB_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed(&lookup, "DOCFLOW_TAX_RATE_BPS", &mut self.pricing.tax_rate_bps);
        override_parsed(
            &lookup,
            "DOCFLOW_WHOLESALE_DISCOUNT_BPS",
            &mut self.pricing.wholesale_discount_bps,
        );
        override_parsed(&lookup, "DOCFLOW_COST_OF_GOODS_BPS", &mut self.pricing.cost_of_goods_bps);
        override_parsed(
            &lookup,
            "DOCFLOW_LOW_STOCK_THRESHOLD",
            &mut self.inventory.low_stock_threshold,
        );
        override_parsed(
            &lookup,
            "DOCFLOW_CARD_LIMIT_CENTS",
            &mut self.payments.card_approval_limit_cents,
        );
        override_parsed(
            &lookup,
            "DOCFLOW_TX_TIMEOUT_SECS",
            &mut self.workflow.transaction_timeout_secs,
        );
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "docflow", "docflow")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn pricing(&self) -> Pricing {
        Pricing {
            tax_rate: TaxRate::from_bps(self.pricing.tax_rate_bps),
            wholesale_discount: DiscountRate::from_bps(self.pricing.wholesale_discount_bps),
        }
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow.transaction_timeout_secs)
    }

    pub fn card_approval_limit(&self) -> Money {
        Money::from_cents(self.payments.card_approval_limit_cents)
    }

    /// Pool configuration for [`docflow_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let path = self.database.path.to_string_lossy();
        if path == ":memory:" {
            return DbConfig::in_memory();
        }

        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.parse::<T>() {
            Ok(value) => {
                debug!(key, value = %raw, "Overriding setting from environment");
                *target = value;
            }
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pricing.tax_rate_bps, 1600);
        assert_eq!(config.pricing.wholesale_discount_bps, 500);
        assert_eq!(config.pricing.cost_of_goods_bps, 7000);
        assert_eq!(config.inventory.low_stock_threshold, 5);
        assert_eq!(config.card_approval_limit(), Money::from_cents(1_000_000));
        assert_eq!(config.transaction_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [pricing]
            tax_rate_bps = 1200

            [database]
            path = ":memory:"
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing().tax_rate, TaxRate::from_bps(1200));
        assert_eq!(config.pricing.wholesale_discount_bps, 500);
        assert_eq!(config.workflow.transaction_timeout_secs, 10);
        assert!(config.db_config().is_in_memory());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.pricing.tax_rate_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.workflow.transaction_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.payments.card_approval_limit_cents = 0;
        assert!(config.validate().is_err());

        assert!(EngineConfig::from_toml("[inventory]\nlow_stock_threshold = -1").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCFLOW_TAX_RATE_BPS", "1500"),
            ("DOCFLOW_LOW_STOCK_THRESHOLD", "10"),
            ("DOCFLOW_TX_TIMEOUT_SECS", "not-a-number"),
            ("DOCFLOW_DB_PATH", "/tmp/docflow-test.db"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.pricing.tax_rate_bps, 1500);
        assert_eq!(config.inventory.low_stock_threshold, 10);
        assert_eq!(config.workflow.transaction_timeout_secs, 10);
        assert_eq!(config.database.path, PathBuf::from("/tmp/docflow-test.db"));
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[pricing]"));
        assert!(toml_str.contains("[workflow]"));
    }
}
