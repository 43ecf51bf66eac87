//! Application configuration.
//!
//! Configuration is merged from three layers: compiled-in defaults, an
//! optional `btc-arb.toml` file, and `BTC_ARB_`-prefixed environment
//! variables (`BTC_ARB_TRADING__DRY_RUN=false`). Credentials are held as
//! [`SecretString`] and are never serialized; the [`scrub_secrets`] transform
//! additionally strips any secret-looking key from JSON about to leave the
//! process.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "btc-arb.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "BTC_ARB_";

/// Central configuration for the arbitrage trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub venues: VenueConfig,
    pub market: MarketConfig,
    pub trading: TradingConfig,
    pub fees: FeeConfig,
    pub logging: LoggingConfig,
    #[serde(skip_serializing, default)]
    pub credentials: CredentialsConfig,
    /// Path of the kill-switch sentinel file.
    #[serde(default = "default_kill_file")]
    pub kill_file_path: PathBuf,
    /// Scheduler probe / detector loop cadence in seconds.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: f64,
}

fn default_kill_file() -> PathBuf {
    PathBuf::from("KILL_SWITCH")
}

fn default_polling_interval() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path.
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/arbitrage_bot.db".to_string(),
        }
    }
}

/// Venue endpoint URLs. All endpoints are public market-data or documented
/// trade APIs; credentials live in [`CredentialsConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub binance_price_url: String,
    pub binance_klines_url: String,
    pub binance_ws_url: String,
    pub binance_symbol: String,
    pub polymarket_gamma_url: String,
    pub polymarket_clob_url: String,
    pub polymarket_ws_url: String,
    pub kalshi_api_url: String,
    pub kalshi_trade_url: String,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            binance_price_url: "https://api.binance.com/api/v3/ticker/price".to_string(),
            binance_klines_url: "https://api.binance.com/api/v3/klines".to_string(),
            binance_ws_url: "wss://stream.binance.com:9443/ws/btcusdt@ticker".to_string(),
            binance_symbol: "BTCUSDT".to_string(),
            polymarket_gamma_url: "https://gamma-api.polymarket.com/events".to_string(),
            polymarket_clob_url: "https://clob.polymarket.com/book".to_string(),
            polymarket_ws_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
            kalshi_api_url: "https://api.elections.kalshi.com/trade-api/v2/markets".to_string(),
            kalshi_trade_url: "https://api.elections.kalshi.com/trade-api/v2".to_string(),
        }
    }
}

/// Identity of the current hour's markets.
///
/// Resolving the hour slug and event ticker is the job of the external
/// market-discovery collaborator; these fields hold its latest answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Polymarket event slug, e.g. `bitcoin-up-or-down-3pm-et`.
    pub poly_slug: String,
    /// Kalshi event ticker, e.g. `KXBTCD-25AUG0115`.
    pub kalshi_event_ticker: String,
}

/// Trading limits enforced by the risk manager and the order engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// SAFE DEFAULT: no live trades until explicitly disabled.
    pub dry_run: bool,
    pub max_single_trade_usd: Decimal,
    pub max_total_exposure_usd: Decimal,
    pub max_daily_loss_usd: Decimal,
    pub max_trades_per_hour: u32,
    pub min_net_margin: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_single_trade_usd: Decimal::from(50),
            max_total_exposure_usd: Decimal::from(500),
            max_daily_loss_usd: Decimal::from(100),
            max_trades_per_hour: 20,
            min_net_margin: Decimal::new(2, 2),
        }
    }
}

/// Per-venue fee parameters for worst-case cost adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Kalshi fee per winning contract.
    pub kalshi_fee_per_contract: Decimal,
    /// Estimated gas for on-chain Polymarket settlement.
    pub polymarket_gas_cost: Decimal,
    /// Static buffer covering quote-to-fill crossings.
    pub slippage_buffer: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            kalshi_fee_per_contract: Decimal::new(3, 2),
            polymarket_gas_cost: Decimal::new(2, 3),
            slippage_buffer: Decimal::new(5, 3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            environment: "development".to_string(),
        }
    }
}

/// Venue credentials. Opaque strings, deserialized only, never logged.
#[derive(Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub kalshi_api_key: Option<SecretString>,
    /// RSA private key in PEM form (newlines may be escaped as `\n`).
    #[serde(default)]
    pub kalshi_private_key: Option<SecretString>,
    #[serde(default)]
    pub polymarket_private_key: Option<SecretString>,
    /// Bearer token for the kill-switch API. Empty ⇒ all requests rejected.
    #[serde(default)]
    pub kill_switch_token: Option<SecretString>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("kalshi_api_key", &self.kalshi_api_key.is_some())
            .field("kalshi_private_key", &self.kalshi_private_key.is_some())
            .field(
                "polymarket_private_key",
                &self.polymarket_private_key.is_some(),
            )
            .field("kill_switch_token", &self.kill_switch_token.is_some())
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            venues: VenueConfig::default(),
            market: MarketConfig::default(),
            trading: TradingConfig::default(),
            fees: FeeConfig::default(),
            logging: LoggingConfig::default(),
            credentials: CredentialsConfig::default(),
            kill_file_path: default_kill_file(),
            polling_interval_secs: default_polling_interval(),
        }
    }
}

impl AppConfig {
    /// Loads configuration: defaults ← `btc-arb.toml` ← `BTC_ARB_*` env vars.
    ///
    /// # Errors
    /// Returns an error if the file or environment contain malformed values.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// The figment underlying [`AppConfig::load`], exposed for tests.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Serializes the non-secret configuration for the operator surface.
    ///
    /// Credentials are skipped at the serde level; [`scrub_secrets`] runs on
    /// top of that so secret-looking keys from any layer are removed too.
    #[must_use]
    pub fn public_view(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        scrub_secrets(&mut value);
        value
    }
}

/// Key substrings that mark a field as secret, matched case-insensitively.
const SECRET_MARKERS: [&str; 5] = ["key", "secret", "token", "password", "private"];

/// Recursively removes object keys whose names look like secrets.
///
/// Applied at the serialization boundary rather than at call sites, so new
/// config fields are covered without code changes.
pub fn scrub_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| {
                let lower = key.to_lowercase();
                !SECRET_MARKERS.iter().any(|m| lower.contains(m))
            });
            for child in map.values_mut() {
                scrub_secrets(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                scrub_secrets(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    // ==================== Default Tests ====================

    #[test]
    fn test_trading_defaults() {
        let config = TradingConfig::default();

        assert!(config.dry_run);
        assert_eq!(config.max_single_trade_usd, dec!(50));
        assert_eq!(config.max_total_exposure_usd, dec!(500));
        assert_eq!(config.max_daily_loss_usd, dec!(100));
        assert_eq!(config.max_trades_per_hour, 20);
        assert_eq!(config.min_net_margin, dec!(0.02));
    }

    #[test]
    fn test_fee_defaults() {
        let config = FeeConfig::default();

        assert_eq!(config.kalshi_fee_per_contract, dec!(0.03));
        assert_eq!(config.polymarket_gas_cost, dec!(0.002));
        assert_eq!(config.slippage_buffer, dec!(0.005));
    }

    #[test]
    fn test_app_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.kill_file_path, PathBuf::from("KILL_SWITCH"));
        assert!((config.polling_interval_secs - 1.0).abs() < f64::EPSILON);
        assert!(config.credentials.kill_switch_token.is_none());
        assert!(config.venues.kalshi_api_url.contains("kalshi"));
    }

    // ==================== Scrub Tests ====================

    #[test]
    fn test_scrub_removes_secret_keys() {
        let mut value = json!({
            "dry_run": true,
            "KALSHI_API_KEY": "abc",
            "kill_switch_token": "t",
            "db_password": "p",
            "private_key_path": "/x",
            "some_secret": "s",
        });

        scrub_secrets(&mut value);

        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("dry_run"));
    }

    #[test]
    fn test_scrub_recurses_into_nested_objects() {
        let mut value = json!({
            "outer": {
                "inner": { "api_key": "abc", "host": "localhost" },
                "list": [ { "token": "t", "port": 1 } ],
            }
        });

        scrub_secrets(&mut value);

        assert_eq!(
            value,
            json!({ "outer": { "inner": { "host": "localhost" }, "list": [ { "port": 1 } ] } })
        );
    }

    #[test]
    fn test_scrub_case_insensitive() {
        let mut value = json!({ "Kill_Switch_TOKEN": "t", "ok": 1 });
        scrub_secrets(&mut value);
        assert_eq!(value, json!({ "ok": 1 }));
    }

    // ==================== Public View Tests ====================

    #[test]
    fn test_public_view_has_no_credentials() {
        let config = AppConfig::default();
        let view = config.public_view();
        let rendered = view.to_string();

        assert!(!rendered.contains("credentials"));
        assert!(!rendered.to_lowercase().contains("kalshi_api_key"));
        assert!(!rendered.to_lowercase().contains("kill_switch_token"));
        assert!(!rendered.to_lowercase().contains("private_key"));
    }

    #[test]
    fn test_public_view_keeps_trading_limits() {
        let config = AppConfig::default();
        let view = config.public_view();

        assert_eq!(view["trading"]["dry_run"], json!(true));
        assert_eq!(view["server"]["port"], json!(8000));
    }

    // ==================== Serde Round Trips ====================

    #[test]
    fn test_log_format_serde() {
        assert_eq!(serde_json::to_string(&LogFormat::Json).unwrap(), "\"json\"");
        let parsed: LogFormat = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(parsed, LogFormat::Text);
    }

    #[test]
    fn test_credentials_debug_never_prints_values() {
        let creds: CredentialsConfig =
            serde_json::from_value(json!({ "kalshi_api_key": "super-secret-id" })).unwrap();
        let debug = format!("{:?}", creds);

        assert!(!debug.contains("super-secret-id"));
        assert!(debug.contains("kalshi_api_key"));
    }

    #[test]
    fn test_config_deserializes_decimals_from_numbers() {
        let config: TradingConfig = serde_json::from_value(json!({
            "dry_run": false,
            "max_single_trade_usd": 25,
            "max_total_exposure_usd": 250.0,
            "max_daily_loss_usd": 75,
            "max_trades_per_hour": 10,
            "min_net_margin": 0.05,
        }))
        .unwrap();

        assert!(!config.dry_run);
        assert_eq!(config.max_single_trade_usd, dec!(25));
        assert_eq!(config.min_net_margin, dec!(0.05));
    }
}
