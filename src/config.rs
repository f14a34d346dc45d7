use config::{Config, ConfigError, Environment, File};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CURRENCY: &str = "KES";
const DEFAULT_PAYMENT_METHOD: &str = "mpesa";
const DEFAULT_MAX_LOYALTY_FRACTION: f64 = 0.10;
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
///
/// Loaded from an optional `config/default` file layered with `QUICKWASH_*`
/// environment variables. The loyalty fraction cap mirrors the backend's
/// configured policy; it bounds the *local* estimate only. The server
/// remains authoritative for every confirmed amount.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the QuickWash backend, e.g. `https://api.quickwash.example`
    #[validate(length(min = 1))]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Display currency code
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Payment method sent on order confirmation
    #[serde(default = "default_payment_method")]
    pub default_payment_method: String,

    /// Largest share of the subtotal that loyalty points may discount
    #[serde(default = "default_max_loyalty_fraction")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_loyalty_fraction: f64,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_payment_method() -> String {
    DEFAULT_PAYMENT_METHOD.to_string()
}

fn default_max_loyalty_fraction() -> f64 {
    DEFAULT_MAX_LOYALTY_FRACTION
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            request_timeout_secs: default_timeout_secs(),
            currency: default_currency(),
            default_payment_method: default_payment_method(),
            max_loyalty_fraction: default_max_loyalty_fraction(),
            environment: default_env(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/default` (optional) layered with
    /// `QUICKWASH_*` environment variables, then validate ranges.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(Environment::with_prefix("QUICKWASH"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

        info!(
            environment = %app_config.environment,
            base_url = %app_config.api_base_url,
            "configuration loaded"
        );
        Ok(app_config)
    }

    /// Loyalty cap as a `Decimal` fraction of the subtotal.
    pub fn max_loyalty_fraction(&self) -> Decimal {
        Decimal::from_f64(self.max_loyalty_fraction).unwrap_or(Decimal::ZERO)
    }
}

/// Install a `tracing` subscriber honoring `RUST_LOG`, falling back to the
/// configured log level. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
