use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Default, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub crypto: CryptoConfig,

    #[command(flatten)]
    pub dispatch: DispatchConfig,

    #[command(flatten)]
    pub providers: ProviderConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL. Messages are kept in memory when absent.
    #[arg(long = "database-url", env = "COURIER_DATABASE_URL")]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    #[arg(long, env = "COURIER_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept in the pool
    #[arg(long, env = "COURIER_DB_MIN_CONNECTIONS", default_value_t = 0)]
    pub min_connections: u32,

    /// How long to wait for a connection before giving up
    #[arg(long, env = "COURIER_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// How long an idle connection is kept open
    #[arg(long, env = "COURIER_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a single connection
    #[arg(long, env = "COURIER_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct CryptoConfig {
    /// Base64-encoded 32-byte master key. Realm keys are derived from it.
    #[arg(long, env = "COURIER_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        // 32 zero bytes; only suitable for tests.
        Self { encryption_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string() }
    }
}

#[derive(Clone, Debug, Args)]
pub struct DispatchConfig {
    /// Maximum number of provider calls in flight for a single request
    #[arg(long, env = "COURIER_MAX_CONCURRENCY", default_value_t = 16)]
    pub max_concurrency: usize,

    /// Deadline for a single provider call
    #[arg(long, env = "COURIER_PROVIDER_TIMEOUT_SECS", default_value_t = 30)]
    pub provider_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 16, provider_timeout_secs: 30 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ProviderConfig {
    /// Base URL of the SendGrid API
    #[arg(long, env = "COURIER_SENDGRID_BASE_URL", default_value = "https://api.sendgrid.com")]
    pub sendgrid_base_url: String,

    /// Base URL of the Twilio API
    #[arg(long, env = "COURIER_TWILIO_BASE_URL", default_value = "https://api.twilio.com")]
    pub twilio_base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sendgrid_base_url: "https://api.sendgrid.com".to_string(),
            twilio_base_url: "https://api.twilio.com".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint for traces and metrics (e.g. http://localhost:4317)
    #[arg(long, env = "COURIER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = Config::parse_from(["courier", "--encryption-key", "key"]);
        let defaults = Config::default();

        assert_eq!(parsed.dispatch.max_concurrency, defaults.dispatch.max_concurrency);
        assert_eq!(parsed.dispatch.provider_timeout_secs, defaults.dispatch.provider_timeout_secs);
        assert_eq!(parsed.providers.sendgrid_base_url, defaults.providers.sendgrid_base_url);
        assert_eq!(parsed.database.max_connections, defaults.database.max_connections);
        assert_eq!(parsed.telemetry.log_format, LogFormat::Text);
        assert!(parsed.database.url.is_none());
    }
}
