use crate::domain::credential::SigningCredential;
use crate::domain::notification::PayloadDefaults;
use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub apns: ApnsConfig,

    #[command(flatten)]
    pub outbox: OutboxConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "MOVEE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "MOVEE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long, env = "MOVEE_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// How long to wait for in-flight requests during shutdown
    #[arg(long, env = "MOVEE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Upper bound for a whole invocation, including every device delivery
    #[arg(long, env = "MOVEE_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Connection URL of the device-token store
    #[arg(long = "database-url", env = "SUPABASE_DB_URL")]
    pub url: Option<String>,

    /// Privileged credential for the store; overrides any password in the URL
    #[arg(long = "database-password", env = "SUPABASE_DB_PASSWORD")]
    pub password: Option<String>,

    #[arg(long = "db-max-connections", env = "MOVEE_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    #[arg(long = "db-min-connections", env = "MOVEE_DB_MIN_CONNECTIONS", default_value_t = 0)]
    pub min_connections: u32,

    #[arg(long = "db-acquire-timeout-secs", env = "MOVEE_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Timeout for the readiness probe query
    #[arg(long = "db-health-timeout-ms", env = "MOVEE_DB_HEALTH_TIMEOUT_MS", default_value_t = 2000)]
    pub health_timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ApnsConfig {
    /// Apple developer team identifier (JWT issuer)
    #[arg(long = "apns-team-id", env = "APPLE_TEAM_ID")]
    pub team_id: Option<String>,

    /// Identifier of the APNs signing key
    #[arg(long = "apns-key-id", env = "APPLE_KEY_ID")]
    pub key_id: Option<String>,

    /// Contents of the PKCS8 .p8 key file
    #[arg(long = "apns-private-key", env = "APPLE_APNS_PRIVATE_KEY", hide_env_values = true, allow_hyphen_values = true)]
    pub private_key: Option<String>,

    /// Bundle identifier sent as apns-topic
    #[arg(long = "apns-bundle-id", env = "APPLE_BUNDLE_ID")]
    pub bundle_id: Option<String>,

    /// APNs host; a value with an explicit scheme is used as the base URL
    #[arg(id = "apns_host", long = "apns-host", env = "APPLE_APNS_HOST", default_value = "api.push.apple.com")]
    pub host: String,

    /// Per-device request timeout
    #[arg(
        id = "apns_request_timeout_secs",
        long = "apns-request-timeout-secs",
        env = "APPLE_APNS_REQUEST_TIMEOUT_SECS",
        default_value_t = 30
    )]
    pub request_timeout_secs: u64,

    /// Maximum number of deliveries in flight for one invocation
    #[arg(long = "apns-max-concurrency", env = "APPLE_APNS_MAX_CONCURRENCY", default_value_t = 8)]
    pub max_concurrency: usize,

    /// How long a signed provider token is reused; 0 signs on every invocation
    #[arg(long = "apns-token-ttl-secs", env = "APPLE_APNS_TOKEN_TTL_SECS", default_value_t = 3300)]
    pub token_ttl_secs: u64,

    #[arg(long = "apns-sound", env = "APPLE_APNS_SOUND", default_value = "default")]
    pub sound: String,

    #[arg(long = "apns-badge", env = "APPLE_APNS_BADGE", default_value_t = 1)]
    pub badge: u32,

    /// Grouping identifier shown as thread-id
    #[arg(long = "apns-thread-id", env = "APPLE_APNS_THREAD_ID", default_value = "movee-notifications")]
    pub thread_id: String,
}

impl DatabaseConfig {
    /// Names of the store settings that are absent or blank.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        if self.url.as_deref().is_none_or(|url| url.trim().is_empty()) { vec!["SUPABASE_DB_URL"] } else { Vec::new() }
    }
}

impl ApnsConfig {
    /// Validates the signing fields and builds the credential.
    ///
    /// # Errors
    /// Returns the names of every environment variable that is absent or blank.
    pub fn credential(&self) -> Result<SigningCredential, Vec<&'static str>> {
        let fields = [
            ("APPLE_TEAM_ID", &self.team_id),
            ("APPLE_KEY_ID", &self.key_id),
            ("APPLE_APNS_PRIVATE_KEY", &self.private_key),
            ("APPLE_BUNDLE_ID", &self.bundle_id),
        ];

        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();

        match (&self.team_id, &self.key_id, &self.private_key, &self.bundle_id) {
            (Some(team_id), Some(key_id), Some(private_key), Some(bundle_id)) if missing.is_empty() => {
                Ok(SigningCredential::new(team_id.trim(), key_id.trim(), private_key, bundle_id.trim()))
            }
            _ => Err(missing),
        }
    }

    #[must_use]
    pub fn payload_defaults(&self) -> PayloadDefaults {
        PayloadDefaults { sound: self.sound.clone(), badge: self.badge, thread_id: self.thread_id.clone() }
    }

    /// Base URL of the device endpoint, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct OutboxConfig {
    /// Shared secret expected in x-cron-secret; unset disables the check
    #[arg(long = "outbox-cron-secret", env = "PUSH_OUTBOX_CRON_SECRET", hide_env_values = true)]
    pub cron_secret: Option<String>,

    /// Maximum number of outbox rows handled per drain
    #[arg(long = "outbox-batch", env = "PUSH_OUTBOX_BATCH", default_value_t = 25)]
    pub batch: i64,

    /// Rows reaching this many attempts are marked failed
    #[arg(long = "outbox-max-attempts", env = "PUSH_OUTBOX_MAX_ATTEMPTS", default_value_t = 10)]
    pub max_attempts: i32,

    /// Rows stuck in 'sending' for longer than this are picked up again
    #[arg(long = "outbox-sending-timeout-secs", env = "PUSH_OUTBOX_SENDING_TIMEOUT_SECONDS", default_value_t = 600)]
    pub sending_timeout_secs: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    #[arg(long = "log-format", env = "MOVEE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint; spans and metrics are only exported when set
    #[arg(long = "otlp-endpoint", env = "MOVEE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long = "metrics-export-interval-secs", env = "MOVEE_METRICS_EXPORT_INTERVAL_SECS", default_value_t = 60)]
    pub metrics_export_interval_secs: u64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
