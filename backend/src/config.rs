//! Server configuration.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub documents: DocumentsConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL of this server, used to build the
    /// payment gateway's redirection URL.
    #[serde(default = "default_base_url")]
    pub public_base_url: String,
    /// Base URL of the browser app that payment redirects land on.
    #[serde(default = "default_base_url")]
    pub app_base_url: String,
    /// Directory holding the site pages and assets.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Add `Secure` to session cookies.
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_base_url(),
            app_base_url: default_base_url(),
            static_dir: default_static_dir(),
            secure_cookies: false,
        }
    }
}

/// Hosted auth and database project.
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public key sent as `apikey` on auth calls.
    pub anon_key: String,
    /// Privileged key used by the server for table writes.
    pub service_role_key: String,
    /// Secret the hosted auth service signs access tokens with (HS256).
    pub jwt_secret: String,
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// Hosted PostgREST tables.
    #[default]
    Rest,
    /// Local SQLite file, for development and tests.
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub driver: StoreDriver,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Base URL of the document-generation service.
    pub base_url: String,
    #[serde(default = "default_documents_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_pages")]
    pub default_pages: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Mark the trial used even when the remote generation fails.
    #[serde(default)]
    pub consume_trial_on_failure: bool,
    /// Number of rows returned by the documents listing.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Base URL of the payment service.
    pub base_url: String,
    /// Subscription price in major currency units.
    #[serde(default = "default_amount")]
    pub amount: f64,
    #[serde(default = "default_subscription_days")]
    pub subscription_days: i64,
    /// Secret shared with the gateway; signs redirect parameters.
    pub gateway_hmac_secret: String,
    /// Server-local secret binding a user id to a checkout redirect.
    pub state_secret: String,
}

impl PaymentsConfig {
    /// The price as the gateway reports it.
    pub fn amount_cents(&self) -> i64 {
        (self.amount * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Sign-in attempts allowed per email per minute.
    #[serde(default = "default_signin_per_minute")]
    pub signin_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signin_per_minute: default_signin_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

impl CorsConfig {
    /// Explicit origins, or `None` when any origin is allowed.
    pub fn origin_list(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_static_dir() -> String {
    "static".to_string()
}
fn default_jwt_audience() -> String {
    "authenticated".to_string()
}
fn default_sqlite_path() -> String {
    "./data/docsmith.db".to_string()
}
fn default_documents_timeout() -> u64 {
    120
}
fn default_pages() -> u32 {
    5
}
fn default_max_pages() -> u32 {
    20
}
fn default_history_limit() -> u32 {
    50
}
fn default_amount() -> f64 {
    14.0
}
fn default_subscription_days() -> i64 {
    30
}
fn default_signin_per_minute() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Sources, highest precedence first:
    /// 1. Environment variables (`DOCSMITH__SECTION__KEY`)
    /// 2. `docsmith.toml` (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("logging.level", default_log_level())?
            .add_source(File::with_name("docsmith").required(false))
            .add_source(
                Environment::with_prefix("DOCSMITH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
