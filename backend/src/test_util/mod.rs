//! Helpers shared by unit and integration tests.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

use crate::config::{
    AuthConfig, Config, CorsConfig, DocumentsConfig, LoggingConfig, PaymentsConfig, ServerConfig, StoreConfig,
    StoreDriver, SupabaseConfig,
};
use crate::store::{BillingStore, SqliteStore};
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_GATEWAY_SECRET: &str = "test-gateway-secret";
pub const TEST_STATE_SECRET: &str = "test-state-secret";

/// Config pointing every external service at `service_url`.
pub fn test_config(service_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_base_url: "http://api.test".to_string(),
            app_base_url: "http://app.test".to_string(),
            static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/static").to_string(),
            secure_cookies: false,
        },
        supabase: SupabaseConfig {
            url: service_url.to_string(),
            anon_key: "anon".to_string(),
            service_role_key: "service".to_string(),
            jwt_secret: TEST_JWT_SECRET.to_string(),
            jwt_audience: "authenticated".to_string(),
        },
        store: StoreConfig {
            driver: StoreDriver::Sqlite,
            sqlite_path: ":memory:".to_string(),
        },
        documents: DocumentsConfig {
            base_url: service_url.to_string(),
            timeout_secs: 5,
            default_pages: 5,
            max_pages: 20,
            consume_trial_on_failure: false,
            history_limit: 50,
        },
        payments: PaymentsConfig {
            base_url: service_url.to_string(),
            amount: 14.0,
            subscription_days: 30,
            gateway_hmac_secret: TEST_GATEWAY_SECRET.to_string(),
            state_secret: TEST_STATE_SECRET.to_string(),
        },
        auth: AuthConfig { signin_per_minute: 3 },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig { origins: "*".to_string() },
    }
}

/// App state over an in-memory SQLite store.
pub fn create_test_state(config: Config) -> Arc<AppState> {
    let store: Arc<dyn BillingStore> = Arc::new(SqliteStore::in_memory().unwrap());
    Arc::new(AppState::new(config, store).unwrap())
}

#[derive(serde::Serialize)]
struct TestClaims {
    sub: String,
    email: Option<String>,
    role: String,
    aud: String,
    exp: i64,
    iat: i64,
}

/// Access token as the hosted auth service would sign it.
pub fn generate_test_jwt(user_id: &str, email: Option<&str>) -> String {
    generate_test_jwt_with_expiry(user_id, email, Duration::hours(1))
}

pub fn generate_test_jwt_with_expiry(user_id: &str, email: Option<&str>, valid_for: Duration) -> String {
    let now = Utc::now();
    let claims = TestClaims {
        sub: user_id.to_string(),
        email: email.map(String::from),
        role: "authenticated".to_string(),
        aud: "authenticated".to_string(),
        exp: (now + valid_for).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
