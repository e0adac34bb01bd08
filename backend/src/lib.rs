pub mod auth;
pub mod config;
pub mod documents;
pub mod entitlement;
pub mod error;
pub mod logging;
pub mod models;
pub mod payments;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::{AuthClient, AuthUser, CookieJar, JwtVerifier};
pub use config::{Config, StoreDriver};
pub use documents::DocumentClient;
pub use entitlement::{Entitlement, GenerationSlots};
pub use error::AppError;
pub use payments::{PaymentClient, PaymentProcessor, SignatureVerifier};
pub use store::{BillingStore, RestStore, SqliteStore};

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub verifier: JwtVerifier,
    pub auth_client: AuthClient,
    pub store: Arc<dyn BillingStore>,
    pub documents: DocumentClient,
    pub payments: PaymentClient,
    pub processor: PaymentProcessor,
    /// Trial users with a generation in flight.
    pub slots: GenerationSlots,
    /// Sign-in attempts keyed by lowercased email.
    pub signin_limiter: DefaultKeyedRateLimiter<String>,
    pub cookies: CookieJar,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn BillingStore>) -> Result<Self, AppError> {
        let verifier = JwtVerifier::new(&config.supabase.jwt_secret, &config.supabase.jwt_audience);
        let auth_client = AuthClient::new(&config.supabase.url, &config.supabase.anon_key);
        let documents = DocumentClient::new(&config.documents.base_url, config.documents.timeout_secs)?;
        let payments = PaymentClient::new(&config.payments.base_url);
        let signatures = SignatureVerifier::new(
            &config.payments.gateway_hmac_secret,
            &config.payments.state_secret,
        )?;
        let processor = PaymentProcessor::new(
            store.clone(),
            signatures,
            config.payments.amount_cents(),
            config.payments.subscription_days,
        );

        let per_minute = NonZeroU32::new(config.auth.signin_per_minute).unwrap_or(NonZeroU32::MIN);
        let signin_limiter = RateLimiter::keyed(Quota::per_minute(per_minute));
        let cookies = CookieJar::new(config.server.secure_cookies);

        Ok(Self {
            config,
            verifier,
            auth_client,
            store,
            documents,
            payments,
            processor,
            slots: GenerationSlots::new(),
            signin_limiter,
            cookies,
        })
    }

    /// Forget sign-in limiter keys whose quota has fully replenished.
    pub fn prune_rate_limits(&self) {
        self.signin_limiter.retain_recent();
        self.signin_limiter.shrink_to_fit();
    }
}

/// Prune the sign-in limiter every `period` for the life of the process.
pub fn spawn_limiter_pruning(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            state.prune_rate_limits();
            tracing::debug!(keys = state.signin_limiter.len(), "Pruned sign-in rate limits");
        }
    })
}

/// Open the configured storage driver.
pub fn build_store(config: &Config) -> Result<Arc<dyn BillingStore>, store::StoreError> {
    let store: Arc<dyn BillingStore> = match config.store.driver {
        StoreDriver::Rest => Arc::new(RestStore::new(
            &config.supabase.url,
            &config.supabase.service_role_key,
        )),
        StoreDriver::Sqlite => Arc::new(SqliteStore::new(&config.store.sqlite_path)?),
    };
    tracing::info!("Using {} store", store.driver());
    Ok(store)
}

/// All routes, with request logging. CORS and tracing layers are added by the binary.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health::router(state.clone()))
        .merge(routes::auth::router(state.clone()))
        .merge(routes::account::router(state.clone()))
        .merge(routes::documents::router(state.clone()))
        .merge(routes::payments::router(state.clone()))
        .merge(routes::site::router(state))
        .layer(middleware::from_fn(logging::request_logger))
}
