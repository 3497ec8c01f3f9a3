// Async vendor API collaborator.
//
// The vendor speaks POST-with-JSON on every operation and expects dealer
// credentials inside the request body. Credentials are an opaque input: the
// client attaches them, it never builds or inspects them. Transport failures
// are retried with exponential backoff and jitter; business errors inside a
// 200 body are left for the normalizers.

use crate::order::{validate_new_order_payload, NewOrderPayload, OrderError};
use crate::types::IntervalId;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("vendor returned HTTP {status}")]
    Http { status: u16 },

    #[error("order payload rejected before submission: {0}")]
    InvalidOrder(#[from] OrderError),
}

impl ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Http { status } => *status >= 500,
            ApiError::InvalidOrder(_) => false,
        }
    }
}

/// Dealer credentials, attached verbatim to every outgoing request.
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Exponential backoff with jitter to avoid synchronized retries.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = (config.initial_backoff.as_millis() as f64
        * config.backoff_multiplier.powf(attempt as f64))
    .min(config.max_backoff.as_millis() as f64);
    let jitter = rand::random::<f64>() * config.jitter_factor * base_ms;
    Duration::from_millis((base_ms * (1.0 - config.jitter_factor / 2.0) + jitter) as u64)
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Schedule search parameters.
#[derive(Debug, Clone, Serialize)]
pub struct RouteQuery {
    pub point_from_id: String,
    pub point_to_id: String,
    pub date: NaiveDate,
    pub currency: String,
    pub lang: String,
}

/// Seat availability query for one leg; also the source of the cache key.
#[derive(Debug, Clone, Serialize)]
pub struct SeatsQuery {
    pub interval_id: IntervalId,
    pub point_from_id: String,
    pub point_to_id: String,
    pub currency: String,
    pub lang: String,
}

impl SeatsQuery {
    pub fn cache_key(&self) -> String {
        crate::cache::create_cache_key(
            self.interval_id.as_str(),
            &self.point_from_id,
            &self.point_to_id,
            &self.currency,
            &self.lang,
        )
    }
}

/// Discount/baggage sub-query for one leg.
#[derive(Debug, Clone, Serialize)]
pub struct LegQuery {
    pub interval_id: IntervalId,
    pub currency: String,
    pub lang: String,
}

/// The vendor operations this core consumes. Responses are raw bodies; the
/// normalization layer owns their interpretation.
#[async_trait]
pub trait VendorGateway: Send + Sync {
    async fn get_routes(&self, query: &RouteQuery) -> Result<String, ApiError>;
    async fn get_free_seats(&self, query: &SeatsQuery) -> Result<String, ApiError>;
    async fn get_discounts(&self, query: &LegQuery) -> Result<String, ApiError>;
    async fn get_baggage(&self, query: &LegQuery) -> Result<String, ApiError>;
    async fn submit_order(&self, payload: &NewOrderPayload) -> Result<String, ApiError>;
}

pub struct VendorClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Credentials,
}

impl VendorClient {
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    fn inject_credentials(&self, params: serde_json::Value) -> serde_json::Value {
        let mut body = params;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("login".to_string(), json!(self.credentials.login));
            obj.insert("password".to_string(), json!(self.credentials.password));
        }
        body
    }

    async fn post_once(&self, op: &str, body: &serde_json::Value) -> Result<String, ApiError> {
        let url = format!("{}/{op}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
            });
        }

        // The body may be JSON or an XML-wrapped error; hand back raw text
        // and let the normalizers decide.
        response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn post(&self, op: &str, params: serde_json::Value) -> Result<String, ApiError> {
        let body = self.inject_credentials(params);
        let mut attempt = 0;
        loop {
            debug!(op, attempt, "vendor request");
            match self.post_once(op, &body).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < self.config.retry.max_retries => {
                    let backoff = calculate_backoff(attempt, &self.config.retry);
                    warn!(op, attempt, %err, backoff_ms = backoff.as_millis() as u64, "retrying vendor request");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn to_params<T: Serialize>(query: &T) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(query).map_err(|e| ApiError::Network(e.to_string()))
    }
}

#[async_trait]
impl VendorGateway for VendorClient {
    async fn get_routes(&self, query: &RouteQuery) -> Result<String, ApiError> {
        self.post("get_all_routes", Self::to_params(query)?).await
    }

    async fn get_free_seats(&self, query: &SeatsQuery) -> Result<String, ApiError> {
        self.post("get_free_seats", Self::to_params(query)?).await
    }

    async fn get_discounts(&self, query: &LegQuery) -> Result<String, ApiError> {
        self.post("get_discount", Self::to_params(query)?).await
    }

    async fn get_baggage(&self, query: &LegQuery) -> Result<String, ApiError> {
        self.post("get_baggage", Self::to_params(query)?).await
    }

    async fn submit_order(&self, payload: &NewOrderPayload) -> Result<String, ApiError> {
        // Mandatory structural re-check before anything leaves the process.
        validate_new_order_payload(payload)?;
        self.post("new_order", Self::to_params(payload)?).await
    }
}

/// Monotonic counter identifying the current search/booking attempt. A fetch
/// captures a token up front; when the user restarts the search mid-flight,
/// the session bumps the generation and the late result is discarded instead
/// of being committed onto stale state.
#[derive(Debug, Clone, Default)]
pub struct SessionGeneration {
    current: Arc<AtomicU64>,
}

impl SessionGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            current: Arc::clone(&self.current),
            value: self.current.load(Ordering::Acquire),
        }
    }

    /// Invalidate all outstanding tokens.
    pub fn bump(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
pub struct GenerationToken {
    current: Arc<AtomicU64>,
    value: u64,
}

impl GenerationToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.value
    }
}
