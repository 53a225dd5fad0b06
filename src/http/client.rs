//! Resilient API client.
//!
//! Every call runs through the same stack:
//!
//! ```text
//! retry_with_backoff
//!     → CircuitBreaker::execute
//!         → with_timeout
//!             → reqwest send
//!             → response::handle_response (classification)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use crate::auth::TokenStore;
use crate::cache::{cache_key, RequestCache};
use crate::config::{ClientConfig, PollingConfig};
use crate::http::request::{join_url, RequestBuilderExt, RequestId};
use crate::http::response::{ensure_success, handle_response};
use crate::http::types::{ApiError, ApiResult};
use crate::observability::metrics;
use crate::resilience::{
    retry_with_backoff, with_timeout, CircuitBreaker, CircuitSnapshot, RetryPolicy,
};

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// Aborts the call before the next attempt, during a backoff wait or mid-request.
    pub cancellation: Option<CancellationToken>,
    /// Overrides the configured per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Overrides the configured attempt budget.
    pub max_attempts: Option<u32>,
    /// Overrides the cache freshness window for `get_cached`.
    pub cache_ttl: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

/// A file sent as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    /// Form field holding the file.
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Extra text fields sent alongside the file.
    pub fields: Vec<(String, String)>,
}

impl MultipartUpload {
    pub fn file(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
            fields: Vec::new(),
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// MIME type guessed from the file name.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    fn form(&self) -> ApiResult<Form> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type())?;
        let form = self
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));
        Ok(form.part(self.field.clone(), part))
    }
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
    tokens: TokenStore,
    breaker: CircuitBreaker,
    cache: RequestCache<Value>,
    retry: RetryPolicy<ApiError>,
}

/// HTTP client for the platform API.
///
/// Cloning is cheap; clones share the token, cache and circuit breaker.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
    shutdown: Option<CancellationToken>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("circuit", &self.inner.breaker.state())
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> ApiResult<Self> {
        let base_url = Url::parse(&config.api.base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base URL: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.api.connect_timeout())
            .user_agent(config.api.user_agent.clone())
            .build()?;

        let retry = RetryPolicy::default()
            .with_max_attempts(config.retries.max_attempts)
            .with_backoff(config.retries.backoff())
            .with_on_retry(|err: &ApiError, attempt, delay| {
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Request failed, retrying");
            });

        tracing::debug!(base_url = %base_url, "API client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                config: config.clone(),
                tokens,
                breaker: CircuitBreaker::new("api", config.circuit_breaker.breaker_config()),
                cache: RequestCache::new(config.cache.ttl()),
                retry,
            }),
            shutdown: None,
        })
    }

    /// Calls made without their own token are cancelled when `token` fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.inner.config.polling
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.inner.tokens.set(token);
    }

    pub fn clear_token(&self) {
        self.inner.tokens.clear();
    }

    pub fn cache(&self) -> &RequestCache<Value> {
        &self.inner.cache
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    pub fn circuit_snapshot(&self) -> CircuitSnapshot {
        self.inner.breaker.snapshot()
    }

    pub fn reset_circuit(&self) {
        self.inner.breaker.reset();
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, opts: &RequestOptions) -> ApiResult<T> {
        self.execute(Method::GET, path, opts, Ok).await
    }

    /// GET through the response cache; concurrent identical calls share one request.
    ///
    /// Cancelling `opts.cancellation` only stops this caller's wait; the
    /// shared request keeps going for other waiters.
    pub async fn get_cached<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &RequestOptions,
    ) -> ApiResult<T> {
        let key = cache_key("GET", path, &opts.query);
        let ttl = opts.cache_ttl.unwrap_or(self.inner.cache.default_ttl());
        let client = self.clone();
        let path = path.to_string();
        let fetch_opts = RequestOptions {
            cancellation: None,
            ..opts.clone()
        };

        let wait = self.inner.cache.get_or_fetch_with_ttl(&key, ttl, move || async move {
            client.get::<Value>(&path, &fetch_opts).await
        });
        let value = cancellable(opts.cancellation.as_ref(), wait).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B, opts: &RequestOptions) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.execute(Method::POST, path, opts, |req| Ok(req.json(&body)))
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B, opts: &RequestOptions) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.execute(Method::PUT, path, opts, |req| Ok(req.json(&body)))
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B, opts: &RequestOptions) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.execute(Method::PATCH, path, opts, |req| Ok(req.json(&body)))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, opts: &RequestOptions) -> ApiResult<T> {
        self.execute(Method::DELETE, path, opts, Ok).await
    }

    /// POST a file as `multipart/form-data`. The form is rebuilt for every attempt.
    pub async fn upload_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        upload: &MultipartUpload,
        opts: &RequestOptions,
    ) -> ApiResult<T> {
        self.execute(Method::POST, path, opts, |req| Ok(req.multipart(upload.form()?)))
            .await
    }

    /// PUT raw bytes to a presigned storage URL.
    ///
    /// Retried like any other call but sent without the bearer token and
    /// outside the API circuit breaker.
    pub async fn put_presigned(
        &self,
        url: &str,
        bytes: Vec<u8>,
        content_type: &str,
        opts: &RequestOptions,
    ) -> ApiResult<()> {
        let url = Url::parse(url).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let policy = self.retry_policy(opts);
        let cancel = self.cancellation(opts);
        let timeout = opts.timeout.unwrap_or(self.inner.config.api.timeout());

        retry_with_backoff(&policy, |_attempt| {
            let request = self
                .inner
                .http
                .put(url.clone())
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes.clone());
            let fut = async move {
                let start = Instant::now();
                with_timeout(timeout, async {
                    let response = request.send().await.inspect_err(|_| {
                        metrics::record_request("PUT", 0, start);
                    })?;
                    metrics::record_request("PUT", response.status().as_u16(), start);
                    ensure_success(response).await
                })
                .await
            };
            cancellable(cancel.as_ref(), fut)
        })
        .await
    }

    async fn execute<T, F>(
        &self,
        method: Method,
        path: &str,
        opts: &RequestOptions,
        build: F,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> ApiResult<RequestBuilder>,
    {
        let url = join_url(&self.inner.base_url, path)?;
        let bearer = self.inner.tokens.bearer()?;
        let policy = self.retry_policy(opts);
        let cancel = self.cancellation(opts);

        retry_with_backoff(&policy, |attempt| {
            self.attempt(
                &method,
                &url,
                bearer.as_deref(),
                opts,
                &build,
                cancel.as_ref(),
                attempt,
            )
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt<T, F>(
        &self,
        method: &Method,
        url: &Url,
        bearer: Option<&str>,
        opts: &RequestOptions,
        build: &F,
        cancel: Option<&CancellationToken>,
        attempt: u32,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> ApiResult<RequestBuilder>,
    {
        let request_id = RequestId::new();
        let span = tracing::debug_span!(
            "api_request",
            method = %method,
            path = url.path(),
            request_id = %request_id,
            attempt
        );

        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .request_id(&request_id)
            .bearer(bearer)?;
        if !opts.query.is_empty() {
            request = request.query(&opts.query);
        }
        let request = build(request)?;

        let timeout = opts.timeout.unwrap_or(self.inner.config.api.timeout());
        let method_name = method.as_str().to_string();
        let send = async move {
            let start = Instant::now();
            let response = request.send().await.inspect_err(|_| {
                metrics::record_request(&method_name, 0, start);
            })?;
            metrics::record_request(&method_name, response.status().as_u16(), start);
            handle_response::<T>(response).await
        };

        let call = self
            .inner
            .breaker
            .execute(|| with_timeout(timeout, send));

        cancellable(cancel, call).instrument(span).await
    }

    fn retry_policy(&self, opts: &RequestOptions) -> RetryPolicy<ApiError> {
        let mut policy = self.inner.retry.clone();
        if let Some(max_attempts) = opts.max_attempts {
            policy = policy.with_max_attempts(max_attempts);
        }
        if let Some(token) = self.cancellation(opts) {
            policy = policy.with_cancellation(token);
        }
        policy
    }

    fn cancellation(&self, opts: &RequestOptions) -> Option<CancellationToken> {
        opts.cancellation.clone().or_else(|| self.shutdown.clone())
    }
}

/// Race `fut` against `token`, surfacing [`ApiError::Cancelled`] if it fires first.
pub(crate) async fn cancellable<T, F>(token: Option<&CancellationToken>, fut: F) -> ApiResult<T>
where
    F: std::future::Future<Output = ApiResult<T>>,
{
    match token {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => Err(ApiError::Cancelled),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}
