//! The authenticated HTTP client (component A).

use alpamon_core::{AgentError, Settings};
use alpamon_retry::{ExponentialBackoff, IntervalFunction};
use alpamon_timelimiter::{TimeLimiterError, TimeLimiterLayer};
use reqwest::Method as ReqwestMethod;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, Layer, Service, ServiceExt};

/// Status, headers, and body of a completed request, per ("Returns
/// status code, headers, and body").
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `reqwest::Client` built once at startup, carrying the credential header
/// and TLS policy derived from [`Settings`].
#[derive(Clone)]
pub struct AuthenticatedClient {
    inner: reqwest::Client,
    base_url: String,
    auth_header: String,
}

impl AuthenticatedClient {
    /// Builds the client from process-wide settings: `danger_accept_invalid_certs`
    /// wired to `[ssl] verify`, `add_root_certificate` wired to `ca_cert`.
    pub fn new(settings: &Settings) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder();

        if !settings.tls.verify {
            #[cfg(feature = "tracing")]
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(ca_path) = &settings.tls.ca_cert {
            let pem = std::fs::read(ca_path)
                .map_err(|e| AgentError::Config(format!("reading ca_cert {}: {e}", ca_path.display())))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| AgentError::Config(format!("parsing ca_cert: {e}")))?;
            builder = builder.add_root_certificate(cert).tls_built_in_root_certs(false);
        }

        let inner = builder
            .build()
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        Ok(Self {
            inner,
            base_url: settings.server_url.clone(),
            auth_header: settings.authorization_header(),
        })
    }

    fn resolve(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}{}", self.base_url, path_or_url)
        }
    }

    /// Whether a transport-level retry is safe for this method: up to
    /// three transport-level retries on connection errors for idempotent
    /// methods.
    fn is_idempotent(method: &ReqwestMethod) -> bool {
        matches!(*method, ReqwestMethod::GET | ReqwestMethod::PUT | ReqwestMethod::DELETE)
    }

    /// Issues one request, retrying transport-level connection errors up to
    /// three times for idempotent methods. Does not itself retry on
    /// application-level (non-2xx) responses — that is the reporter pool's job.
    ///
    /// The caller-supplied deadline is enforced by `alpamon-timelimiter`
    /// rather than `reqwest`'s own per-request timeout, so every deadline in
    /// the agent (this one, the shell's command timeout) goes through the
    /// same enforcement path.
    pub async fn request(
        &self,
        method: ReqwestMethod,
        path_or_url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<HttpResponse, AgentError> {
        let url = self.resolve(path_or_url);
        let attempts = if Self::is_idempotent(&method) { 3 } else { 1 };
        let backoff = ExponentialBackoff::new(Duration::from_millis(200)).max_interval(Duration::from_secs(2));

        let mut last_err = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(backoff.next_interval(attempt - 1)).await;
            }
            let mut req = self
                .inner
                .request(method.clone(), &url)
                .header("Authorization", &self.auth_header);
            if let Some(body) = body {
                req = req.json(body);
            }

            let mut req = Some(req);
            let limiter = TimeLimiterLayer::<()>::builder().timeout_duration(timeout).build();
            let mut limited = limiter.layer(service_fn(move |_: ()| {
                req.take().expect("service called once").send()
            }));

            match limited.ready().await.unwrap().call(()).await {
                Ok(response) => return Ok(Self::into_http_response(response).await),
                Err(TimeLimiterError::Timeout) => return Err(AgentError::timeout("http", timeout)),
                Err(TimeLimiterError::Inner(e)) if e.is_connect() && attempt + 1 < attempts => {
                    last_err = Some(e);
                    continue;
                }
                Err(TimeLimiterError::Inner(e)) => return Err(AgentError::Transport(e.to_string())),
            }
        }

        Err(AgentError::Transport(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "exhausted transport retries".to_string()),
        ))
    }

    /// Fetches raw bytes from `path_or_url` with the same auth header and
    /// deadline discipline as [`AuthenticatedClient::request`], for the
    /// package-download step (the response isn't JSON, so it can't go
    /// through `request`).
    pub async fn download(&self, path_or_url: &str, timeout: Duration) -> Result<bytes::Bytes, AgentError> {
        let url = self.resolve(path_or_url);
        let req = self.inner.request(ReqwestMethod::GET, &url).header("Authorization", &self.auth_header);
        let mut req = Some(req);
        let limiter = TimeLimiterLayer::<()>::builder().timeout_duration(timeout).build();
        let mut limited = limiter.layer(service_fn(move |_: ()| req.take().expect("service called once").send()));

        match limited.ready().await.unwrap().call(()).await {
            Ok(response) => response.bytes().await.map_err(|e| AgentError::Transport(e.to_string())),
            Err(TimeLimiterError::Timeout) => Err(AgentError::timeout("http", timeout)),
            Err(TimeLimiterError::Inner(e)) => Err(AgentError::Transport(e.to_string())),
        }
    }

    async fn into_http_response(response: reqwest::Response) -> HttpResponse {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        HttpResponse { status, headers, body }
    }
}

/// Shared handle to the client, passed to every component that needs to
/// talk to the control plane (the reporter pool, the control channel, the
/// startup probe).
pub type SharedClient = Arc<AuthenticatedClient>;
