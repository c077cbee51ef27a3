//! HTTP transport handed to every generated client.
//!
//! A [`RestTransport`] is bound to one normalized base address and owns the
//! HTTP clients used to dispatch requests: an async `reqwest::Client`, and a
//! `reqwest::blocking::Client` built on first blocking call.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{Span, instrument};
use url::Url;

use crate::error::ClientError;
use crate::method::RestMethod;
use crate::request::RestRequest;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings applied to every transport a registry builds.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    timeout: Duration,
    default_headers: HeaderMap,
    user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_headers: HeaderMap::new(),
            user_agent: None,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request.
    ///
    /// ## Errors
    ///
    /// Returns [`ClientError::InvalidHeader`] if the name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, ClientError> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ClientError::InvalidHeader(format!("invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ClientError::InvalidHeader(format!("invalid header value: {e}")))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct RestResponse {
    status: u16,
    url: Url,
    body: Vec<u8>,
}

impl RestResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// ## Errors
    ///
    /// Returns [`ClientError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|source| ClientError::Decode {
            url: self.url.to_string(),
            source,
        })
    }
}

/// Per-client HTTP handle bound to a base address.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    base_url: Url,
    config: TransportConfig,
}

impl RestTransport {
    /// Creates a transport for `base_url`.
    ///
    /// The URL is used as given; normalization happens in the registry.
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: Url, config: &TransportConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.default_headers.clone())
            .pool_max_idle_per_host(10);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Self {
            client: builder.build()?,
            blocking: OnceLock::new(),
            base_url,
            config: config.clone(),
        })
    }

    /// Returns the base URL for this transport.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Dispatches a request and reads the full response.
    ///
    /// If the request carries a cancellation token, the exchange is
    /// abandoned as soon as it fires.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The request fails (network, timeout, etc.)
    /// - The server returns a non-success status code
    /// - The cancellation token fires first
    #[instrument(
        name = "refit_request",
        skip(self, request),
        fields(
            http.method = %request.method(),
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
            otel.status_code = tracing::field::Empty,
        )
    )]
    pub async fn send(&self, request: RestRequest) -> Result<RestResponse, ClientError> {
        let url = request.url(&self.base_url)?;
        Span::current().record("http.url", url.as_str());

        let cancel = request.cancel;
        let exchange = self.exchange(request.method, url, request.body);

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ClientError::Cancelled),
                result = exchange => result,
            },
            None => exchange.await,
        }
    }

    async fn exchange(
        &self,
        method: RestMethod,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<RestResponse, ClientError> {
        let mut request = self.client.request(method.into(), url.clone());
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        record_status(status);

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(remote_failure(status, &url, message));
        }

        let body = response.bytes().await?.to_vec();
        Ok(RestResponse {
            status: status.as_u16(),
            url,
            body,
        })
    }

    /// Blocking counterpart of [`RestTransport::send`].
    ///
    /// Must not be called from within an async runtime. A token that has
    /// already fired aborts the call before anything is sent.
    ///
    /// ## Errors
    ///
    /// As [`RestTransport::send`].
    #[instrument(
        name = "refit_request",
        skip(self, request),
        fields(
            http.method = %request.method(),
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
            otel.status_code = tracing::field::Empty,
        )
    )]
    pub fn send_blocking(&self, request: RestRequest) -> Result<RestResponse, ClientError> {
        let url = request.url(&self.base_url)?;
        Span::current().record("http.url", url.as_str());

        if request.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ClientError::Cancelled);
        }

        let mut builder = self
            .blocking_client()?
            .request(request.method.into(), url.clone());
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder.send()?;
        let status = response.status();
        record_status(status);

        if !status.is_success() {
            let message = response.text().unwrap_or_else(|_| status.to_string());
            return Err(remote_failure(status, &url, message));
        }

        let body = response.bytes()?.to_vec();
        Ok(RestResponse {
            status: status.as_u16(),
            url,
            body,
        })
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client, ClientError> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }

        let mut builder = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .default_headers(self.config.default_headers.clone());
        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build()?;
        Ok(self.blocking.get_or_init(|| client))
    }
}

fn record_status(status: StatusCode) {
    let span = Span::current();
    span.record("http.status_code", status.as_u16());
    let otel_status = if status.is_success() {
        "OK"
    } else if status.is_server_error() {
        "ERROR"
    } else {
        "UNSET"
    };
    span.record("otel.status_code", otel_status);
}

fn remote_failure(status: StatusCode, url: &Url, message: String) -> ClientError {
    ClientError::RemoteCallFailure {
        status: status.as_u16(),
        url: url.to_string(),
        message,
    }
}
