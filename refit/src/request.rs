//! Request primitives used by generated clients.

use std::borrow::Borrow;
use std::fmt::Display;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::ClientError;
use crate::method::RestMethod;

/// Characters left as-is inside a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes a value substituted into a path placeholder.
///
/// ## Examples
///
/// ```rust
/// assert_eq!(refit::encode_path_value(7), "7");
/// assert_eq!(refit::encode_path_value("a b/c"), "a%20b%2Fc");
/// ```
pub fn encode_path_value(value: impl Display) -> String {
    utf8_percent_encode(&value.to_string(), PATH_SEGMENT).to_string()
}

/// A request under construction: verb, path relative to the base address,
/// ordered query pairs, optional JSON body and optional cancellation token.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub(crate) method: RestMethod,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl RestRequest {
    pub fn new(method: RestMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            cancel: None,
        }
    }

    pub fn method(&self) -> RestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query pairs in the order they were added.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Appends a query pair. Encoding happens when the URL is built.
    pub fn query(&mut self, name: &str, value: impl Display) -> &mut Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Serializes `body` as the JSON request body.
    ///
    /// ## Errors
    ///
    /// Returns [`ClientError::Serialize`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<&mut Self, ClientError> {
        self.body = Some(serde_json::to_vec(body).map_err(ClientError::Serialize)?);
        Ok(self)
    }

    /// Attaches a cancellation token; the request is abandoned when it fires.
    pub fn cancel_on(&mut self, token: impl Borrow<CancellationToken>) -> &mut Self {
        self.cancel = Some(token.borrow().clone());
        self
    }

    /// Builds the absolute URL: base address, then the path with its leading
    /// `/` dropped so that a base path prefix is kept, then the query string.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use refit::{RestMethod, RestRequest};
    /// use url::Url;
    ///
    /// let base = Url::parse("https://localhost:5000/v1/").unwrap();
    /// let mut request = RestRequest::new(RestMethod::Get, "/api/values");
    /// request.query("a", 1).query("b", 2);
    ///
    /// let url = request.url(&base).unwrap();
    /// assert_eq!(url.as_str(), "https://localhost:5000/v1/api/values?a=1&b=2");
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the result is not a valid URL.
    pub fn url(&self, base: &Url) -> Result<Url, ClientError> {
        let mut joined = base.as_str().to_string();
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(self.path.trim_start_matches('/'));

        let mut url = Url::parse(&joined).map_err(|e| ClientError::InvalidUrl(format!("{joined}: {e}")))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }
}
