//! HTTP verbs supported by service endpoints.

use strum::Display;

/// HTTP method of a generated endpoint.
///
/// ## Examples
///
/// ```rust
/// use refit::RestMethod;
///
/// assert_eq!(RestMethod::Post.to_string(), "POST");
/// assert_eq!(reqwest::Method::from(RestMethod::Post), reqwest::Method::POST);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum RestMethod {
    /// HTTP GET - Retrieve a resource.
    Get,
    /// HTTP POST - Create a resource or trigger an action.
    Post,
    /// HTTP PUT - Replace a resource entirely.
    Put,
    /// HTTP DELETE - Remove a resource.
    Delete,
}

impl From<RestMethod> for reqwest::Method {
    fn from(method: RestMethod) -> Self {
        match method {
            RestMethod::Get => Self::GET,
            RestMethod::Post => Self::POST,
            RestMethod::Put => Self::PUT,
            RestMethod::Delete => Self::DELETE,
        }
    }
}
