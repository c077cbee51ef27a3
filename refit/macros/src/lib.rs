//! The `#[rest_client]` attribute macro.
//!
//! Applied to a trait, it generates a `<Trait>GeneratedClient` implementing
//! the trait over HTTP and registers it with the refit client registry.
//! Use it through the `refit` crate, which re-exports it.
//!
//! ## Examples
//!
//! ```ignore
//! #[refit::rest_client(base_url = "https://localhost:5000")]
//! pub trait TestService {
//!     #[get("/api/values/{id}")]
//!     async fn get_value_by_id(&self, id: i32) -> refit::Result<String>;
//!
//!     #[post("/api/values")]
//!     async fn create_value(&self, #[body] value: String) -> refit::Result<String>;
//! }
//! ```

use proc_macro::TokenStream;

mod rest_client;

/// Turns an annotated trait into a REST client.
///
/// ## Attributes
///
/// On the trait:
/// - `#[rest_client]` or `#[rest_client(base_url = "...")]`
///
/// On each endpoint method:
/// - `#[get("/path")]`, `#[post(..)]`, `#[put(..)]`, `#[delete(..)]`
///
/// On parameters:
/// - `#[query]` - appended to the query string
/// - `#[body]` - serialized as the JSON body
///
/// Parameters named after a `{placeholder}` fill the path; a single
/// unmarked remaining parameter becomes the body; `CancellationToken`
/// parameters cancel the in-flight request.
#[proc_macro_attribute]
pub fn rest_client(attr: TokenStream, item: TokenStream) -> TokenStream {
    rest_client::rest_client_impl(attr.into(), item.into()).into()
}
