//! Generation pipeline for refit REST clients.
//!
//! This crate turns a trait annotated with `#[rest_client]` and verb markers
//! into a generated client implementation and a registration entry. It is
//! used in two ways:
//!
//! - at compile time by `refit-macros`, which expands `#[rest_client]`
//! - by the `refit-gen` binary, which writes generated units to disk
//!
//! ## Modules
//!
//! - [`extract`] - Declaration extraction into a [`model::ServiceDescriptor`]
//! - [`model`] - Normalized service/endpoint/parameter descriptors
//! - [`parser`] - `{name}` path template parsing
//! - [`emit`] - Indentation-aware source text buffer
//! - [`codegen`] - Client and registration token generators
//! - [`output`] - Unit assembly, validation and atomic file writing
//! - [`errors`] - Error types for the generator
//!
//! ## Example Usage
//!
//! ```
//! use refit_gen::extract::extract_marked;
//! use refit_gen::codegen::generate_service;
//!
//! let item: syn::ItemTrait = syn::parse_quote! {
//!     #[rest_client]
//!     pub trait TestService {
//!         #[get("/api/values/{id}")]
//!         async fn get_value_by_id(&self, id: i32) -> refit::Result<String>;
//!     }
//! };
//!
//! let desc = extract_marked(&item).unwrap().unwrap();
//! assert_eq!(desc.client_ident().to_string(), "TestServiceGeneratedClient");
//!
//! let tokens = generate_service(&item, &desc);
//! assert!(!tokens.is_empty());
//! ```

pub mod codegen;
pub mod emit;
pub mod errors;
pub mod extract;
pub mod model;
pub mod output;
pub mod parser;

#[cfg(test)]
mod test_utils;
