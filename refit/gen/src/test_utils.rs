//! Shared test helpers for refit-gen unit tests.

use proc_macro2::TokenStream;
use syn::ItemTrait;

use crate::extract::{ServiceAttr, extract_service};
use crate::model::ServiceDescriptor;

/// Parses a trait and extracts its descriptor, panicking on failure.
pub fn make_service(tokens: TokenStream) -> ServiceDescriptor {
    let item: ItemTrait = syn::parse2(tokens).expect("test input must be a trait");
    extract_service(&item, ServiceAttr::default()).expect("test trait must extract")
}

/// Pretty-prints generated tokens, panicking if they are not valid items.
pub fn format_generated(tokens: &TokenStream) -> String {
    let file: syn::File = syn::parse2(tokens.clone()).expect("generated code must parse");
    prettyplease::unparse(&file)
}
