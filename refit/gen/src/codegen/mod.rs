//! Token generators for service clients.
//!
//! - [`client`] - the `<Trait>GeneratedClient` struct and its trait impl
//! - [`registration`] - the `ServiceContract` impl and `inventory` registration
//!
//! [`generate_service`] assembles everything a `#[rest_client]` expansion
//! needs into one token stream.

pub mod client;
pub mod registration;

use proc_macro2::TokenStream;
use quote::quote;
use syn::ItemTrait;

pub use client::{generate_client, service_trait};
pub use registration::{generate_contract, generate_registration};

use crate::model::ServiceDescriptor;

/// Cleaned trait, contract, client and registration for one service.
pub fn generate_service(item: &ItemTrait, desc: &ServiceDescriptor) -> TokenStream {
    let service = service_trait(item);
    let contract = generate_contract(desc);
    let client = generate_client(desc);
    let registration = generate_registration(desc);

    quote! {
        #service

        #contract

        #client

        #registration
    }
}
