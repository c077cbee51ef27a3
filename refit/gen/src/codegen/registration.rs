//! Service contract and registration emission.
//!
//! Every service gets an `impl refit::ServiceContract for dyn Service` that
//! carries its identity and shape, and an `inventory` submission that
//! registers a factory for its generated client when the process loads.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::model::ServiceDescriptor;

/// Generates the `ServiceContract` impl for `dyn Service`.
///
/// The identity name is the declaring module path joined with the trait
/// name, resolved where the generated code is expanded.
pub fn generate_contract(desc: &ServiceDescriptor) -> TokenStream {
    let service = &desc.ident;
    let name = desc.name();
    let public = desc.is_public();
    let default_base_url = match &desc.base_url {
        Some(url) => quote! { ::core::option::Option::Some(#url) },
        None => quote! { ::core::option::Option::None },
    };

    quote! {
        impl ::refit::ServiceContract for dyn #service {
            const NAME: &'static str = ::core::concat!(::core::module_path!(), "::", #name);
            const SHAPE: ::refit::ServiceShape = ::refit::ServiceShape {
                interface: true,
                public: #public,
                generic: false,
            };
            const DEFAULT_BASE_URL: ::core::option::Option<&'static str> = #default_base_url;
        }
    }
}

/// Generates the hidden key/factory functions and their `inventory` submission.
pub fn generate_registration(desc: &ServiceDescriptor) -> TokenStream {
    let service = &desc.ident;
    let client = desc.client_ident();
    let key_fn = format_ident!("__refit_service_key_{}", service);
    let factory_fn = format_ident!("__refit_factory_{}", service);

    quote! {
        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #key_fn() -> ::refit::ServiceKey {
            ::refit::ServiceKey::of::<dyn #service>()
        }

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #factory_fn(transport: ::refit::RestTransport) -> ::std::boxed::Box<dyn ::core::any::Any> {
            let client: ::std::boxed::Box<dyn #service> = ::std::boxed::Box::new(#client::new(transport));
            ::refit::ClientRegistration::erase(client)
        }

        ::refit::inventory::submit! {
            ::refit::ClientRegistration::new(#key_fn, #factory_fn)
        }
    }
}
