//! Implementation of the `#[rest_client]` attribute macro.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemTrait, Result, parse2};

use refit_gen::codegen::{generate_service, service_trait};
use refit_gen::extract::{ServiceAttr, extract_service};

/// Main implementation for the `#[rest_client]` attribute macro.
///
/// On failure the trait is still emitted (without markers) next to the
/// compile error, so uses of the trait elsewhere do not cascade.
pub fn rest_client_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item: ItemTrait = match parse2(item) {
        Ok(item) => item,
        Err(err) => return err.to_compile_error(),
    };

    match rest_client_inner(attr, &item) {
        Ok(tokens) => tokens,
        Err(err) => {
            let error = err.to_compile_error();
            let service = service_trait(&item);
            quote! {
                #error
                #service
            }
        }
    }
}

fn rest_client_inner(attr: TokenStream, item: &ItemTrait) -> Result<TokenStream> {
    let attr = ServiceAttr::parse(attr)?;
    let desc = extract_service(item, attr)?;
    Ok(generate_service(item, &desc))
}
