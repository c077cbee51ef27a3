//! Client stub generation.
//!
//! For a service `Foo` this emits `FooGeneratedClient`, a struct holding a
//! `refit::RestTransport`, and an implementation of `Foo` whose methods
//! build, dispatch and decode one request each.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemTrait, TypeParamBound, parse_quote};

use crate::extract::strip_markers;
use crate::model::{EndpointDescriptor, ParamRole, ServiceDescriptor};
use crate::parser::Segment;

/// Generates the client struct and its trait implementation.
///
/// ## Examples
///
/// For `#[get("/api/values/{id}")] async fn get_value(&self, id: i32) -> refit::Result<String>`:
/// ```ignore
/// async fn get_value(&self, id: i32) -> refit::Result<String> {
///     let __refit_path = ::std::format!("/api/values/{}", ::refit::encode_path_value(&id));
///     let mut __refit_request = ::refit::RestRequest::new(::refit::RestMethod::Get, __refit_path);
///     let __refit_response = self.transport.send(__refit_request).await?;
///     ::std::result::Result::Ok(__refit_response.json()?)
/// }
/// ```
pub fn generate_client(desc: &ServiceDescriptor) -> TokenStream {
    let service = &desc.ident;
    let client = desc.client_ident();
    let vis = &desc.vis;
    let doc = format!(" Generated REST client for [`{service}`].");
    let methods = desc.endpoints.iter().map(generate_method);

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone)]
        #vis struct #client {
            transport: ::refit::RestTransport,
        }

        impl #client {
            /// Creates a client dispatching through `transport`.
            #vis fn new(transport: ::refit::RestTransport) -> Self {
                Self { transport }
            }

            /// The transport this client dispatches through.
            #vis fn transport(&self) -> &::refit::RestTransport {
                &self.transport
            }
        }

        #[::refit::async_trait]
        impl #service for #client {
            #(#methods)*
        }
    }
}

/// Re-emits the declaring trait without markers, ready for dynamic dispatch.
///
/// `Send + Sync` are added as supertraits when missing so that resolved
/// clients can be shared across tasks.
pub fn service_trait(item: &ItemTrait) -> TokenStream {
    let mut item = strip_markers(item);
    item.attrs.push(parse_quote!(#[::refit::async_trait]));

    let bounds: [(&str, TypeParamBound); 2] = [
        ("Send", parse_quote!(::core::marker::Send)),
        ("Sync", parse_quote!(::core::marker::Sync)),
    ];
    for (name, bound) in bounds {
        if !has_supertrait(&item, name) {
            item.supertraits.push(bound);
        }
    }
    if item.colon_token.is_none() && !item.supertraits.is_empty() {
        item.colon_token = Some(Default::default());
    }

    quote!(#item)
}

fn has_supertrait(item: &ItemTrait, name: &str) -> bool {
    item.supertraits.iter().any(|bound| match bound {
        TypeParamBound::Trait(bound) => bound
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == name),
        _ => false,
    })
}

fn generate_method(endpoint: &EndpointDescriptor) -> TokenStream {
    let signature = &endpoint.signature;
    let path = build_path(endpoint);
    let variant = endpoint.verb.runtime_variant();

    let query = endpoint.params_with_role(ParamRole::Query).map(|param| {
        let ident = &param.ident;
        let key = ident.to_string();
        if param.optional {
            quote! {
                if let ::std::option::Option::Some(__refit_value) = &#ident {
                    __refit_request.query(#key, __refit_value);
                }
            }
        } else {
            quote! { __refit_request.query(#key, &#ident); }
        }
    });

    let body = endpoint.body().map(|param| {
        let ident = &param.ident;
        quote! { __refit_request.json(&#ident)?; }
    });

    let cancel = endpoint.params_with_role(ParamRole::Passthrough).map(|param| {
        let ident = &param.ident;
        quote! { __refit_request.cancel_on(#ident); }
    });

    let dispatch = if endpoint.returns.is_async() {
        quote! { self.transport.send(__refit_request).await? }
    } else {
        quote! { self.transport.send_blocking(__refit_request)? }
    };

    let finish = if endpoint.returns.is_void() {
        quote! {
            #dispatch;
            ::std::result::Result::Ok(())
        }
    } else {
        quote! {
            let __refit_response = #dispatch;
            ::std::result::Result::Ok(__refit_response.json()?)
        }
    };

    quote! {
        #signature {
            let __refit_path = #path;
            #[allow(unused_mut)]
            let mut __refit_request = ::refit::RestRequest::new(::refit::RestMethod::#variant, __refit_path);
            #(#query)*
            #body
            #(#cancel)*
            #finish
        }
    }
}

/// Builds the expression producing the request path.
fn build_path(endpoint: &EndpointDescriptor) -> TokenStream {
    let template = &endpoint.path;
    if template.placeholders().next().is_none() {
        let raw = template.as_str();
        return quote! { ::std::string::String::from(#raw) };
    }

    let format = template.format_string();
    let args = template.segments().iter().filter_map(|segment| match segment {
        Segment::Placeholder(name) => {
            let ident = endpoint
                .path_param(name)
                .map(|p| p.ident.clone())
                .unwrap_or_else(|| format_ident!("{}", name));
            Some(quote! { ::refit::encode_path_value(&#ident) })
        }
        Segment::Literal(_) => None,
    });

    quote! { ::std::format!(#format, #(#args),*) }
}
