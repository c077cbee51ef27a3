//! Declaration extraction: annotated trait → [`ServiceDescriptor`].
//!
//! The marker vocabulary is:
//!
//! - `#[rest_client]` / `#[rest_client(base_url = "...")]` on the trait
//! - `#[get("/path")]`, `#[post(..)]`, `#[put(..)]`, `#[delete(..)]` on methods
//! - `#[query]` and `#[body]` on parameters
//!
//! Parameters typed as `CancellationToken` are passed through to the
//! transport. Extraction is pure; it only reads the syntax tree.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use proc_macro2::TokenStream;
use syn::{
    Attribute, Error, FnArg, GenericArgument, Ident, Item, ItemTrait, LitStr, Meta, Pat,
    PathArguments, Result, ReturnType, Signature, TraitItem, TraitItemFn, Type, TypePath,
    TypeReference,
};

use crate::errors::GeneratorError;
use crate::model::{
    CallConvention, EndpointDescriptor, HttpVerb, ParamRole, ParameterDescriptor, ReturnShape,
    ServiceDescriptor,
};
use crate::parser::PathTemplate;

/// Prefix reserved for locals in generated method bodies.
pub const RESERVED_PREFIX: &str = "__refit";

/// Arguments of the `#[rest_client(...)]` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAttr {
    pub base_url: Option<String>,
}

impl ServiceAttr {
    /// Parses the marker's argument tokens (the part inside the parentheses).
    pub fn parse(tokens: TokenStream) -> Result<Self> {
        let mut attr = Self::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("base_url") {
                let value: LitStr = meta.value()?.parse()?;
                attr.base_url = Some(value.value());
                Ok(())
            } else {
                Err(meta.error(format!(
                    "unknown rest_client attribute: `{}`. Expected `base_url`",
                    meta.path
                        .get_ident()
                        .map(|i| i.to_string())
                        .unwrap_or_default()
                )))
            }
        });
        syn::parse::Parser::parse2(parser, tokens)?;
        Ok(attr)
    }

    /// Reads the arguments from a marker attribute found in source.
    pub fn from_attr(attr: &Attribute) -> Result<Self> {
        match &attr.meta {
            Meta::Path(_) => Ok(Self::default()),
            Meta::List(list) => Self::parse(list.tokens.clone()),
            Meta::NameValue(nv) => Err(Error::new_spanned(
                nv,
                "expected #[rest_client] or #[rest_client(base_url = \"...\")]",
            )),
        }
    }
}

/// Returns `true` if the attribute is the `rest_client` service marker.
pub fn is_rest_client_marker(attr: &Attribute) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|segment| segment.ident == "rest_client")
}

/// Extracts a descriptor from a trait carrying the `rest_client` marker.
///
/// Returns `Ok(None)` when the marker is absent.
pub fn extract_marked(item: &ItemTrait) -> Result<Option<ServiceDescriptor>> {
    let Some(marker) = item.attrs.iter().find(|a| is_rest_client_marker(a)) else {
        return Ok(None);
    };
    let attr = ServiceAttr::from_attr(marker)?;
    extract_service(item, attr).map(Some)
}

/// Extracts a descriptor from a trait already confirmed to be a service.
///
/// Methods without a verb marker are recorded as skipped.
///
/// ## Errors
///
/// Fails for generic traits and for any endpoint whose parameters or
/// return type cannot be mapped onto a request.
pub fn extract_service(item: &ItemTrait, attr: ServiceAttr) -> Result<ServiceDescriptor> {
    if !item.generics.params.is_empty() || item.generics.where_clause.is_some() {
        return Err(Error::new_spanned(
            &item.generics,
            "rest_client traits cannot be generic",
        ));
    }

    let mut endpoints = Vec::new();
    let mut skipped = Vec::new();

    for trait_item in &item.items {
        let TraitItem::Fn(method) = trait_item else {
            continue;
        };
        match verb_marker(&method.attrs)? {
            Some((verb, path, marker)) => {
                endpoints.push(extract_endpoint(method, verb, &path, marker)?);
            }
            None => skipped.push(method.sig.ident.clone()),
        }
    }

    Ok(ServiceDescriptor {
        ident: item.ident.clone(),
        vis: item.vis.clone(),
        base_url: attr.base_url,
        endpoints,
        skipped,
    })
}

/// Advisory cancellation signal shared with the caller.
pub type CancelFlag = Arc<AtomicBool>;

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub cancel: Option<CancelFlag>,
}

impl ExtractOptions {
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// A marked trait found in a source file, with its extraction outcome.
#[derive(Debug, Clone)]
pub struct ExtractedService {
    /// Inline modules enclosing the trait, outermost first.
    pub modules: Vec<Ident>,
    pub item: ItemTrait,
    pub result: Result<ServiceDescriptor>,
}

impl ExtractedService {
    pub fn name(&self) -> String {
        self.item.ident.to_string()
    }
}

/// Extracts every `#[rest_client]` trait in a file, descending into inline modules.
///
/// A trait that fails extraction is still returned so the caller can
/// report it; the others are unaffected.
///
/// ## Errors
///
/// Returns [`GeneratorError::Cancelled`] if the cancellation flag is raised.
/// No partial results are returned in that case.
pub fn extract_file(
    file: &syn::File,
    options: &ExtractOptions,
) -> std::result::Result<Vec<ExtractedService>, GeneratorError> {
    let mut found = Vec::new();
    collect_services(&file.items, &mut Vec::new(), options, &mut found)?;
    Ok(found)
}

fn collect_services(
    items: &[Item],
    modules: &mut Vec<Ident>,
    options: &ExtractOptions,
    found: &mut Vec<ExtractedService>,
) -> std::result::Result<(), GeneratorError> {
    for item in items {
        if options.is_cancelled() {
            return Err(GeneratorError::Cancelled);
        }
        match item {
            Item::Trait(item) => {
                let Some(marker) = item.attrs.iter().find(|a| is_rest_client_marker(a)) else {
                    continue;
                };
                let result = ServiceAttr::from_attr(marker)
                    .and_then(|attr| extract_service(item, attr));
                found.push(ExtractedService {
                    modules: modules.clone(),
                    item: item.clone(),
                    result,
                });
            }
            Item::Mod(module) => {
                if let Some((_, nested)) = &module.content {
                    modules.push(module.ident.clone());
                    collect_services(nested, modules, options, found)?;
                    modules.pop();
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Returns a copy of the trait with every marker attribute removed.
pub fn strip_markers(item: &ItemTrait) -> ItemTrait {
    let mut item = item.clone();
    item.attrs.retain(|a| !is_rest_client_marker(a));
    for trait_item in &mut item.items {
        if let TraitItem::Fn(method) = trait_item {
            method.attrs.retain(|a| !is_verb_marker(a));
            strip_param_markers(&mut method.sig);
        }
    }
    item
}

fn is_verb_marker(attr: &Attribute) -> bool {
    attr.path()
        .get_ident()
        .is_some_and(|ident| HttpVerb::from_marker(&ident.to_string()).is_some())
}

fn is_param_marker(attr: &Attribute) -> bool {
    attr.path().is_ident("query") || attr.path().is_ident("body")
}

fn strip_param_markers(sig: &mut Signature) {
    for input in sig.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = input {
            pat_type.attrs.retain(|a| !is_param_marker(a));
        }
    }
}

/// Finds the verb marker on a method: `(verb, path, attribute)`.
fn verb_marker(attrs: &[Attribute]) -> Result<Option<(HttpVerb, String, &Attribute)>> {
    let mut found: Option<(HttpVerb, String, &Attribute)> = None;

    for attr in attrs.iter().filter(|a| is_verb_marker(a)) {
        if found.is_some() {
            return Err(Error::new_spanned(
                attr,
                "an endpoint method takes exactly one verb marker",
            ));
        }
        let name = attr
            .path()
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default();
        let Some(verb) = HttpVerb::from_marker(&name) else {
            continue;
        };
        let path = match &attr.meta {
            Meta::Path(_) => String::new(),
            Meta::List(_) => attr.parse_args::<LitStr>()?.value(),
            Meta::NameValue(nv) => {
                return Err(Error::new_spanned(
                    nv,
                    format!("expected #[{name}(\"/path\")]"),
                ));
            }
        };
        found = Some((verb, path, attr));
    }

    Ok(found)
}

fn param_marker(attrs: &[Attribute]) -> Result<Option<ParamRole>> {
    let mut role = None;
    for attr in attrs.iter().filter(|a| is_param_marker(a)) {
        if !matches!(attr.meta, Meta::Path(_)) {
            return Err(Error::new_spanned(attr, "#[query] and #[body] take no arguments"));
        }
        if role.is_some() {
            return Err(Error::new_spanned(
                attr,
                "a parameter is either #[query] or #[body], not both",
            ));
        }
        role = Some(if attr.path().is_ident("body") {
            ParamRole::Body
        } else {
            ParamRole::Query
        });
    }
    Ok(role)
}

fn extract_endpoint(
    method: &TraitItemFn,
    verb: HttpVerb,
    path: &str,
    marker: &Attribute,
) -> Result<EndpointDescriptor> {
    let sig = &method.sig;

    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(Error::new_spanned(
                sig,
                "endpoint methods must take `&self`",
            ));
        }
    }

    let returns = return_shape(sig)?;
    let path = PathTemplate::parse(path);

    let mut params = Vec::new();
    let mut explicit_body: Option<usize> = None;
    let mut candidates: Vec<usize> = Vec::new();

    for arg in &sig.inputs {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return Err(Error::new_spanned(
                &pat_type.pat,
                "endpoint parameters must be plain identifiers",
            ));
        };
        let ident = pat_ident.ident.clone();
        if ident.to_string().starts_with(RESERVED_PREFIX) {
            return Err(Error::new_spanned(
                &ident,
                format!("parameter names starting with `{RESERVED_PREFIX}` are reserved"),
            ));
        }

        let is_token = is_cancellation_token(&pat_type.ty);
        let role = match param_marker(&pat_type.attrs)? {
            Some(_) if is_token => {
                return Err(Error::new_spanned(
                    pat_type,
                    "cancellation tokens are passed through and cannot be #[query] or #[body]",
                ));
            }
            Some(ParamRole::Body) => {
                if explicit_body.is_some() {
                    return Err(Error::new_spanned(
                        pat_type,
                        "only one parameter may be marked #[body]",
                    ));
                }
                explicit_body = Some(params.len());
                ParamRole::Body
            }
            Some(role) => role,
            None if is_token => ParamRole::Passthrough,
            None if path.has_placeholder(&ident.to_string()) => ParamRole::PathSubstitution,
            None => {
                candidates.push(params.len());
                ParamRole::Body
            }
        };

        params.push(ParameterDescriptor {
            ident,
            optional: is_option(&pat_type.ty),
            ty: (*pat_type.ty).clone(),
            role,
        });
    }

    match (explicit_body, candidates.as_slice()) {
        (Some(_), [unbound, ..]) => {
            let param = &params[*unbound].ident;
            return Err(Error::new_spanned(
                param,
                format!(
                    "parameter `{param}` is not bound to the request; mark it #[query] or use it in the path"
                ),
            ));
        }
        (None, [first, second, ..]) => {
            let (first, second) = (&params[*first].ident, &params[*second].ident);
            return Err(Error::new_spanned(
                second,
                format!(
                    "ambiguous request body: both `{first}` and `{second}` could be the body; mark one #[body] and the others #[query]"
                ),
            ));
        }
        _ => {}
    }

    for placeholder in path.placeholders() {
        let bound = params
            .iter()
            .any(|p| p.role == ParamRole::PathSubstitution && p.ident == placeholder);
        if !bound {
            return Err(Error::new_spanned(
                marker,
                format!("path placeholder `{{{placeholder}}}` has no matching parameter"),
            ));
        }
    }

    let mut signature = sig.clone();
    strip_param_markers(&mut signature);

    Ok(EndpointDescriptor {
        ident: sig.ident.clone(),
        verb,
        path,
        params,
        returns,
        signature,
    })
}

/// Classifies the return type structurally: `async fn` suspends, anything
/// else blocks; the declared type must be `Result<T, E>`.
fn return_shape(sig: &Signature) -> Result<ReturnShape> {
    let call = if sig.asyncness.is_some() {
        CallConvention::Async
    } else {
        CallConvention::Blocking
    };

    let ReturnType::Type(_, ty) = &sig.output else {
        return Err(Error::new_spanned(
            sig,
            "endpoint methods must return Result<T, E>",
        ));
    };
    let value = result_value_type(ty).ok_or_else(|| {
        Error::new_spanned(ty, "endpoint methods must return Result<T, E>")
    })?;

    Ok(ReturnShape {
        call,
        value: (!is_unit(value)).then(|| value.clone()),
    })
}

fn last_segment_args<'a>(ty: &'a Type, name: &str) -> Option<&'a PathArguments> {
    if let Type::Path(TypePath { qself: None, path }) = ty
        && let Some(segment) = path.segments.last()
        && segment.ident == name
    {
        return Some(&segment.arguments);
    }
    None
}

fn result_value_type(ty: &Type) -> Option<&Type> {
    if let Some(PathArguments::AngleBracketed(args)) = last_segment_args(ty, "Result")
        && let Some(GenericArgument::Type(value)) = args.args.first()
    {
        return Some(value);
    }
    None
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

fn is_option(ty: &Type) -> bool {
    matches!(
        last_segment_args(ty, "Option"),
        Some(PathArguments::AngleBracketed(_))
    )
}

fn is_cancellation_token(ty: &Type) -> bool {
    let ty = match ty {
        Type::Reference(TypeReference { elem, .. }) => elem.as_ref(),
        other => other,
    };
    last_segment_args(ty, "CancellationToken").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;
    use syn::parse_quote;

    fn extract(item: ItemTrait) -> Result<ServiceDescriptor> {
        extract_service(&item, ServiceAttr::default())
    }

    fn roles(endpoint: &EndpointDescriptor) -> Vec<(String, ParamRole)> {
        endpoint
            .params
            .iter()
            .map(|p| (p.ident.to_string(), p.role))
            .collect()
    }

    #[test]
    fn service_attr_reads_base_url() {
        let attr = ServiceAttr::parse(quote! { base_url = "https://localhost:5000" }).unwrap();
        assert_eq!(attr.base_url.as_deref(), Some("https://localhost:5000"));
        assert_eq!(ServiceAttr::parse(quote! {}).unwrap(), ServiceAttr::default());
    }

    #[test]
    fn service_attr_rejects_unknown_keys() {
        let err = ServiceAttr::parse(quote! { base = "x" }).unwrap_err();
        assert!(err.to_string().contains("unknown rest_client attribute"));
    }

    #[test]
    fn unmarked_trait_yields_none() {
        let item: ItemTrait = parse_quote! {
            pub trait Plain {
                #[get("/x")]
                fn x(&self) -> Result<(), Error>;
            }
        };
        assert!(extract_marked(&item).unwrap().is_none());
    }

    #[test]
    fn marked_trait_with_path_qualified_marker() {
        let item: ItemTrait = parse_quote! {
            #[refit::rest_client(base_url = "https://api.test")]
            pub trait Values {
                #[get("/api/values")]
                async fn list(&self) -> Result<Vec<String>, RefitError>;
            }
        };
        let desc = extract_marked(&item).unwrap().unwrap();
        assert_eq!(desc.name(), "Values");
        assert_eq!(desc.base_url.as_deref(), Some("https://api.test"));
        assert_eq!(desc.endpoints.len(), 1);
        assert!(desc.is_public());
    }

    #[test]
    fn methods_without_verb_are_skipped() {
        let desc = extract(parse_quote! {
            pub trait Values {
                #[get("/api/values")]
                async fn list(&self) -> Result<Vec<String>, RefitError>;

                fn helper(&self) -> u32 { 1 }
            }
        })
        .unwrap();
        assert_eq!(desc.endpoints.len(), 1);
        assert_eq!(desc.skipped.len(), 1);
        assert_eq!(desc.skipped[0], "helper");
    }

    #[test]
    fn verb_without_argument_defaults_to_empty_path() {
        let desc = extract(parse_quote! {
            trait Root {
                #[delete]
                async fn clear(&self) -> Result<(), RefitError>;
            }
        })
        .unwrap();
        let endpoint = &desc.endpoints[0];
        assert_eq!(endpoint.verb, HttpVerb::Delete);
        assert_eq!(endpoint.path.as_str(), "");
        assert!(endpoint.returns.is_void());
    }

    #[test]
    fn body_tie_break_skips_path_and_token() {
        let desc = extract(parse_quote! {
            trait Values {
                #[put("/api/values/{id}")]
                async fn update(&self, id: i32, payload: String, token: CancellationToken) -> Result<String, RefitError>;
            }
        })
        .unwrap();
        assert_eq!(
            roles(&desc.endpoints[0]),
            vec![
                ("id".to_string(), ParamRole::PathSubstitution),
                ("payload".to_string(), ParamRole::Body),
                ("token".to_string(), ParamRole::Passthrough),
            ]
        );
    }

    #[test]
    fn reference_token_is_passthrough() {
        let desc = extract(parse_quote! {
            trait Values {
                #[get("/api/values")]
                async fn list(&self, token: &tokio_util::sync::CancellationToken) -> Result<String, RefitError>;
            }
        })
        .unwrap();
        assert_eq!(desc.endpoints[0].params[0].role, ParamRole::Passthrough);
        assert!(desc.endpoints[0].body().is_none());
    }

    #[test]
    fn explicit_markers_are_respected() {
        let desc = extract(parse_quote! {
            trait Search {
                #[post("/search")]
                async fn search(&self, #[query] a: u32, #[query] b: Option<u32>, #[body] filter: Filter) -> Result<Hits, RefitError>;
            }
        })
        .unwrap();
        let endpoint = &desc.endpoints[0];
        assert_eq!(
            roles(endpoint),
            vec![
                ("a".to_string(), ParamRole::Query),
                ("b".to_string(), ParamRole::Query),
                ("filter".to_string(), ParamRole::Body),
            ]
        );
        assert!(!endpoint.params[0].optional);
        assert!(endpoint.params[1].optional);
        assert_eq!(endpoint.body().unwrap().ident, "filter");
    }

    #[test]
    fn ambiguous_body_is_an_error() {
        let err = extract(parse_quote! {
            trait Values {
                #[post("/api/values")]
                async fn create(&self, first: String, second: String) -> Result<String, RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous request body"));
    }

    #[test]
    fn unbound_parameter_next_to_explicit_body_is_an_error() {
        let err = extract(parse_quote! {
            trait Values {
                #[post("/api/values")]
                async fn create(&self, #[body] value: String, extra: u32) -> Result<String, RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("`extra` is not bound"));
    }

    #[test]
    fn two_explicit_bodies_are_an_error() {
        let err = extract(parse_quote! {
            trait Values {
                #[post("/api/values")]
                async fn create(&self, #[body] a: String, #[body] b: String) -> Result<String, RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("only one parameter"));
    }

    #[test]
    fn unbound_placeholder_is_an_error() {
        let err = extract(parse_quote! {
            trait Values {
                #[get("/api/values/{id}")]
                async fn get(&self, #[query] id: u32) -> Result<String, RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("`{id}` has no matching parameter"));
    }

    #[test]
    fn structural_async_detection() {
        let desc = extract(parse_quote! {
            trait Values {
                #[get("/a")]
                async fn a(&self) -> Result<String, RefitError>;

                // A type merely named like a future is still blocking.
                #[get("/b")]
                fn b(&self) -> Result<TaskList, RefitError>;
            }
        })
        .unwrap();
        assert!(desc.endpoints[0].returns.is_async());
        assert_eq!(desc.endpoints[1].returns.call, CallConvention::Blocking);
    }

    #[test]
    fn non_result_return_is_an_error() {
        let err = extract(parse_quote! {
            trait Values {
                #[get("/a")]
                async fn a(&self) -> String;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("must return Result"));
    }

    #[test]
    fn receiver_must_be_shared_reference() {
        let err = extract(parse_quote! {
            trait Values {
                #[get("/a")]
                async fn a(&mut self) -> Result<(), RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("`&self`"));
    }

    #[test]
    fn generic_traits_are_rejected() {
        let err = extract(parse_quote! {
            trait Values<T> {
                #[get("/a")]
                async fn a(&self) -> Result<T, RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("cannot be generic"));
    }

    #[test]
    fn pattern_parameters_are_rejected() {
        let err = extract(parse_quote! {
            trait Values {
                #[get("/a")]
                async fn a(&self, (x, y): (u32, u32)) -> Result<(), RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("plain identifiers"));
    }

    #[test]
    fn reserved_parameter_names_are_rejected() {
        let err = extract(parse_quote! {
            trait Values {
                #[get("/a")]
                async fn a(&self, #[query] __refit_path: u32) -> Result<(), RefitError>;
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn strip_markers_removes_vocabulary() {
        let item: ItemTrait = parse_quote! {
            #[rest_client]
            /// Docs survive.
            pub trait Values {
                /// So do method docs.
                #[post("/api/values")]
                async fn create(&self, #[body] value: String) -> Result<String, RefitError>;
            }
        };
        let stripped = strip_markers(&item);
        let text = quote!(#stripped).to_string();
        assert!(!text.contains("rest_client"));
        assert!(!text.contains("post"));
        assert!(!text.contains("# [body]"));
        assert!(text.contains("So do method docs"));
    }

    #[test]
    fn extract_file_descends_into_inline_modules() {
        let file: syn::File = parse_quote! {
            #[rest_client]
            pub trait Top {
                #[get("/top")]
                async fn top(&self) -> Result<String, RefitError>;
            }

            pub mod nested {
                #[rest_client]
                pub trait Inner {
                    #[post("/inner")]
                    async fn inner(&self, first: String, second: String) -> Result<String, RefitError>;
                }
            }

            trait Unmarked {}
        };
        let found = extract_file(&file, &ExtractOptions::default()).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name(), "Top");
        assert!(found[0].modules.is_empty());
        assert!(found[0].result.is_ok());
        assert_eq!(found[1].modules, vec!["nested"]);
        assert!(found[1].result.is_err());
    }

    #[test]
    fn raised_cancel_flag_abandons_extraction() {
        let file: syn::File = parse_quote! {
            #[rest_client]
            pub trait Top {
                #[get("/top")]
                async fn top(&self) -> Result<String, RefitError>;
            }
        };
        let flag = CancelFlag::default();
        flag.store(true, Ordering::Relaxed);
        let options = ExtractOptions::default().with_cancel(flag);
        assert!(matches!(
            extract_file(&file, &options),
            Err(GeneratorError::Cancelled)
        ));
    }
}
