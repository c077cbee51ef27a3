//! Normalized declaration model for REST service traits.
//!
//! The [`extract`](crate::extract) module turns an annotated trait into a
//! [`ServiceDescriptor`]; the [`codegen`](crate::codegen) generators consume
//! it. Descriptors are immutable once extracted.

use proc_macro2::Span;
use quote::format_ident;
use strum::Display;
use syn::{Ident, Signature, Type, Visibility};

use crate::parser::PathTemplate;

/// HTTP verb carried by an endpoint marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    /// Maps a marker attribute name (`get`, `post`, ...) to its verb.
    pub fn from_marker(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// The `refit::RestMethod` variant this verb dispatches as.
    pub fn runtime_variant(self) -> Ident {
        match self {
            Self::Get => format_ident!("Get"),
            Self::Post => format_ident!("Post"),
            Self::Put => format_ident!("Put"),
            Self::Delete => format_ident!("Delete"),
        }
    }
}

/// How a parameter participates in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Substituted into a `{name}` placeholder of the path template.
    PathSubstitution,
    /// Appended to the query string.
    Query,
    /// Serialized as the JSON request body.
    Body,
    /// Handed to the transport untouched (cancellation tokens). Never serialized.
    Passthrough,
}

/// One parameter of an endpoint method.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub ident: Ident,
    pub ty: Type,
    pub role: ParamRole,
    /// `true` when the declared type is `Option<_>`.
    pub optional: bool,
}

/// Whether the generated method blocks the caller or suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConvention {
    Blocking,
    Async,
}

/// Shape of an endpoint's return value.
#[derive(Debug, Clone)]
pub struct ReturnShape {
    pub call: CallConvention,
    /// The `T` of `Result<T, E>`, or `None` when `T` is `()`.
    pub value: Option<Type>,
}

impl ReturnShape {
    pub fn is_async(&self) -> bool {
        self.call == CallConvention::Async
    }

    pub fn is_void(&self) -> bool {
        self.value.is_none()
    }
}

/// One trait method carrying a verb marker.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub ident: Ident,
    pub verb: HttpVerb,
    pub path: PathTemplate,
    pub params: Vec<ParameterDescriptor>,
    pub returns: ReturnShape,
    /// Method signature with every marker attribute removed.
    pub signature: Signature,
}

impl EndpointDescriptor {
    /// Parameters with the given role, in declaration order.
    pub fn params_with_role(&self, role: ParamRole) -> impl Iterator<Item = &ParameterDescriptor> {
        self.params.iter().filter(move |p| p.role == role)
    }

    pub fn body(&self) -> Option<&ParameterDescriptor> {
        self.params_with_role(ParamRole::Body).next()
    }

    /// Looks up the parameter bound to a path placeholder.
    pub fn path_param(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params_with_role(ParamRole::PathSubstitution)
            .find(|p| p.ident == name)
    }
}

/// A remote service trait and its endpoints.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub ident: Ident,
    pub vis: Visibility,
    /// Default base address declared on the marker, if any.
    pub base_url: Option<String>,
    pub endpoints: Vec<EndpointDescriptor>,
    /// Methods without a verb marker. They receive no generated body.
    pub skipped: Vec<Ident>,
}

impl ServiceDescriptor {
    pub fn name(&self) -> String {
        self.ident.to_string()
    }

    /// `<Trait>GeneratedClient`
    pub fn client_ident(&self) -> Ident {
        Ident::new(&format!("{}GeneratedClient", self.ident), Span::call_site())
    }

    pub fn is_public(&self) -> bool {
        matches!(self.vis, Visibility::Public(_))
    }
}

/// Converts a CamelCase identifier to snake_case, keeping acronyms together.
///
/// ## Examples
///
/// ```
/// use refit_gen::model::to_snake_case;
///
/// assert_eq!(to_snake_case("TestService"), "test_service");
/// assert_eq!(to_snake_case("HTTPClient"), "http_client");
/// ```
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
