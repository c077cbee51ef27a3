//! Source unit assembly and file writing for the `refit-gen` CLI.
//!
//! For every `#[rest_client]` trait in an input file the generator produces
//! two units, plus one `mod.rs` tying them together:
//!
//! ```text
//! generated/
//! ├── mod.rs
//! ├── test_service_generated_client.rs               # trait, contract, client
//! └── test_service_generated_client_registration.rs  # inventory entry, register()
//! ```
//!
//! Every unit is validated with `syn` and formatted with `prettyplease`
//! before it is written; writes go through a temp file and a rename.

use std::fs;
use std::path::{Path, PathBuf};

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, Item, ItemUse, Visibility, parse_quote};
use tracing::{debug, info, trace, warn};

use crate::codegen::{generate_client, generate_contract, generate_registration, service_trait};
use crate::emit::SourceBuilder;
use crate::errors::GeneratorError;
use crate::extract::{ExtractOptions, ExtractedService, extract_file};
use crate::model::{ServiceDescriptor, to_snake_case};

/// Notice placed at the top of every generated unit.
pub const GENERATED_NOTICE: &str =
    "This code was automatically generated by refit-gen. Do not edit manually.";

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Module paths glob-imported into each client unit (e.g. `crate::models`).
    pub imports: Vec<String>,
    pub extract: ExtractOptions,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub file_name: String,
    pub contents: String,
}

/// Outcome of a generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Services that were generated, by trait name.
    pub services: Vec<String>,
    pub units: Vec<SourceUnit>,
    /// Services that failed; they produced no units.
    pub failures: Vec<GeneratorError>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads and generates from a source file.
///
/// ## Errors
///
/// Returns `ReadError` if the file cannot be read, otherwise as
/// [`generate_from_source`].
pub fn generate_from_file(
    path: &Path,
    options: &GenerateOptions,
) -> Result<GenerationReport, GeneratorError> {
    let source = fs::read_to_string(path).map_err(|e| GeneratorError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    generate_from_source(&source, options)
}

/// Generates source units for every service trait in `source`.
///
/// A service that cannot be generated is recorded in
/// [`GenerationReport::failures`]; the remaining services are unaffected.
///
/// ## Errors
///
/// Returns `ParseError` if `source` is not valid Rust and `Cancelled` if
/// the cancellation flag was raised. Nothing is returned in either case.
pub fn generate_from_source(
    source: &str,
    options: &GenerateOptions,
) -> Result<GenerationReport, GeneratorError> {
    let file = syn::parse_file(source).map_err(|e| GeneratorError::ParseError(e.to_string()))?;
    let found = extract_file(&file, &options.extract)?;

    let mut report = GenerationReport::default();
    let mut stems = Vec::new();

    for service in &found {
        if options.extract.is_cancelled() {
            return Err(GeneratorError::Cancelled);
        }

        let name = service.name();
        let desc = match &service.result {
            Ok(desc) => desc,
            Err(err) => {
                warn!(service = %name, error = %err, "skipping service");
                report.failures.push(GeneratorError::extraction(&name, err));
                continue;
            }
        };
        debug!(
            service = %name,
            endpoints = desc.endpoints.len(),
            skipped = desc.skipped.len(),
            "extracted service"
        );
        for endpoint in &desc.endpoints {
            trace!(
                service = %name,
                endpoint = %endpoint.ident,
                verb = %endpoint.verb,
                path = endpoint.path.as_str(),
                "extracted endpoint"
            );
        }

        let stem = unit_stem(&service.modules, desc);
        if stems.contains(&stem) {
            let err = GeneratorError::CodeGenError(format!(
                "service '{name}' maps to unit '{stem}', which another service already uses"
            ));
            warn!(service = %name, error = %err, "skipping service");
            report.failures.push(err);
            continue;
        }

        let uses = uses_in_scope(&file, &service.modules);
        let rendered = render_client_unit(service, desc, &uses, &options.imports)
            .and_then(|client| Ok((client, render_registration_unit(&service.modules, desc)?)));
        match rendered {
            Ok((client, registration)) => {
                stems.push(stem);
                report.units.push(client);
                report.units.push(registration);
                report.services.push(name);
            }
            Err(err) => {
                warn!(service = %name, error = %err, "skipping service");
                report.failures.push(err);
            }
        }
    }

    if !stems.is_empty() {
        report.units.push(render_mod_unit(&stems)?);
    }

    info!(
        services = report.services.len(),
        failures = report.failures.len(),
        "generation finished"
    );
    Ok(report)
}

/// File stem for a service's units.
///
/// `test_service_generated_client` for a root-level `TestService`, and
/// `admin_test_service_generated_client` for one declared in `mod admin`.
pub fn unit_stem(modules: &[Ident], desc: &ServiceDescriptor) -> String {
    modules
        .iter()
        .map(|module| to_snake_case(&module.to_string()))
        .chain(std::iter::once(to_snake_case(&desc.client_ident().to_string())))
        .collect::<Vec<_>>()
        .join("_")
}

/// Renders the unit holding the cleaned trait, its contract and the client.
///
/// Private traits are widened to `pub(crate)` so the sibling registration
/// unit can name them.
pub fn render_client_unit(
    service: &ExtractedService,
    desc: &ServiceDescriptor,
    uses: &[ItemUse],
    imports: &[String],
) -> Result<SourceUnit, GeneratorError> {
    let mut item = service.item.clone();
    let mut desc = desc.clone();
    if matches!(item.vis, Visibility::Inherited) {
        item.vis = parse_quote!(pub(crate));
        desc.vis = item.vis.clone();
    }

    let mut builder = SourceBuilder::new();
    builder.comment(GENERATED_NOTICE).blank();

    for import in imports {
        builder.line("#[allow(unused_imports)]");
        builder.line(format!("use {import}::*;"));
    }
    if !uses.is_empty() {
        builder.append_tokens(&quote!(#(#uses)*))?;
    }
    if !imports.is_empty() || !uses.is_empty() {
        builder.blank();
    }

    builder.append_tokens(&service_trait(&item))?;
    builder.blank();
    builder.append_tokens(&generate_contract(&desc))?;
    builder.blank();
    builder.append_tokens(&generate_client(&desc))?;

    let contents = builder.build();
    validate_source(&contents)?;

    Ok(SourceUnit {
        file_name: format!("{}.rs", unit_stem(&service.modules, &desc)),
        contents,
    })
}

/// Renders the registration unit: the `inventory` entry plus an explicit
/// `register` helper for dependency-injected registries.
pub fn render_registration_unit(
    modules: &[Ident],
    desc: &ServiceDescriptor,
) -> Result<SourceUnit, GeneratorError> {
    let stem = unit_stem(modules, desc);
    let service = desc.name();
    let client = desc.client_ident().to_string();

    let mut builder = SourceBuilder::new();
    builder.comment(GENERATED_NOTICE).blank();
    builder.line(format!("use super::{stem}::{{{client}, {service}}};"));
    builder.blank();
    builder.append_tokens(&generate_registration(desc))?;
    builder.blank();
    builder.append_impl(&client, None, |b| {
        b.line("/// Registers this client with an explicit registry.");
        b.append_fn(
            "pub fn register",
            "registry: &::refit::ClientRegistry",
            Some("::core::result::Result<(), ::refit::RegistryError>"),
            |b| {
                b.line(format!(
                    "registry.register::<dyn {service}>(|transport| ::std::boxed::Box::new({client}::new(transport)))"
                ));
            },
        );
    });

    let contents = builder.build();
    validate_source(&contents)?;

    Ok(SourceUnit {
        file_name: format!("{stem}_registration.rs"),
        contents,
    })
}

/// Renders `mod.rs` for the generated units.
pub fn render_mod_unit(stems: &[String]) -> Result<SourceUnit, GeneratorError> {
    let mut tokens = TokenStream::new();
    for stem in stems {
        let module = Ident::new(stem, proc_macro2::Span::call_site());
        let registration = quote::format_ident!("{}_registration", stem);
        tokens.extend(quote! {
            pub mod #module;
            mod #registration;
            pub use #module::*;
        });
    }
    let file = validate_code(&tokens)?;
    Ok(SourceUnit {
        file_name: "mod.rs".to_string(),
        contents: format_code(&file),
    })
}

/// `use` items visible to a trait: those at the file root and in each
/// enclosing inline module.
fn uses_in_scope(file: &syn::File, modules: &[Ident]) -> Vec<ItemUse> {
    let mut uses = Vec::new();
    let mut items = file.items.as_slice();
    let mut depth = 0;
    loop {
        uses.extend(items.iter().filter_map(|item| match item {
            Item::Use(item) => Some(item.clone()),
            _ => None,
        }));
        let Some(next) = modules.get(depth) else {
            break;
        };
        let nested = items.iter().find_map(|item| match item {
            Item::Mod(module) if module.ident == *next => {
                module.content.as_ref().map(|(_, items)| items.as_slice())
            }
            _ => None,
        });
        match nested {
            Some(nested) => items = nested,
            None => break,
        }
        depth += 1;
    }
    uses
}

/// Validates generated code using syn.
///
/// ## Errors
///
/// Returns `GeneratorError::CodeGenError` if the code fails to parse.
pub fn validate_code(tokens: &TokenStream) -> Result<syn::File, GeneratorError> {
    syn::parse2(tokens.clone())
        .map_err(|e| GeneratorError::CodeGenError(format!("Generated code is invalid: {e}")))
}

fn validate_source(source: &str) -> Result<(), GeneratorError> {
    syn::parse_file(source)
        .map(|_| ())
        .map_err(|e| GeneratorError::CodeGenError(format!("Generated code is invalid: {e}")))
}

/// Formats a parsed file with prettyplease, prefixed by the generated notice.
pub fn format_code(file: &syn::File) -> String {
    let formatted = prettyplease::unparse(file);
    format!("// {GENERATED_NOTICE}\n\n{formatted}")
}

/// Writes content to a file atomically using temp file + rename.
///
/// ## Errors
///
/// Returns `GeneratorError::WriteError` if parent directories cannot be
/// created, the temp file cannot be written or the rename fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), GeneratorError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| GeneratorError::WriteError {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| GeneratorError::WriteError {
        path: temp_path.display().to_string(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| GeneratorError::WriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Writes every unit into `output_dir`, returning the written paths.
///
/// The output directory is created if missing, but its parent must exist.
///
/// ## Errors
///
/// Returns `OutputDirNotFound` if the parent of `output_dir` does not exist,
/// or `WriteError` if any write fails.
pub fn write_units(units: &[SourceUnit], output_dir: &Path) -> Result<Vec<PathBuf>, GeneratorError> {
    if !output_dir.is_dir() {
        let parent_exists = output_dir
            .parent()
            .is_none_or(|p| p.as_os_str().is_empty() || p.is_dir());
        if !parent_exists {
            return Err(GeneratorError::OutputDirNotFound(
                output_dir.display().to_string(),
            ));
        }
    }

    let mut written = Vec::with_capacity(units.len());
    for unit in units {
        let path = output_dir.join(&unit.file_name);
        write_atomic(&path, &unit.contents)?;
        debug!(path = %path.display(), "wrote unit");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    use crate::extract::CancelFlag;

    const SOURCE: &str = r#"
        use serde::Deserialize;

        #[rest_client(base_url = "https://localhost:5000")]
        pub trait TestService {
            #[get("/api/values/{id}")]
            async fn get_value_by_id(&self, id: i32) -> refit::Result<String>;
        }

        #[rest_client]
        trait Broken {
            #[post("/api/values")]
            async fn create(&self, first: String, second: String) -> refit::Result<String>;
        }
    "#;

    #[test]
    fn generates_units_and_reports_failures() {
        let report = generate_from_source(SOURCE, &GenerateOptions::default()).unwrap();
        assert_eq!(report.services, vec!["TestService"]);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_success());

        let names: Vec<_> = report.units.iter().map(|u| u.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "test_service_generated_client.rs",
                "test_service_generated_client_registration.rs",
                "mod.rs",
            ]
        );
    }

    #[test]
    fn client_unit_carries_uses_and_notice() {
        let report = generate_from_source(SOURCE, &GenerateOptions::default()).unwrap();
        let client = &report.units[0].contents;
        assert!(client.starts_with(&format!("// {GENERATED_NOTICE}")));
        assert!(client.contains("use serde::Deserialize;"));
        assert!(client.contains("pub struct TestServiceGeneratedClient"));
        assert!(client.contains("::core::option::Option::Some("));
        assert!(client.contains("\"https://localhost:5000\""));
    }

    #[test]
    fn registration_unit_has_register_helper() {
        let report = generate_from_source(SOURCE, &GenerateOptions::default()).unwrap();
        let registration = &report.units[1].contents;
        assert!(registration.contains(
            "use super::test_service_generated_client::{TestServiceGeneratedClient, TestService};"
        ));
        assert!(registration.contains("impl TestServiceGeneratedClient {"));
        assert!(registration.contains("    pub fn register(registry: &::refit::ClientRegistry)"));
        assert!(registration.contains("registry.register::<dyn TestService>"));
    }

    #[test]
    fn private_traits_are_widened_for_sibling_units() {
        let source = r#"
            #[rest_client]
            trait Internal {
                #[get("/ping")]
                async fn ping(&self) -> refit::Result<()>;
            }
        "#;
        let report = generate_from_source(source, &GenerateOptions::default()).unwrap();
        let client = &report.units[0].contents;
        assert!(client.contains("pub(crate) trait Internal"));
        assert!(client.contains("public: false"));
    }

    #[test]
    fn imports_are_glob_imported() {
        let options = GenerateOptions {
            imports: vec!["crate::models".to_string()],
            ..Default::default()
        };
        let report = generate_from_source(SOURCE, &options).unwrap();
        assert!(report.units[0].contents.contains("use crate::models::*;"));
    }

    #[test]
    fn same_named_traits_in_different_modules_get_distinct_units() {
        let source = r#"
            #[rest_client]
            pub trait TestService {
                #[get("/a")]
                async fn a(&self) -> refit::Result<String>;
            }

            pub mod inner {
                #[rest_client]
                pub trait TestService {
                    #[get("/b")]
                    async fn b(&self) -> refit::Result<String>;
                }
            }
        "#;
        let report = generate_from_source(source, &GenerateOptions::default()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.services, vec!["TestService", "TestService"]);

        let names: Vec<_> = report.units.iter().map(|u| u.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "test_service_generated_client.rs",
                "test_service_generated_client_registration.rs",
                "inner_test_service_generated_client.rs",
                "inner_test_service_generated_client_registration.rs",
                "mod.rs",
            ]
        );

        let registration = &report.units[3].contents;
        assert!(registration.contains("use super::inner_test_service_generated_client::{"));

        let module = &report.units[4].contents;
        assert_eq!(module.matches("pub mod test_service_generated_client;").count(), 1);
        assert!(module.contains("pub mod inner_test_service_generated_client;"));
    }

    #[test]
    fn colliding_unit_names_are_reported() {
        let source = r#"
            #[rest_client]
            pub trait InnerTestService {
                #[get("/a")]
                async fn a(&self) -> refit::Result<String>;
            }

            pub mod inner {
                #[rest_client]
                pub trait TestService {
                    #[get("/b")]
                    async fn b(&self) -> refit::Result<String>;
                }
            }
        "#;
        let report = generate_from_source(source, &GenerateOptions::default()).unwrap();
        assert_eq!(report.services, vec!["InnerTestService"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].to_string().contains("already uses"));
        assert_eq!(report.units.len(), 3);
    }

    #[test]
    fn mod_unit_declares_and_reexports() {
        let unit = render_mod_unit(&["test_service_generated_client".to_string()]).unwrap();
        assert!(unit.contents.contains("pub mod test_service_generated_client;"));
        assert!(unit.contents.contains("mod test_service_generated_client_registration;"));
        assert!(unit.contents.contains("pub use test_service_generated_client::*;"));
    }

    #[test]
    fn invalid_source_is_a_parse_error() {
        let err = generate_from_source("trait {", &GenerateOptions::default()).unwrap_err();
        assert!(matches!(err, GeneratorError::ParseError(_)));
    }

    #[test]
    fn no_services_means_no_units() {
        let report = generate_from_source("pub trait Plain {}", &GenerateOptions::default()).unwrap();
        assert!(report.units.is_empty());
        assert!(report.is_success());
    }

    #[test]
    fn cancelled_generation_returns_nothing() {
        let flag = CancelFlag::default();
        flag.store(true, Ordering::Relaxed);
        let options = GenerateOptions {
            extract: ExtractOptions::default().with_cancel(flag),
            ..Default::default()
        };
        assert!(matches!(
            generate_from_source(SOURCE, &options),
            Err(GeneratorError::Cancelled)
        ));
    }

    #[test]
    fn write_units_creates_files_atomically() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("generated");
        let report = generate_from_source(SOURCE, &GenerateOptions::default()).unwrap();

        let written = write_units(&report.units, &out).unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            assert!(path.exists());
            assert!(!path.with_extension("tmp").exists());
        }
    }

    #[test]
    fn write_units_requires_existing_parent() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("missing").join("generated");
        let err = write_units(&[], &out).unwrap_err();
        assert!(matches!(err, GeneratorError::OutputDirNotFound(_)));
    }

    #[test]
    fn read_error_names_the_path() {
        let err = generate_from_file(Path::new("/nonexistent/defs.rs"), &GenerateOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/defs.rs"));
    }
}
