//! Error types for the refit generator.

use thiserror::Error;

/// Errors that can occur while generating client source units.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Failed to read an input file
    #[error("Failed to read input file '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Input is not valid Rust source
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    /// A service trait could not be mapped onto a client.
    #[error("Service '{service}' cannot be generated: {message}")]
    Extraction {
        /// Name of the offending trait.
        service: String,
        /// The extractor's diagnostic.
        message: String,
    },

    /// Generated code failed validation
    #[error("Code generation failed: {0}")]
    CodeGenError(String),

    /// Failed to write output file
    #[error("Failed to write output file '{path}': {source}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Output directory does not exist
    #[error("Output directory does not exist: {0}")]
    OutputDirNotFound(String),

    /// Generation was abandoned through the cancellation flag.
    #[error("Generation cancelled")]
    Cancelled,
}

impl GeneratorError {
    pub fn extraction(service: impl Into<String>, error: &syn::Error) -> Self {
        Self::Extraction {
            service: service.into(),
            message: error.to_string(),
        }
    }
}
