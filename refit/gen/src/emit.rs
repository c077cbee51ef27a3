//! Indentation-aware source text buffer.
//!
//! [`SourceBuilder`] accumulates generated Rust source line by line. Block
//! delimiters are only ever written by the block helpers ([`SourceBuilder::braces`]
//! and the `append_*` methods built on it), so every `{` written gets its `}`.
//! The builder performs no semantic validation of what it is given.

use proc_macro2::TokenStream;

use crate::errors::GeneratorError;

const INDENT: &str = "    ";

#[derive(Debug, Default, Clone)]
pub struct SourceBuilder {
    buf: String,
    depth: usize,
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Appends text at the current indentation. Multi-line text is indented line by line.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            return self.blank();
        }
        for line in text.lines() {
            if line.trim().is_empty() {
                self.buf.push('\n');
            } else {
                self.push_indent();
                self.buf.push_str(line);
                self.buf.push('\n');
            }
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Appends a `//` comment, one per line of `text`.
    pub fn comment(&mut self, text: impl AsRef<str>) -> &mut Self {
        for line in text.as_ref().lines() {
            if line.is_empty() {
                self.line("//");
            } else {
                self.line(format!("// {line}"));
            }
        }
        self
    }

    /// Writes `header {`, runs `body` one level deeper, then writes `}`.
    pub fn braces(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) -> &mut Self {
        let header = header.as_ref();
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(format!("{header} {{"));
        }
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line("}")
    }

    /// Writes a function skeleton, e.g. `pub fn name(params) -> ret { ... }`.
    ///
    /// `head` is everything before the parameter list (`pub async fn name`).
    pub fn append_fn(
        &mut self,
        head: &str,
        params: &str,
        returns: Option<&str>,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let header = match returns {
            Some(ret) => format!("{head}({params}) -> {ret}"),
            None => format!("{head}({params})"),
        };
        self.braces(header, body)
    }

    /// Writes `impl Type { ... }` or `impl Trait for Type { ... }`.
    pub fn append_impl(
        &mut self,
        ty: &str,
        implemented: Option<&str>,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let header = match implemented {
            Some(tr) => format!("impl {tr} for {ty}"),
            None => format!("impl {ty}"),
        };
        self.braces(header, body)
    }

    /// Pretty-prints a token stream of items at the current indentation.
    ///
    /// ## Errors
    ///
    /// Returns [`GeneratorError::CodeGenError`] if the tokens are not a
    /// sequence of valid items.
    pub fn append_tokens(&mut self, tokens: &TokenStream) -> Result<&mut Self, GeneratorError> {
        let file: syn::File = syn::parse2(tokens.clone())
            .map_err(|e| GeneratorError::CodeGenError(format!("Generated code is invalid: {e}")))?;
        let formatted = prettyplease::unparse(&file);
        Ok(self.line(formatted.trim_end()))
    }

    pub fn build(self) -> String {
        self.buf
    }

    fn push_indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str(INDENT);
        }
    }
}
