//! Path template parsing.
//!
//! A path template is a string with `{name}` placeholders, e.g.
//! `/threads/{thread_id}/messages/{message_id}`. Anything that is not a
//! well-formed, non-empty placeholder is kept as literal text.

/// One piece of a parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed `{name}` path template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses a template.
    ///
    /// ## Examples
    ///
    /// ```
    /// use refit_gen::parser::PathTemplate;
    ///
    /// let template = PathTemplate::parse("/api/values/{id}");
    /// assert_eq!(template.placeholders().collect::<Vec<_>>(), vec!["id"]);
    /// ```
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find(['{', '}']) {
                Some(close) if after.as_bytes()[close] == b'}' && close > 0 => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(after[..close].to_string()));
                    rest = &after[close + 1..];
                }
                _ => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The template exactly as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Builds a `format!` string: literals with braces escaped, `{}` per placeholder.
    pub fn format_string(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.replace('{', "{{").replace('}', "}}"),
                Segment::Placeholder(_) => "{}".to_string(),
            })
            .collect()
    }

    /// Substitutes placeholders with the given values.
    ///
    /// Placeholders without a value are left untouched.
    ///
    /// ## Examples
    ///
    /// ```
    /// use refit_gen::parser::PathTemplate;
    ///
    /// let path = PathTemplate::parse("/api/values/{id}").substitute(&[("id", "7")]);
    /// assert_eq!(path, "/api/values/7");
    /// ```
    pub fn substitute(&self, values: &[(&str, &str)]) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.clone(),
                Segment::Placeholder(name) => values
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| format!("{{{name}}}")),
            })
            .collect()
    }
}
