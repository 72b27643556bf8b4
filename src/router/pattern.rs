//! Route template compilation.
//!
//! A template such as `/articles/{year}/{month}/` is split into literal and
//! capture segments and translated into a single anchored regex:
//! literals are escaped and matched verbatim, each `{name}` becomes a named
//! group of one or more non-slash characters.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::ParamVec;

#[allow(clippy::unwrap_used)]
static PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)(?::([a-zA-Z_][a-zA-Z0-9_]*))?\}").unwrap()
});

/// A template could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("route template '{template}' declares parameter '{name}' more than once")]
    DuplicateParam { template: String, name: String },
    #[error("route template '{template}' failed to compile: {reason}")]
    Invalid { template: String, reason: String },
}

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `converter` is the optional `:typename` suffix; it does not change matching.
    Capture {
        name: String,
        converter: Option<String>,
    },
}

/// Matcher derived from a route template.
#[derive(Clone)]
pub struct CompiledPattern {
    template: String,
    segments: Vec<Segment>,
    regex: Regex,
    param_names: Vec<String>,
}

impl CompiledPattern {
    /// Compile a template into a matcher.
    ///
    /// ```rust
    /// use gwrouter::router::CompiledPattern;
    ///
    /// let pattern = CompiledPattern::compile("/items/{id}").unwrap();
    /// let params = pattern.captures("/items/42").unwrap();
    /// assert_eq!(params[0].1, "42");
    /// assert!(pattern.captures("/items/42/extra").is_none());
    /// ```
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();
        let mut source = String::with_capacity(template.len() + 16);
        source.push('^');

        let mut idx = 0;
        for caps in PARAM_RE.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            if param_names.iter().any(|n| n == name) {
                return Err(PatternError::DuplicateParam {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }

            let literal = &template[idx..whole.start()];
            if !literal.is_empty() {
                source.push_str(&regex::escape(literal));
                segments.push(Segment::Literal(literal.to_string()));
            }
            source.push_str("(?P<");
            source.push_str(name);
            source.push_str(">[^/]+)");
            segments.push(Segment::Capture {
                name: name.to_string(),
                converter: caps.get(2).map(|c| c.as_str().to_string()),
            });
            param_names.push(name.to_string());
            idx = whole.end();
        }

        let tail = &template[idx..];
        if !tail.is_empty() {
            source.push_str(&regex::escape(tail));
            segments.push(Segment::Literal(tail.to_string()));
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| PatternError::Invalid {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            template: template.to_string(),
            segments,
            regex,
            param_names,
        })
    }

    /// Match a concrete path, returning captured values in declaration order.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        Some(
            self.param_names
                .iter()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.as_str().into(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// The generated regex source, mostly useful when debugging templates.
    #[must_use]
    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("template", &self.template)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}
