//! Response body rewriting.
//!
//! # Data Flow
//! ```text
//! buffered upstream body + upstream-relative path
//!     → RuleSet::find (glob match, first rule wins)
//!     → RewriteRule::apply (framework-specific transform)
//!     → rewritten body, Content-Length recomputed by the relay
//! ```
//!
//! # Design Decisions
//! - Rules are keyed by glob patterns matched against the path the
//!   upstream saw, never the prefixed one
//! - Only the first matching rule runs; rules do not compose
//! - Transforms are infallible: a transform that finds nothing returns the
//!   body it was given

pub mod frameworks;
pub mod spa_router;
pub mod substitution;

use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::proxy::{BasePath, FrameworkKind};

pub use spa_router::SpaRouterRewrite;
pub use substitution::Substitutions;

/// Error building a rewrite rule.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid glob {pattern:?}: {reason}")]
    Glob {
        pattern: String,
        reason: &'static str,
    },

    #[error("invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Body transform. Must return the input unchanged when it cannot apply.
pub type Transform = Box<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// A glob-keyed body transform.
pub struct RewriteRule {
    pattern: String,
    matcher: Regex,
    transform: Transform,
}

impl RewriteRule {
    pub fn new<F>(pattern: &str, transform: F) -> Result<Self, RuleError>
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let matcher = glob_regex(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            transform: Box::new(transform),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    pub fn apply(&self, body: &[u8]) -> Vec<u8> {
        (self.transform)(body)
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Compile a shell-style glob into an anchored regex.
///
/// `*` matches any run of characters, `/` included; `?` matches one
/// character; `[...]` and `[!...]` are character classes.
fn glob_regex(pattern: &str) -> Result<Regex, RuleError> {
    let invalid = |reason| RuleError::Glob {
        pattern: pattern.to_string(),
        reason,
    };

    let mut source = String::from("(?s)^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '[' => {
                source.push('[');
                if chars.next_if_eq(&'!').is_some() {
                    source.push('^');
                }
                if chars.next_if_eq(&']').is_some() {
                    source.push_str("\\]");
                }
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('-') => source.push('-'),
                        Some(c) if c.is_ascii_punctuation() => {
                            source.push('\\');
                            source.push(c);
                        }
                        Some(c) => source.push(c),
                        None => return Err(invalid("unclosed character class")),
                    }
                }
                source.push(']');
            }
            c => source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Ok(Regex::new(&source)?)
}

/// Ordered rewrite rules for one mounted application.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    /// Build the rules a framework needs under the given base path.
    pub fn for_framework(kind: FrameworkKind, base: &BasePath) -> Result<Self, RuleError> {
        Ok(Self::new(frameworks::rules_for(kind, base)?))
    }

    /// First rule whose pattern matches the upstream-relative path.
    pub fn find(&self, path: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// Apply the first matching rule, returning its pattern and the new body.
    ///
    /// `None` means no rule matched and the body must be forwarded as is.
    pub fn rewrite(&self, path: &str, body: &[u8]) -> Option<(&str, Vec<u8>)> {
        let rule = self.find(path)?;
        Some((rule.pattern(), rule.apply(body)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
