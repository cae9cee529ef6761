//! Literal search-and-replace over response bodies.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::bytes::{Captures, Regex};

use crate::proxy::BasePath;

/// A set of literal replacements applied in a single left-to-right pass.
///
/// Needles are tried longest first at every position, and replaced text is
/// never scanned again, so `/auth/config` and `/auth` can live in the same
/// set without the longer one being prefixed twice.
#[derive(Debug, Clone)]
pub struct Substitutions {
    pattern: Regex,
    replacements: HashMap<Vec<u8>, Vec<u8>>,
    /// Maximum replacements per body; 0 means unlimited.
    limit: usize,
}

impl Substitutions {
    pub fn new<I, N, R>(pairs: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (N, R)>,
        N: Into<String>,
        R: Into<String>,
    {
        let mut replacements = HashMap::new();
        let mut needles = Vec::new();
        for (needle, replacement) in pairs {
            let needle = needle.into();
            replacements.insert(needle.clone().into_bytes(), replacement.into().into_bytes());
            needles.push(needle);
        }
        needles.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        needles.dedup();

        let alternation = needles
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            pattern: Regex::new(&alternation)?,
            replacements,
            limit: 0,
        })
    }

    /// Prefix every occurrence of each absolute URI with the base path.
    pub fn prefixing(uris: &[&str], base: &BasePath) -> Result<Self, regex::Error> {
        Self::new(uris.iter().map(|uri| (*uri, base.join(uri))))
    }

    /// Only replace the first occurrence.
    pub fn first_only(mut self) -> Self {
        self.limit = 1;
        self
    }

    /// Extend with further literal pairs, keeping the single-pass property.
    pub fn with<N: Into<String>, R: Into<String>>(
        self,
        needle: N,
        replacement: R,
    ) -> Result<Self, regex::Error> {
        let limit = self.limit;
        let pairs = self
            .replacements
            .into_iter()
            .map(|(n, r)| {
                (
                    String::from_utf8_lossy(&n).into_owned(),
                    String::from_utf8_lossy(&r).into_owned(),
                )
            })
            .chain(std::iter::once((needle.into(), replacement.into())));
        let mut next = Self::new(pairs)?;
        next.limit = limit;
        Ok(next)
    }

    pub fn apply<'a>(&self, content: &'a [u8]) -> Cow<'a, [u8]> {
        self.pattern.replacen(content, self.limit, |caps: &Captures<'_>| {
            self.replacements
                .get(&caps[0])
                .cloned()
                .unwrap_or_else(|| caps[0].to_vec())
        })
    }
}
