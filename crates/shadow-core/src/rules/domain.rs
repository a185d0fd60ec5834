//! Domain rule store
//!
//! A label trie keyed by the reversed label sequence of each rule, so that
//! `example.com` is stored as `com -> example`. A lookup walks the query from
//! the most general label to the most specific one and keeps the deepest
//! verdict it passes, which gives:
//!
//! - a rule for `example.com` also matches `a.b.example.com`
//! - a rule for `a.example.com` overrides `example.com` for that subtree
//!
//! The tree can only be mutated through [`DomainTreeBuilder`]; once built,
//! [`DomainTree`] is immutable and lookups need no synchronization.

use super::Verdict;
use crate::config::DomainRules;
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

/// Default label separator for DNS names
pub const DEFAULT_SEPARATOR: char = '.';

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    verdict: Option<Verdict>,
}

/// Frozen domain rule store
#[derive(Debug)]
pub struct DomainTree {
    separator: char,
    root: Node,
    len: usize,
}

impl Default for DomainTree {
    fn default() -> Self {
        DomainTreeBuilder::new().build()
    }
}

impl DomainTree {
    /// Start building a tree with the default `.` separator
    pub fn builder() -> DomainTreeBuilder {
        DomainTreeBuilder::new()
    }

    /// Build a tree from the configured domain rule lists
    ///
    /// Lists are loaded proxy, direct, blocked; a domain present in more
    /// than one list ends up with the verdict of the last one.
    pub fn from_rules(rules: &DomainRules) -> Result<Self> {
        let mut builder = DomainTreeBuilder::new();
        builder.extend(&rules.proxy, Verdict::Proxy)?;
        builder.extend(&rules.direct, Verdict::Direct)?;
        builder.extend(&rules.blocked, Verdict::Blocked)?;
        Ok(builder.build())
    }

    /// Resolve a domain to the verdict of its most specific matching rule
    ///
    /// Empty or malformed queries simply do not match.
    pub fn lookup(&self, domain: &str) -> Option<Verdict> {
        let domain = domain.trim();
        let domain = domain.strip_suffix(self.separator).unwrap_or(domain);
        if domain.is_empty() {
            return None;
        }
        let domain = domain.to_lowercase();

        let mut node = &self.root;
        let mut best = None;
        for label in domain.rsplit(self.separator) {
            if label.is_empty() {
                return None;
            }
            match node.children.get(label) {
                Some(child) => {
                    node = child;
                    if child.verdict.is_some() {
                        best = child.verdict;
                    }
                }
                None => break,
            }
        }
        best
    }

    /// Number of stored rules
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the tree holds no rules
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Label separator this tree was built with
    pub fn separator(&self) -> char {
        self.separator
    }
}

/// Accumulates domain rules and produces a frozen [`DomainTree`]
#[derive(Debug)]
pub struct DomainTreeBuilder {
    separator: char,
    root: Node,
    len: usize,
}

impl Default for DomainTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainTreeBuilder {
    /// Create a builder using `.` as label separator
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    /// Create a builder with a custom label separator
    pub fn with_separator(separator: char) -> Self {
        Self {
            separator,
            root: Node::default(),
            len: 0,
        }
    }

    /// Add a rule
    ///
    /// Supports:
    /// - Plain domains: "example.com" (matches itself and every subdomain)
    /// - Wildcard: "*.example.com" (same meaning as the plain form)
    ///
    /// Inserting the same domain again overwrites its verdict.
    pub fn insert(&mut self, pattern: &str, verdict: Verdict) -> Result<()> {
        let normalized = self.normalize(pattern)?;

        let mut node = &mut self.root;
        for label in normalized.rsplit(self.separator) {
            node = node.children.entry(label.to_string()).or_default();
        }
        if node.verdict.replace(verdict).is_none() {
            self.len += 1;
        } else {
            debug!(domain = %normalized, %verdict, "Overriding earlier domain rule");
        }
        Ok(())
    }

    /// Add every pattern in `patterns` with the same verdict
    pub fn extend<I, S>(&mut self, patterns: I, verdict: Verdict) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.insert(pattern.as_ref(), verdict)?;
        }
        Ok(())
    }

    /// Freeze the tree
    pub fn build(self) -> DomainTree {
        DomainTree {
            separator: self.separator,
            root: self.root,
            len: self.len,
        }
    }

    fn normalize(&self, pattern: &str) -> Result<String> {
        let sep = self.separator;
        let lowered = pattern.trim().to_lowercase();
        let domain = lowered
            .strip_prefix('*')
            .and_then(|d| d.strip_prefix(sep))
            .unwrap_or(&lowered)
            .trim_end_matches(sep);

        if domain.is_empty() || domain.split(sep).any(str::is_empty) {
            return Err(Error::invalid_domain(pattern));
        }
        Ok(domain.to_string())
    }
}
