//! Application identifier rules

use super::Verdict;
use std::collections::HashSet;

/// Matches the program that originated a flow against the proxy list
///
/// Identifiers are compared case-insensitively, either whole or by their
/// final path component, so `firefox.exe` matches
/// `C:\Program Files\Mozilla Firefox\firefox.exe`.
#[derive(Debug, Clone, Default)]
pub struct AppMatcher {
    proxy: HashSet<String>,
}

impl AppMatcher {
    /// Create from the configured proxy list; blank entries are skipped
    pub fn new<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let proxy = apps
            .into_iter()
            .map(|app| app.as_ref().trim().to_lowercase())
            .filter(|app| !app.is_empty())
            .collect();
        Self { proxy }
    }

    /// Verdict for an application identifier
    pub fn lookup(&self, app: &str) -> Option<Verdict> {
        let app = app.trim().to_lowercase();
        if app.is_empty() {
            return None;
        }
        if self.proxy.contains(&app) {
            return Some(Verdict::Proxy);
        }

        let file_name = app.rsplit(['/', '\\']).next().unwrap_or(&app);
        self.proxy.contains(file_name).then_some(Verdict::Proxy)
    }

    /// Number of configured applications
    pub fn len(&self) -> usize {
        self.proxy.len()
    }

    /// Check if no application is configured
    pub fn is_empty(&self) -> bool {
        self.proxy.is_empty()
    }
}
