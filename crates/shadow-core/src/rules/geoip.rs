//! GeoIP classification
//!
//! Maps the country code of a destination address to a verdict:
//! Proxy set first, then Bypass set, otherwise the Final default. The
//! country database itself is an external collaborator reached through
//! [`CountryLookup`]; a lookup that fails or returns nothing is treated the
//! same as a code found in neither set.

use super::Verdict;
use crate::config::GeoIpRules;
use crate::error::{Error, Result};
use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{trace, warn};

/// Country-code lookup contract
///
/// Implementations may touch a local database and block briefly; they
/// must not panic and should return `None` on any failure.
#[cfg_attr(test, mockall::automock)]
pub trait CountryLookup: Send + Sync {
    /// ISO country code for `addr`, in any letter case
    fn country_code(&self, addr: IpAddr) -> Option<String>;
}

/// Lookup that never finds a country
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCountryLookup;

impl CountryLookup for NoCountryLookup {
    fn country_code(&self, _addr: IpAddr) -> Option<String> {
        None
    }
}

/// In-memory country table keyed by address range
///
/// Overlapping ranges resolve to the narrowest one.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    entries: Vec<(IpNet, String)>,
}

impl CountryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a range to a country code
    pub fn insert(&mut self, cidr: &str, code: &str) -> Result<()> {
        let net = cidr
            .trim()
            .parse::<IpNet>()
            .map_err(|source| Error::InvalidCidr {
                cidr: cidr.to_string(),
                source,
            })?
            .trunc();

        let pos = self
            .entries
            .partition_point(|(existing, _)| existing.prefix_len() >= net.prefix_len());
        self.entries.insert(pos, (net, code.trim().to_uppercase()));
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, cidr: &str, code: &str) -> Result<Self> {
        self.insert(cidr, code)?;
        Ok(self)
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CountryLookup for CountryTable {
    fn country_code(&self, addr: IpAddr) -> Option<String> {
        self.entries
            .iter()
            .find(|(net, _)| net.contains(&addr))
            .map(|(_, code)| code.clone())
    }
}

/// Uppercase every code into a freshly allocated list of the same length
///
/// Already normalized input comes back unchanged.
pub fn normalize_country_codes(codes: &[String]) -> Vec<String> {
    codes.iter().map(|code| code.trim().to_uppercase()).collect()
}

/// Lowercase the Final default token
pub fn normalize_final(token: &str) -> String {
    token.trim().to_lowercase()
}

/// Country-code based classifier with a Final default
pub struct GeoIpClassifier {
    proxy: HashSet<String>,
    bypass: HashSet<String>,
    final_verdict: Verdict,
    lookup: Arc<dyn CountryLookup>,
}

impl std::fmt::Debug for GeoIpClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoIpClassifier")
            .field("proxy", &self.proxy)
            .field("bypass", &self.bypass)
            .field("final_verdict", &self.final_verdict)
            .finish_non_exhaustive()
    }
}

impl GeoIpClassifier {
    /// Build from configured rules
    ///
    /// Codes and the Final token are normalized again here, so callers may
    /// pass raw lists. An empty Final token means DIRECT.
    pub fn new(rules: &GeoIpRules, lookup: Arc<dyn CountryLookup>) -> Result<Self> {
        let final_token = normalize_final(&rules.final_verdict);
        let final_verdict = if final_token.is_empty() {
            Verdict::Direct
        } else {
            final_token.parse().map_err(|_| {
                Error::config_value(
                    "geo_ip_rules.final",
                    format!("unknown verdict '{final_token}'"),
                )
            })?
        };

        let proxy = country_set(&rules.proxy)?;
        let bypass = country_set(&rules.bypass)?;

        let overlap: Vec<&String> = proxy.intersection(&bypass).collect();
        if !overlap.is_empty() {
            warn!(codes = ?overlap, "Country codes listed as both proxy and bypass; proxy wins");
        }

        Ok(Self {
            proxy,
            bypass,
            final_verdict,
            lookup,
        })
    }

    /// Verdict from an explicit country rule, if any
    pub fn lookup(&self, addr: IpAddr) -> Option<Verdict> {
        let Some(code) = self.lookup.country_code(addr) else {
            trace!(%addr, "No country code");
            return None;
        };
        let code = code.trim().to_uppercase();

        if self.proxy.contains(&code) {
            Some(Verdict::Proxy)
        } else if self.bypass.contains(&code) {
            Some(Verdict::Direct)
        } else {
            trace!(%addr, country = %code, "Country not listed");
            None
        }
    }

    /// Verdict for `addr`, falling back to Final on a miss or when no
    /// address is known
    pub fn classify(&self, addr: Option<IpAddr>) -> Verdict {
        addr.and_then(|addr| self.lookup(addr))
            .unwrap_or(self.final_verdict)
    }

    /// The Final default
    pub fn final_verdict(&self) -> Verdict {
        self.final_verdict
    }
}

fn country_set(codes: &[String]) -> Result<HashSet<String>> {
    let codes = normalize_country_codes(codes);
    if codes.iter().any(String::is_empty) {
        return Err(Error::config_value("geo_ip_rules", "empty country code"));
    }
    Ok(codes.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn rules(proxy: &[&str], bypass: &[&str], final_token: &str) -> GeoIpRules {
        GeoIpRules {
            file: String::new(),
            proxy: proxy.iter().map(|s| s.to_string()).collect(),
            bypass: bypass.iter().map(|s| s.to_string()).collect(),
            final_verdict: final_token.to_string(),
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_proxy_bypass_final() {
        let table = CountryTable::new()
            .with("8.8.8.0/24", "us")
            .unwrap()
            .with("114.114.114.0/24", "CN")
            .unwrap();
        let geo_rules = rules(&["US"], &["CN"], "direct");
        let geo = GeoIpClassifier::new(&geo_rules, Arc::new(table)).unwrap();

        assert_eq!(geo.classify(Some(ip("8.8.8.8"))), Verdict::Proxy);
        assert_eq!(geo.classify(Some(ip("114.114.114.114"))), Verdict::Direct);
        assert_eq!(geo.classify(Some(ip("1.1.1.1"))), Verdict::Direct);
        assert_eq!(geo.classify(None), Verdict::Direct);
    }

    #[test]
    fn test_final_proxy() {
        let geo_rules = rules(&[], &["CN"], "PROXY");
        let geo = GeoIpClassifier::new(&geo_rules, Arc::new(NoCountryLookup)).unwrap();
        assert_eq!(geo.final_verdict(), Verdict::Proxy);
        assert_eq!(geo.classify(Some(ip("1.1.1.1"))), Verdict::Proxy);
    }

    #[test]
    fn test_empty_final_is_direct() {
        let geo_rules = rules(&[], &[], "");
        let geo = GeoIpClassifier::new(&geo_rules, Arc::new(NoCountryLookup)).unwrap();
        assert_eq!(geo.final_verdict(), Verdict::Direct);
    }

    #[test]
    fn test_unknown_final_rejected() {
        let geo_rules = rules(&[], &[], "tunnel");
        let err = GeoIpClassifier::new(&geo_rules, Arc::new(NoCountryLookup)).unwrap_err();
        assert!(err.to_string().contains("geo_ip_rules.final"));
    }

    #[test]
    fn test_empty_country_code_rejected() {
        let geo_rules = rules(&["US"], &["  "], "direct");
        let err = GeoIpClassifier::new(&geo_rules, Arc::new(NoCountryLookup)).unwrap_err();
        assert!(matches!(err, Error::ConfigValue { .. }));
    }

    #[test]
    fn test_lowercase_codes_in_rules() {
        let mut lookup = MockCountryLookup::new();
        lookup
            .expect_country_code()
            .with(eq(ip("5.5.5.5")))
            .returning(|_| Some("de".to_string()));
        let geo_rules = rules(&["de"], &[], "direct");
        let geo = GeoIpClassifier::new(&geo_rules, Arc::new(lookup)).unwrap();

        assert_eq!(geo.lookup(ip("5.5.5.5")), Some(Verdict::Proxy));
    }

    #[test]
    fn test_failed_lookup_falls_back() {
        let mut lookup = MockCountryLookup::new();
        lookup.expect_country_code().times(1).returning(|_| None);
        let geo_rules = rules(&["US"], &["CN"], "blocked");
        let geo = GeoIpClassifier::new(&geo_rules, Arc::new(lookup)).unwrap();

        assert_eq!(geo.classify(Some(ip("9.9.9.9"))), Verdict::Blocked);
    }

    #[test]
    fn test_proxy_wins_on_overlap() {
        let lookup = CountryTable::new().with("1.0.0.0/8", "JP").unwrap();
        let geo_rules = rules(&["JP"], &["jp"], "direct");
        let geo = GeoIpClassifier::new(&geo_rules, Arc::new(lookup)).unwrap();
        assert_eq!(geo.lookup(ip("1.2.3.4")), Some(Verdict::Proxy));
    }

    #[test]
    fn test_country_table_narrowest_wins() {
        let table = CountryTable::new()
            .with("10.0.0.0/8", "US")
            .unwrap()
            .with("10.1.0.0/16", "CA")
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.country_code(ip("10.1.1.1")).as_deref(), Some("CA"));
        assert_eq!(table.country_code(ip("10.2.1.1")).as_deref(), Some("US"));
        assert_eq!(table.country_code(ip("::1")), None);
    }

    #[test]
    fn test_country_table_invalid_range() {
        assert!(CountryTable::new().with("nope", "US").is_err());
    }

    #[test]
    fn test_normalize_codes() {
        let codes = vec!["us".to_string(), " Cn ".to_string(), "JP".to_string()];
        let normalized = normalize_country_codes(&codes);
        assert_eq!(normalized, vec!["US", "CN", "JP"]);
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn test_normalize_final() {
        assert_eq!(normalize_final(" PROXY "), "proxy");
        assert_eq!(normalize_final("direct"), "direct");
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_codes_is_idempotent(
                codes in proptest::collection::vec("[a-zA-Z]{2}", 0..16)
            ) {
                let once = normalize_country_codes(&codes);
                let twice = normalize_country_codes(&once);
                prop_assert_eq!(once.len(), codes.len());
                prop_assert_eq!(&once, &twice);
            }

            #[test]
            fn normalize_final_is_idempotent(token in "[a-zA-Z ]{0,12}") {
                let once = normalize_final(&token);
                prop_assert_eq!(normalize_final(&once), once);
            }
        }
    }
}
