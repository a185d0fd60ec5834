//! Flow classification
//!
//! Combines the rule sources into one total decision function. Sources are
//! tried strictly in order and the first hit wins:
//!
//! 1. domain rules
//! 2. CIDR rules
//! 3. application rules
//! 4. GeoIP country rules, then the Final default
//!
//! Explicit user rules always outrank the automatic country classification.

use crate::config::Config;
use crate::error::Result;
use crate::rules::{AppMatcher, CidrMatcher, CountryLookup, DomainTree, GeoIpClassifier, Verdict};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// What is known about a flow when it is classified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flow<'a> {
    /// Destination domain name (from DNS or SNI)
    pub domain: Option<&'a str>,
    /// Destination address
    pub addr: Option<IpAddr>,
    /// Originating application identifier
    pub app: Option<&'a str>,
}

impl<'a> Flow<'a> {
    /// Flow known only by its destination domain
    pub fn domain(domain: &'a str) -> Self {
        Self {
            domain: Some(domain),
            ..Self::default()
        }
    }

    /// Flow known only by its destination address
    pub fn addr(addr: IpAddr) -> Self {
        Self {
            addr: Some(addr),
            ..Self::default()
        }
    }

    /// Set the destination domain
    pub fn with_domain(mut self, domain: &'a str) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Set the destination address
    pub fn with_addr(mut self, addr: IpAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Set the originating application
    pub fn with_app(mut self, app: &'a str) -> Self {
        self.app = Some(app);
        self
    }
}

/// Rule source that produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSource {
    /// Domain rule store
    Domain,
    /// CIDR matcher
    Cidr,
    /// Application rules
    App,
    /// GeoIP country rule
    GeoIp,
    /// GeoIP Final default
    Final,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleSource::Domain => "domain",
            RuleSource::Cidr => "cidr",
            RuleSource::App => "app",
            RuleSource::GeoIp => "geoip",
            RuleSource::Final => "final",
        };
        f.write_str(name)
    }
}

/// A verdict together with the source that decided it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Routing decision
    pub verdict: Verdict,
    /// Deciding rule source
    pub source: RuleSource,
}

/// Stateless decision function over frozen rule stores
///
/// `Send + Sync`; share it behind an `Arc` and call it from any thread.
#[derive(Debug)]
pub struct Classifier {
    domains: Arc<DomainTree>,
    cidrs: Arc<CidrMatcher>,
    apps: AppMatcher,
    geoip: GeoIpClassifier,
}

impl Classifier {
    /// Assemble from already built rule sources
    pub fn new(
        domains: Arc<DomainTree>,
        cidrs: Arc<CidrMatcher>,
        apps: AppMatcher,
        geoip: GeoIpClassifier,
    ) -> Self {
        Self {
            domains,
            cidrs,
            apps,
            geoip,
        }
    }

    /// Build every rule source from a configuration snapshot
    ///
    /// Any malformed rule aborts the build.
    pub fn from_config(config: &Config, lookup: Arc<dyn CountryLookup>) -> Result<Self> {
        let domains = DomainTree::from_rules(&config.domain_rules)?;
        let cidrs = CidrMatcher::new(&config.ip_cidr_rules.proxy)?;
        let apps = AppMatcher::new(&config.app_rules.proxy);
        let geoip = GeoIpClassifier::new(&config.geo_ip, lookup)?;

        info!(
            domain_rules = domains.len(),
            cidr_rules = cidrs.len(),
            app_rules = apps.len(),
            geoip_final = %geoip.final_verdict(),
            "Built classifier"
        );

        Ok(Self::new(Arc::new(domains), Arc::new(cidrs), apps, geoip))
    }

    /// Classify a flow and report which source decided
    pub fn decide(&self, flow: &Flow<'_>) -> Decision {
        let decision = self.match_explicit(flow).unwrap_or_else(|| {
            match flow.addr.and_then(|addr| self.geoip.lookup(addr)) {
                Some(verdict) => Decision {
                    verdict,
                    source: RuleSource::GeoIp,
                },
                None => Decision {
                    verdict: self.geoip.final_verdict(),
                    source: RuleSource::Final,
                },
            }
        });

        debug!(
            domain = flow.domain,
            addr = ?flow.addr,
            app = flow.app,
            verdict = %decision.verdict,
            source = %decision.source,
            "Classified flow"
        );
        decision
    }

    /// Classify a flow
    pub fn classify(&self, flow: &Flow<'_>) -> Verdict {
        self.decide(flow).verdict
    }

    fn match_explicit(&self, flow: &Flow<'_>) -> Option<Decision> {
        let hit = |verdict, source| Decision { verdict, source };

        if let Some(verdict) = flow.domain.and_then(|d| self.domains.lookup(d)) {
            return Some(hit(verdict, RuleSource::Domain));
        }
        if let Some(verdict) = flow.addr.and_then(|a| self.cidrs.lookup(a)) {
            return Some(hit(verdict, RuleSource::Cidr));
        }
        if let Some(verdict) = flow.app.and_then(|a| self.apps.lookup(a)) {
            return Some(hit(verdict, RuleSource::App));
        }
        None
    }

    /// Domain rule store
    pub fn domains(&self) -> &DomainTree {
        &self.domains
    }

    /// CIDR matcher
    pub fn cidrs(&self) -> &CidrMatcher {
        &self.cidrs
    }
}
