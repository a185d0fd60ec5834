//! Rule sources consulted by the classifier
//!
//! Every source answers a single question with at most one [`Verdict`]:
//! - **Domain rules** - longest-suffix match over domain labels
//! - **CIDR rules** - longest-prefix match over address ranges
//! - **Application rules** - match on the originating program
//! - **GeoIP rules** - country code of the destination address
//!
//! All stores are built once from a complete rule list and are read-only
//! afterwards, so lookups never take a lock.

mod app;
mod cidr;
mod domain;
mod geoip;

pub use app::AppMatcher;
pub use cidr::CidrMatcher;
pub use domain::{DomainTree, DomainTreeBuilder, DEFAULT_SEPARATOR};
pub use geoip::{
    normalize_country_codes, normalize_final, CountryLookup, CountryTable, GeoIpClassifier,
    NoCountryLookup,
};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Routing decision for a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Tunnel through the remote proxy
    Proxy,
    /// Connect directly
    Direct,
    /// Drop the flow
    Blocked,
}

impl Verdict {
    /// Canonical uppercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Proxy => "PROXY",
            Verdict::Direct => "DIRECT",
            Verdict::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proxy" => Ok(Verdict::Proxy),
            "direct" => Ok(Verdict::Direct),
            "blocked" | "block" => Ok(Verdict::Blocked),
            _ => Err(Error::InvalidVerdict {
                token: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parse_case_insensitive() {
        assert_eq!("PROXY".parse::<Verdict>().unwrap(), Verdict::Proxy);
        assert_eq!("Direct".parse::<Verdict>().unwrap(), Verdict::Direct);
        assert_eq!(" blocked ".parse::<Verdict>().unwrap(), Verdict::Blocked);
        assert_eq!("block".parse::<Verdict>().unwrap(), Verdict::Blocked);
    }

    #[test]
    fn test_verdict_parse_invalid() {
        assert!("reject".parse::<Verdict>().is_err());
        assert!("".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Proxy.to_string(), "PROXY");
        assert_eq!(Verdict::Direct.to_string(), "DIRECT");
        assert_eq!(Verdict::Blocked.to_string(), "BLOCKED");
    }

    #[test]
    fn test_verdict_serde_uppercase() {
        let json = serde_json::to_string(&Verdict::Blocked).unwrap();
        assert_eq!(json, "\"BLOCKED\"");
        let parsed: Verdict = serde_json::from_str("\"DIRECT\"").unwrap();
        assert_eq!(parsed, Verdict::Direct);
    }
}
