//! CIDR rule matcher
//!
//! Only a proxy list is configured, so a match always yields
//! [`Verdict::Proxy`]. Ranges are kept sorted narrowest-first so that the
//! first containing range is also the most specific one.

use super::Verdict;
use crate::error::{Error, Result};
use ipnet::IpNet;
use std::net::IpAddr;

/// Immutable longest-prefix matcher over configured IP ranges
#[derive(Debug, Clone, Default)]
pub struct CidrMatcher {
    /// Sorted by prefix length, longest first
    networks: Vec<IpNet>,
}

impl CidrMatcher {
    /// Parse every range; the first malformed entry aborts construction
    pub fn new<I, S>(cidrs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut networks = cidrs
            .into_iter()
            .map(|cidr| {
                let cidr = cidr.as_ref().trim();
                cidr.parse::<IpNet>()
                    .map(|net| net.trunc())
                    .map_err(|source| Error::InvalidCidr {
                        cidr: cidr.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        networks.sort_by(|a, b| b.prefix_len().cmp(&a.prefix_len()).then_with(|| a.cmp(b)));
        networks.dedup();

        Ok(Self { networks })
    }

    /// Verdict for `addr`, if it falls in any configured range
    pub fn lookup(&self, addr: IpAddr) -> Option<Verdict> {
        self.matching_network(addr).map(|_| Verdict::Proxy)
    }

    /// The narrowest configured range containing `addr`
    ///
    /// IPv4 addresses never match IPv6 ranges and vice versa.
    pub fn matching_network(&self, addr: IpAddr) -> Option<&IpNet> {
        self.networks.iter().find(|net| net.contains(&addr))
    }

    /// Number of distinct ranges
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Check if no range is configured
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
