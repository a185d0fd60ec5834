//! Configuration management
//!
//! Provides a strongly-typed configuration snapshot loaded from JSON (the
//! native format) or TOML. A loaded [`Config`] is normalized once and then
//! treated as immutable; share it behind an `Arc`.

use crate::error::{Error, Result};
use crate::rules::{
    normalize_country_codes, normalize_final, CidrMatcher, DomainTree, GeoIpClassifier,
    NoCountryLookup,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// On-disk document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON document
    Json,
    /// TOML document
    Toml,
}

impl Format {
    /// Pick the format from a file extension; anything but `.toml` is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote proxy server URL
    pub server: String,

    /// Upstream name server URL
    pub name_server: String,

    /// Local proxy listen address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_server: Option<String>,

    /// Packet filter expression for the Windows capture driver
    #[serde(
        rename = "windivert_filter_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub filter_string: Option<String>,

    /// TUN device name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tun_name: Option<String>,

    /// TUN device addresses
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tun_addr: Vec<String>,

    /// GeoIP rules
    #[serde(rename = "geo_ip_rules")]
    pub geo_ip: GeoIpRules,

    /// Application rules
    pub app_rules: AppRules,

    /// IP range rules
    pub ip_cidr_rules: IpCidrRules,

    /// Domain rules
    pub domain_rules: DomainRules,
}

impl Config {
    /// Load configuration from a file
    ///
    /// Fails if the path does not exist, is not a regular file, cannot be
    /// read or does not parse. The format follows the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = absolute(path.as_ref())?;
        let shown = path.display().to_string();

        let metadata = std::fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigNotFound {
                path: shown.clone(),
            },
            _ => Error::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(Error::NotAFile { path: shown });
        }

        let content = std::fs::read(&path)?;
        debug!(path = %shown, bytes = content.len(), "Read configuration");

        match Format::from_path(&path) {
            Format::Json => Self::from_slice(&content),
            Format::Toml => {
                let text = String::from_utf8(content)
                    .map_err(|e| Error::config_value("document", e.to_string()))?;
                Self::from_toml(&text)
            }
        }
    }

    /// Parse a JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(bytes)?;
        Ok(config.normalized())
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Uppercase GeoIP country codes and lowercase the Final token
    ///
    /// The code lists are rebuilt rather than edited in place, so the
    /// operation is idempotent and never changes their length.
    pub fn normalized(mut self) -> Self {
        self.geo_ip.proxy = normalize_country_codes(&self.geo_ip.proxy);
        self.geo_ip.bypass = normalize_country_codes(&self.geo_ip.bypass);
        self.geo_ip.final_verdict = normalize_final(&self.geo_ip.final_verdict);
        self
    }

    /// Check every rule the classifier build would reject
    pub fn validate(&self) -> Result<()> {
        GeoIpClassifier::new(&self.geo_ip, Arc::new(NoCountryLookup))?;
        CidrMatcher::new(&self.ip_cidr_rules.proxy)?;
        DomainTree::from_rules(&self.domain_rules)?;

        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(Error::from)
    }

    /// Serialize in the given format
    pub fn render(&self, format: Format) -> Result<String> {
        match format {
            Format::Json => self.to_json(),
            Format::Toml => self.to_toml(),
        }
    }

    /// Example configuration written by `config generate`
    pub fn sample() -> Self {
        Self {
            server: "ss://chacha20-ietf-poly1305:password@1.2.3.4:8388".to_string(),
            name_server: "https://1.1.1.1/dns-query".to_string(),
            proxy_server: Some("127.0.0.1:1080".to_string()),
            filter_string: None,
            geo_ip: GeoIpRules {
                file: "Country.mmdb".to_string(),
                proxy: Vec::new(),
                bypass: vec!["CN".to_string()],
                final_verdict: "proxy".to_string(),
            },
            app_rules: AppRules::default(),
            tun_name: Some("utun".to_string()),
            tun_addr: vec!["192.168.0.11/24".to_string()],
            ip_cidr_rules: IpCidrRules {
                proxy: vec!["198.18.0.0/16".to_string(), "8.8.8.8/32".to_string()],
            },
            domain_rules: DomainRules {
                proxy: vec!["google.com".to_string()],
                direct: vec!["baidu.com".to_string()],
                blocked: vec!["ads.example.com".to_string()],
            },
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// GeoIP rule lists and the Final default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpRules {
    /// Country database path, consumed by the lookup provider
    pub file: String,
    /// Country codes routed through the proxy
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proxy: Vec<String>,
    /// Country codes sent directly
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bypass: Vec<String>,
    /// Default verdict token when no country rule applies
    #[serde(rename = "final")]
    pub final_verdict: String,
}

/// Application identifier rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppRules {
    /// Applications routed through the proxy
    pub proxy: Vec<String>,
}

/// IP range rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpCidrRules {
    /// Ranges routed through the proxy
    pub proxy: Vec<String>,
}

/// Domain rules by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainRules {
    /// Domains routed through the proxy
    pub proxy: Vec<String>,
    /// Domains sent directly
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub direct: Vec<String>,
    /// Domains dropped
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked: Vec<String>,
}
