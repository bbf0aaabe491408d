// src/types.rs
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Domain the CLI usage text shows as an example; never a real target.
pub const PLACEHOLDER_DOMAIN: &str = "site.ru";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub probe_timeout: Duration,
    pub max_cname_depth: usize,
    pub rate_limits: HashMap<String, Option<u32>>,
    pub aggregator: AggregatorConfig,
    pub resolver: ResolverConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: format!("subprobe/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            probe_timeout: Duration::from_secs(3),
            max_cname_depth: 10,
            rate_limits: HashMap::new(),
            aggregator: AggregatorConfig::default(),
            resolver: ResolverConfig::default(),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://dnsdumpster.com/".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub timeout: Duration,
    pub attempts: usize,
    pub nameservers: Vec<String>,
    pub use_system_resolver: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 2,
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "1.1.1.1:53".to_string(),
            ],
            use_system_resolver: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Per-scan input. Immutable once the scan starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    pub domain: String,
    pub wordlist: PathBuf,
    pub workers: usize,
    pub sync_id: Option<String>,
}

impl ScanSettings {
    pub fn new(domain: &str, wordlist: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            domain: domain.trim().trim_end_matches('.').to_lowercase(),
            wordlist: wordlist.into(),
            workers,
            sync_id: None,
        }
    }

    pub fn with_sync_id(mut self, sync_id: impl Into<String>) -> Self {
        self.sync_id = Some(sync_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), SubprobeError> {
        if self.domain.is_empty() || self.domain == PLACEHOLDER_DOMAIN {
            return Err(SubprobeError::InvalidDomain(format!(
                "'{}' is not a scan target",
                self.domain
            )));
        }
        if !crate::utils::is_valid_domain(&self.domain) {
            return Err(SubprobeError::InvalidDomain(self.domain.clone()));
        }
        if self.workers == 0 {
            return Err(SubprobeError::ConfigError(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A name waiting in the work queue. `depth` counts CNAME hops from the
/// name a source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub depth: usize,
}

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depth: 0,
        }
    }

    pub fn cname_target(&self, target: impl Into<String>) -> Self {
        Self {
            name: target.into(),
            depth: self.depth + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkType {
    Host,
    Cname,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Host => write!(f, "HOST"),
            LinkType::Cname => write!(f, "CNAME"),
        }
    }
}

/// Outcome of the HTTP liveness probe; `Unreachable` prints as `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Code(u16),
    Unreachable,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Code(code) => write!(f, "{}", code),
            ProbeStatus::Unreachable => write!(f, "?"),
        }
    }
}

impl Serialize for ProbeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolutionRecord {
    pub ip: IpAddr,
    pub status: ProbeStatus,
    pub link_type: LinkType,
    pub name: String,
    pub cname: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "result", rename_all = "lowercase")]
pub enum EventKind {
    Domain(ResolutionRecord),
    Error(String),
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanEvent {
    pub sync_id: Option<String>,
    pub timestamp: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub candidates_queued: usize,
    pub lookup_failures: usize,
    pub duplicates: usize,
    pub records_emitted: usize,
    pub cnames_requeued: usize,
    pub duration: Duration,
}

pub struct SourceInfo {
    pub name: String,
    /// A failing required source fails the scan; others only report.
    pub required: bool,
}

#[derive(Debug, Error)]
pub enum SubprobeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Wordlist error ({path}): {message}")]
    WordlistError {
        path: String,
        message: String,
    },

    #[error("Source error in {source_name}: {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Probe error: {0}")]
    ProbeError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_normalize_domain() {
        let settings = ScanSettings::new(" Example.COM. ", "wordlist.txt", 10);
        assert_eq!(settings.domain, "example.com");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_reject_placeholder_and_zero_workers() {
        assert!(ScanSettings::new("site.ru", "w.txt", 10).validate().is_err());
        assert!(ScanSettings::new("", "w.txt", 10).validate().is_err());
        assert!(ScanSettings::new("example.com", "w.txt", 0).validate().is_err());
    }

    #[test]
    fn test_event_json_shape() {
        let event = ScanEvent {
            sync_id: Some("abc".to_string()),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            kind: EventKind::Domain(ResolutionRecord {
                ip: "93.184.216.34".parse().unwrap(),
                status: ProbeStatus::Unreachable,
                link_type: LinkType::Host,
                name: "www.example.com".to_string(),
                cname: String::new(),
            }),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["sync_id"], "abc");
        assert_eq!(json["type"], "domain");
        assert_eq!(json["result"]["status"], "?");
        assert_eq!(json["result"]["link_type"], "HOST");

        let done = ScanEvent {
            sync_id: None,
            timestamp: String::new(),
            kind: EventKind::Done,
        };
        assert_eq!(serde_json::to_value(&done).unwrap()["type"], "done");
    }
}
