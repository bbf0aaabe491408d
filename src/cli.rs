use crate::types::{ScanSettings, PLACEHOLDER_DOMAIN};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "subprobe",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ", built ", env!("BUILD_TIME"), ")"),
    about = "Subdomain discovery by wordlist and dnsdumpster, with CNAME chasing and HTTP probing",
    long_about = "subprobe resolves <word>.<domain> for every wordlist entry plus the hosts dnsdumpster.com\nalready knows about, follows CNAME targets and probes every live name over HTTP/HTTPS."
)]
pub struct Args {
    /// Domain to scan, like '-d ya.ru'
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN", default_value = "")]
    pub domain: String,

    /// Subdomains dictionary file
    #[arg(short = 'w', long = "wordlist", value_name = "FILE", default_value = "wordlist.txt")]
    pub wordlist: PathBuf,

    /// Number of concurrent workers, like '-t 50'
    #[arg(short = 't', long = "threads", default_value_t = 10, allow_negative_numbers = true)]
    pub threads: i64,

    /// Serve the web UI on this port instead of scanning from the command line
    #[arg(long = "ui", value_name = "PORT")]
    pub ui: Option<u16>,

    /// Output file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<String>,

    /// Output in JSON lines format
    #[arg(long = "json")]
    pub json: bool,

    /// Output in CSV format
    #[arg(long = "csv", conflicts_with = "json")]
    pub csv: bool,

    /// Skip the dnsdumpster.com source
    #[arg(long = "no-aggregator")]
    pub no_aggregator: bool,

    /// Silent mode (only output results)
    #[arg(long = "silent")]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

impl Args {
    /// Check flag combinations; the message is meant to go with the usage text.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads <= 0 {
            return Err("-t can not be less than 1".to_string());
        }
        if self.ui.is_none() {
            let domain = self.domain.trim();
            if domain.is_empty() || domain == PLACEHOLDER_DOMAIN {
                return Err("a domain to scan is required, like '-d ya.ru'".to_string());
            }
        }
        if self.ui == Some(0) {
            return Err("--ui port must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        usize::try_from(self.threads).unwrap_or(1).max(1)
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings::new(&self.domain, self.wordlist.clone(), self.workers())
    }
}
