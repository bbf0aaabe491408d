// src/sources/mod.rs
use crate::queue::WorkQueue;
use crate::session::Session;
use crate::types::{Config, ScanSettings, SourceInfo, SubprobeError};
use async_trait::async_trait;
use std::sync::Arc;

mod dnsdumpster;
mod wordlist;

pub use dnsdumpster::DnsDumpsterSource;
pub use wordlist::WordlistSource;

/// A producer of candidate names for one root domain.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> SourceInfo;
    /// Push every candidate into `queue`; returns how many were pushed.
    async fn produce(&self, domain: &str, queue: &WorkQueue) -> Result<usize, SubprobeError>;
}

/// Sources for one scan. Fails when the wordlist cannot be loaded, before
/// any scan work has started.
pub fn create_sources(
    settings: &ScanSettings,
    config: &Config,
    session: &Session,
) -> Result<Vec<Arc<dyn Source>>, SubprobeError> {
    let mut sources: Vec<Arc<dyn Source>> = vec![Arc::new(WordlistSource::load(&settings.wordlist)?)];

    if config.aggregator.enabled {
        sources.push(Arc::new(DnsDumpsterSource::new(
            session.clone(),
            &config.aggregator.url,
            config.aggregator.timeout,
        )));
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_create_sources() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "www").unwrap();

        let settings = ScanSettings::new("example.com", file.path(), 2);
        let mut config = Config::default();
        let session = Session::new(&config).unwrap();

        let sources = create_sources(&settings, &config, &session).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["wordlist", "dnsdumpster"]);
        assert!(sources[0].info().required);
        assert!(!sources[1].info().required);

        config.aggregator.enabled = false;
        assert_eq!(create_sources(&settings, &config, &session).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_wordlist_fails() {
        let settings = ScanSettings::new("example.com", "/nonexistent/wordlist.txt", 2);
        let config = Config::default();
        let session = Session::new(&config).unwrap();

        let result = create_sources(&settings, &config, &session);
        assert!(matches!(result, Err(SubprobeError::WordlistError { .. })));
    }
}
