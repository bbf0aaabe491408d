// src/sources/wordlist.rs
use crate::queue::WorkQueue;
use crate::sources::Source;
use crate::types::{Candidate, SourceInfo, SubprobeError};
use crate::utils;
use async_trait::async_trait;
use log::debug;
use std::path::Path;

/// Brute-force candidates: every wordlist line joined with the root domain.
#[derive(Debug, Clone)]
pub struct WordlistSource {
    name: String,
    words: Vec<String>,
}

impl WordlistSource {
    pub fn load(path: &Path) -> Result<Self, SubprobeError> {
        let words = utils::read_lines(path).map_err(|e| SubprobeError::WordlistError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!("Loaded {} wordlist lines from {}", words.len(), path.display());
        Ok(Self::from_words(words))
    }

    pub fn from_words(words: Vec<String>) -> Self {
        Self {
            name: "wordlist".to_string(),
            words,
        }
    }
}

#[async_trait]
impl Source for WordlistSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            required: true,
        }
    }

    async fn produce(&self, domain: &str, queue: &WorkQueue) -> Result<usize, SubprobeError> {
        let mut pushed = 0;
        for name in self.words.iter().filter_map(|word| utils::qualify(word, domain)) {
            queue
                .push(Candidate::new(name))
                .await
                .map_err(|e| SubprobeError::SourceError {
                    source_name: self.name.clone(),
                    message: e.to_string(),
                })?;
            pushed += 1;
        }
        Ok(pushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueItem;
    use std::io::Write;

    #[tokio::test]
    async fn test_produces_qualified_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "www\n\nMail\r\n  \napi").unwrap();

        let source = WordlistSource::load(file.path()).unwrap();
        let queue = WorkQueue::new(8);
        let pushed = source.produce("example.com", &queue).await.unwrap();
        assert_eq!(pushed, 3);

        let mut names = Vec::new();
        for _ in 0..3 {
            match queue.pop().await {
                Some(QueueItem::Candidate(c)) => names.push(c.name),
                other => panic!("unexpected item {:?}", other),
            }
        }
        assert_eq!(names, vec!["www.example.com", "mail.example.com", "api.example.com"]);
    }

    #[tokio::test]
    async fn test_latin1_line_does_not_abort_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"www\ncaf\xe9\nmail\n").unwrap();

        let source = WordlistSource::load(file.path()).unwrap();
        let queue = WorkQueue::new(8);
        assert_eq!(source.produce("example.com", &queue).await.unwrap(), 2);
    }
}
