// src/probe.rs
use crate::session::Session;
use crate::types::{ProbeStatus, SubprobeError};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use url::Url;

/// Root-path liveness check for a resolved name.
#[async_trait]
pub trait Probe: Send + Sync {
    /// `Err` only when no request could be built for `host`; unreachable
    /// hosts yield `ProbeStatus::Unreachable`.
    async fn probe(&self, host: &str) -> Result<ProbeStatus, SubprobeError>;
}

pub struct HttpProber {
    session: Session,
    timeout: Duration,
}

enum Attempt {
    Status(u16),
    Failed(String),
    Invalid(String),
}

impl HttpProber {
    pub const RATE_LIMIT_KEY: &'static str = "probe";

    pub fn new(session: Session, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    async fn get(&self, scheme: &str, host: &str) -> Attempt {
        let url = match Url::parse(&format!("{}://{}/", scheme, host)) {
            Ok(url) => url,
            Err(e) => return Attempt::Invalid(format!("Invalid URL {}://{}/: {}", scheme, host, e)),
        };

        self.session.wait_for_rate_limit(Self::RATE_LIMIT_KEY).await;

        match self.session.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => Attempt::Status(response.status().as_u16()),
            Err(e) if e.is_builder() => Attempt::Invalid(e.to_string()),
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, host: &str) -> Result<ProbeStatus, SubprobeError> {
        match self.get("http", host).await {
            Attempt::Status(code) => return Ok(ProbeStatus::Code(code)),
            Attempt::Invalid(message) => return Err(SubprobeError::ProbeError(message)),
            Attempt::Failed(reason) => debug!("http://{}/ failed: {}", host, reason),
        }

        match self.get("https", host).await {
            Attempt::Status(code) => Ok(ProbeStatus::Code(code)),
            Attempt::Invalid(message) => Err(SubprobeError::ProbeError(message)),
            Attempt::Failed(reason) => {
                debug!("https://{}/ failed: {}", host, reason);
                Ok(ProbeStatus::Unreachable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    fn prober() -> HttpProber {
        let session = Session::new(&Config::default()).unwrap();
        HttpProber::new(session, Duration::from_secs(3))
    }

    #[tokio::test]
    async fn test_reports_plain_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;

        let status = prober().probe(&server.host_with_port()).await.unwrap();
        assert_eq!(status, ProbeStatus::Code(404));
        assert_eq!(status.to_string(), "404");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_question_mark() {
        // Nothing listens on port 9 of localhost in the test environment.
        let status = prober().probe("127.0.0.1:9").await.unwrap();
        assert_eq!(status, ProbeStatus::Unreachable);
        assert_eq!(status.to_string(), "?");
    }

    #[tokio::test]
    async fn test_invalid_host_is_terminal_error() {
        let result = prober().probe("exa mple.com").await;
        assert!(matches!(result, Err(SubprobeError::ProbeError(_))));
    }
}
