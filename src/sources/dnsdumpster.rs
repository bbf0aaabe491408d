// src/sources/dnsdumpster.rs
use crate::queue::WorkQueue;
use crate::session::Session;
use crate::sources::Source;
use crate::types::{Candidate, SourceInfo, SubprobeError};
use async_trait::async_trait;
use log::debug;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, ORIGIN, REFERER};
use std::collections::HashSet;
use std::time::Duration;

/// dnsdumpster.com: scrapes hosts the service already knows about.
///
/// The service guards its query form with a CSRF token, so a query is a GET
/// of the homepage followed by a form POST carrying the token as both a
/// field and a cookie. Results are scraped from the HTML table, which makes
/// this source best-effort.
#[derive(Clone)]
pub struct DnsDumpsterSource {
    name: String,
    url: String,
    timeout: Duration,
    session: Session,
}

impl DnsDumpsterSource {
    pub fn new(session: Session, url: &str, timeout: Duration) -> Self {
        Self {
            name: "dnsdumpster".to_string(),
            url: url.to_string(),
            timeout,
            session,
        }
    }

    fn error(&self, message: impl Into<String>) -> SubprobeError {
        SubprobeError::SourceError {
            source_name: self.name.clone(),
            message: message.into(),
        }
    }

    async fn fetch_token(&self) -> Result<String, SubprobeError> {
        self.session.wait_for_rate_limit(&self.name).await;
        let page = self
            .session
            .get_text(&self.url, self.timeout)
            .await
            .map_err(|e| self.error(format!("Failed to load homepage: {}", e)))?;

        extract_csrf_token(&page).ok_or_else(|| self.error("CSRF token not found"))
    }

    async fn query(&self, domain: &str, token: &str) -> Result<String, SubprobeError> {
        let mut headers = HeaderMap::new();
        let header = |value: &str| {
            HeaderValue::from_str(value).map_err(|e| self.error(format!("Invalid header value: {}", e)))
        };
        headers.insert(ORIGIN, header(&self.url)?);
        headers.insert(REFERER, header(&self.url)?);
        headers.insert(COOKIE, header(&format!("csrftoken={}", token))?);

        let body = format!(
            "csrfmiddlewaretoken={}&targetip={}",
            urlencoding::encode(token),
            urlencoding::encode(domain)
        );

        self.session.wait_for_rate_limit(&self.name).await;
        self.session
            .post_form(&self.url, headers, body, self.timeout)
            .await
            .map_err(|e| self.error(format!("Query failed: {}", e)))
    }
}

#[async_trait]
impl Source for DnsDumpsterSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            required: false,
        }
    }

    async fn produce(&self, domain: &str, queue: &WorkQueue) -> Result<usize, SubprobeError> {
        let token = self.fetch_token().await?;
        debug!("{}: got CSRF token", self.name);

        let html = self.query(domain, &token).await?;
        let hosts = extract_hosts(&html, domain)?;

        let mut pushed = 0;
        for host in hosts {
            queue
                .push(Candidate::new(host))
                .await
                .map_err(|e| self.error(e.to_string()))?;
            pushed += 1;
        }
        Ok(pushed)
    }
}

fn extract_csrf_token(html: &str) -> Option<String> {
    let re = Regex::new(r#"csrfmiddlewaretoken[^>]*?value=['"]([^'"]+)['"]"#).ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Hosts listed as `col-md-4">LABEL.<domain><br>` in the result table, in
/// first-seen order.
fn extract_hosts(html: &str, domain: &str) -> Result<Vec<String>, SubprobeError> {
    let pattern = format!(r#"col-md-4">([A-Za-z0-9_.-]+?)\.{}<br>"#, regex::escape(domain));
    let re = Regex::new(&pattern).map_err(|e| SubprobeError::ParseError(format!("Regex error: {}", e)))?;

    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    for caps in re.captures_iter(html) {
        if let Some(label) = caps.get(1) {
            let host = format!("{}.{}", label.as_str().to_lowercase(), domain);
            if seen.insert(host.clone()) {
                hosts.push(host);
            }
        }
    }
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueItem;
    use crate::types::Config;
    use mockito::Matcher;

    const HOMEPAGE: &str = r#"<form method="post"><input type="hidden" name="csrfmiddlewaretoken" value="tok3n123"></form>"#;
    const RESULTS: &str = r#"
<tr><td class="col-md-4">www.example.com<br></td></tr>
<tr><td class="col-md-4">Mail.example.com<br></td></tr>
<tr><td class="col-md-4">www.example.com<br></td></tr>
<tr><td class="col-md-4">cdn.other.net<br></td></tr>
"#;

    #[test]
    fn test_extract_csrf_token() {
        assert_eq!(extract_csrf_token(HOMEPAGE).as_deref(), Some("tok3n123"));
        assert_eq!(extract_csrf_token("<html></html>"), None);
    }

    #[test]
    fn test_extract_hosts() {
        let hosts = extract_hosts(RESULTS, "example.com").unwrap();
        assert_eq!(hosts, vec!["www.example.com", "mail.example.com"]);
    }

    #[tokio::test]
    async fn test_produce_against_mock_service() {
        let mut server = mockito::Server::new_async().await;
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(HOMEPAGE)
            .create_async()
            .await;
        let query = server
            .mock("POST", "/")
            .match_header("cookie", "csrftoken=tok3n123")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("csrfmiddlewaretoken".into(), "tok3n123".into()),
                Matcher::UrlEncoded("targetip".into(), "example.com".into()),
            ]))
            .with_status(200)
            .with_body(RESULTS)
            .create_async()
            .await;

        let session = Session::new(&Config::default()).unwrap();
        let source = DnsDumpsterSource::new(session, &format!("{}/", server.url()), Duration::from_secs(5));
        let queue = WorkQueue::new(4);

        let pushed = source.produce("example.com", &queue).await.unwrap();
        assert_eq!(pushed, 2);
        query.assert_async().await;
        assert_eq!(
            queue.pop().await,
            Some(QueueItem::Candidate(Candidate::new("www.example.com")))
        );
    }

    #[tokio::test]
    async fn test_missing_token_is_source_error() {
        let mut server = mockito::Server::new_async().await;
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let session = Session::new(&Config::default()).unwrap();
        let source = DnsDumpsterSource::new(session, &format!("{}/", server.url()), Duration::from_secs(5));
        let queue = WorkQueue::new(4);

        let result = source.produce("example.com", &queue).await;
        assert!(matches!(result, Err(SubprobeError::SourceError { .. })));
        assert_eq!(queue.in_flight(), 0);
    }
}
