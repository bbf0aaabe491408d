// src/session.rs
use crate::types::{Config, SubprobeError};
use governor::{Jitter, Quota};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// HTTP client shared by the aggregator source and the liveness prober.
#[derive(Clone)]
pub struct Session {
    pub client: Client,
    rate_limiters: Arc<HashMap<String, Arc<governor::DefaultDirectRateLimiter>>>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self, SubprobeError> {
        // Per-request timeouts are set by callers: 3s probes, 60s aggregator POST.
        let mut client_builder = Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| SubprobeError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| SubprobeError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let mut rate_limiters = HashMap::new();
        for (key, rate_limit) in &config.rate_limits {
            if let Some(limit) = rate_limit.and_then(NonZeroU32::new) {
                let quota = Quota::per_second(limit).allow_burst(limit);
                rate_limiters.insert(key.clone(), Arc::new(governor::RateLimiter::direct(quota)));
            }
        }

        Ok(Session {
            client,
            rate_limiters: Arc::new(rate_limiters),
        })
    }

    pub async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, SubprobeError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SubprobeError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SubprobeError::NetworkError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| SubprobeError::NetworkError(e.to_string()))
    }

    pub async fn post_form(
        &self,
        url: &str,
        headers: HeaderMap,
        body: String,
        timeout: Duration,
    ) -> Result<String, SubprobeError> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SubprobeError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SubprobeError::NetworkError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| SubprobeError::NetworkError(e.to_string()))
    }

    /// Wait for the limiter registered under `key`, if any.
    pub async fn wait_for_rate_limit(&self, key: &str) {
        if let Some(limiter) = self.rate_limiters.get(key) {
            limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;
        }
    }
}
