//! Page retrieval
//!
//! This module handles:
//! - The `PageSource` seam between the crawler and whatever renders pages
//! - Building the HTTP client from configuration
//! - User agent rotation across requests
//! - Error classification (status, timeout, network)

use crate::config::HttpConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Something that returns the rendered HTML of a URL
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url` and returns its HTML body
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageSource` backed by a plain HTTP client
pub struct HttpPageSource {
    client: Client,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
}

impl HttpPageSource {
    /// Creates a page source from the HTTP configuration
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        let user_agents = config
            .user_agents
            .iter()
            .filter(|ua| !ua.trim().is_empty())
            .cloned()
            .collect();

        Ok(Self {
            client,
            user_agents,
            next_agent: AtomicUsize::new(0),
        })
    }

    /// Picks the next user agent, round-robin
    fn user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        Some(&self.user_agents[index])
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        if let Some(agent) = self.user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify_error(url, e))
    }
}

/// Maps a reqwest error onto a `FetchError`
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_rotation() {
        let config = HttpConfig {
            user_agents: vec!["agent-a".to_string(), " ".to_string(), "agent-b".to_string()],
            ..HttpConfig::default()
        };
        let source = HttpPageSource::new(&config).unwrap();

        assert_eq!(source.user_agent(), Some("agent-a"));
        assert_eq!(source.user_agent(), Some("agent-b"));
        assert_eq!(source.user_agent(), Some("agent-a"));
    }

    #[test]
    fn test_not_found_classification() {
        let err = FetchError::Status {
            url: "https://a.example/page/9/".to_string(),
            status: 404,
        };
        assert!(err.is_not_found());

        let err = FetchError::Status {
            url: "https://a.example/".to_string(),
            status: 500,
        };
        assert!(!err.is_not_found());
    }

    // Request/response behavior is covered with wiremock in the integration tests
}
