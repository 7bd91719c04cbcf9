//! Metadata service client
//!
//! The external metadata service is the system of record for schedules,
//! schedule events and addressables; this client covers the slice of its
//! API the scheduler needs: pulling the persisted sets at boot and pushing
//! locally-configured entries back.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::models::{Addressable, Schedule, ScheduleEvent};

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the metadata client
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Metadata service base URL (scheme://host:port)
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Retry count for failed requests
    pub retry_count: u32,

    /// Delay between retries
    pub retry_delay: Duration,
}

impl MetadataConfig {
    /// Create a new client config
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

// ============================================================================
// Metadata Client
// ============================================================================

/// Client for the external metadata service
pub struct MetadataClient {
    config: MetadataConfig,
    http: Client,
}

impl MetadataClient {
    /// Create a new metadata client
    pub fn new(config: MetadataConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Fetch all persisted schedules
    pub async fn schedules(&self) -> Result<Vec<Schedule>, ClientError> {
        let url = format!("{}/api/v1/schedule", self.config.base_url);
        self.get_with_retry(&url).await
    }

    /// Fetch all persisted schedule events
    pub async fn schedule_events(&self) -> Result<Vec<ScheduleEvent>, ClientError> {
        let url = format!("{}/api/v1/scheduleevent", self.config.base_url);
        self.get_with_retry(&url).await
    }

    /// Persist a schedule; returns the id assigned by metadata
    pub async fn add_schedule(&self, schedule: &Schedule) -> Result<String, ClientError> {
        let url = format!("{}/api/v1/schedule", self.config.base_url);
        self.post_with_retry(&url, schedule).await
    }

    /// Persist a schedule event; returns the id assigned by metadata
    pub async fn add_schedule_event(&self, event: &ScheduleEvent) -> Result<String, ClientError> {
        let url = format!("{}/api/v1/scheduleevent", self.config.base_url);
        self.post_with_retry(&url, event).await
    }

    /// Persist an addressable; returns the id assigned by metadata
    pub async fn add_addressable(&self, addressable: &Addressable) -> Result<String, ClientError> {
        let url = format!("{}/api/v1/addressable", self.config.base_url);
        self.post_with_retry(&url, addressable).await
    }

    /// Look up an addressable by name
    pub async fn addressable_for_name(&self, name: &str) -> Result<Addressable, ClientError> {
        let url = format!("{}/api/v1/addressable/name/{}", self.config.base_url, name);
        self.get_with_retry(&url).await
    }

    // Internal: GET request with retry
    async fn get_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.json::<T>().await {
                            Ok(data) => return Ok(data),
                            Err(e) => {
                                last_error = Some(ClientError::ParseError(e.to_string()));
                            }
                        }
                    } else if status == StatusCode::NOT_FOUND {
                        return Err(ClientError::NotFound(url.to_string()));
                    } else {
                        last_error = Some(ClientError::HttpError {
                            status: status.as_u16(),
                            message: response.text().await.unwrap_or_default(),
                        });
                        if status.is_client_error() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(ClientError::NetworkError(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::NetworkError("unknown error".to_string())))
    }

    // Internal: POST request with retry; the metadata service answers these
    // with the assigned id as a plain-text body
    async fn post_with_retry<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<String, ClientError> {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            match self.http.post(url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(id) => return Ok(id.trim().to_string()),
                            Err(e) => {
                                last_error = Some(ClientError::ParseError(e.to_string()));
                            }
                        }
                    } else {
                        last_error = Some(ClientError::HttpError {
                            status: status.as_u16(),
                            message: response.text().await.unwrap_or_default(),
                        });
                        if status.is_client_error() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(ClientError::NetworkError(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::NetworkError("unknown error".to_string())))
    }
}

// ============================================================================
// Client Errors
// ============================================================================

/// Metadata client errors
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Initialization error
    InitError(String),

    /// Network error
    NetworkError(String),

    /// Non-success HTTP status
    HttpError { status: u16, message: String },

    /// Response body could not be decoded
    ParseError(String),

    /// The requested entity does not exist in metadata
    NotFound(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitError(msg) => write!(f, "Initialization error: {msg}"),
            Self::NetworkError(msg) => write!(f, "Network error: {msg}"),
            Self::HttpError { status, message } => {
                write!(f, "HTTP error ({status}): {message}")
            }
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NotFound(what) => write!(f, "Not found in metadata: {what}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// True for the lookup-miss case callers branch on
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MetadataConfig::new("http://localhost:48081");
        assert_eq!(config.base_url, "http://localhost:48081");
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_builder() {
        let config = MetadataConfig::new("http://localhost:48081")
            .with_timeout(Duration::from_secs(30))
            .with_retry_count(5)
            .with_retry_delay(Duration::from_millis(100));

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_count, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_client_creation() {
        let client = MetadataClient::new(MetadataConfig::new("http://localhost:48081"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(ClientError::NotFound("x".to_string()).is_not_found());
        assert!(!ClientError::NetworkError("x".to_string()).is_not_found());
    }
}
