//! Mock publisher for testing
//!
//! Configurable success, failure, and latency so coordinator tests can
//! exercise every publish outcome without credentials or network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PublishError, Result};
use crate::publisher::Publisher;
use crate::types::Draft;

/// Configuration for mock publisher behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Whether publishing should succeed
    pub publish_succeeds: bool,

    /// Error to return on publish failure
    pub publish_error: Option<PublishError>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Whether the publisher reports itself as configured
    pub is_configured: bool,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Drafts that have been published (for verification)
    pub published: Arc<Mutex<Vec<Draft>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            publish_succeeds: true,
            publish_error: None,
            delay: Duration::from_millis(0),
            is_configured: true,
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock publisher for testing
pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock publisher that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock publisher that fails every publish
    pub fn failure(error: PublishError) -> Self {
        Self::new(MockConfig {
            publish_succeeds: false,
            publish_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock publisher with a delay
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Get the number of times publish was called
    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    /// Get all drafts that were published
    pub fn published(&self) -> Vec<Draft> {
        self.config.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, draft: &Draft) -> Result<String> {
        *self.config.publish_call_count.lock().unwrap() += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.publish_succeeds {
            self.config.published.lock().unwrap().push(draft.clone());
            Ok(format!("mock-{}", uuid::Uuid::new_v4()))
        } else {
            let error = self
                .config
                .publish_error
                .clone()
                .unwrap_or_else(|| PublishError::Network("mock publish failed".to_string()));
            Err(error.into())
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured
    }
}
