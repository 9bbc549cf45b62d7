//! Video generation provider abstraction.
//!
//! A provider accepts an image + video pair, returns an opaque task id, and
//! answers status queries for that id. The relay never interprets either.

pub mod dashscope;

use async_trait::async_trait;
use reqwest::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The provider answered with a non-success status.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        body: serde_json::Value,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream {
                status,
                message,
                body,
            } => AppError::Upstream {
                status,
                message,
                details: Some(body),
            },
            ProviderError::Timeout(msg) => AppError::GatewayTimeout(msg),
            other => AppError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// An image-to-video job: animate the person in `image_url` with the motion of `video_url`.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub image_url: String,
    pub video_url: String,
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Submit a job, returning the provider's task id.
    async fn submit(
        &self,
        job: &GenerationJob,
        request_id: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Fetch the `output` section of a task's status.
    async fn task_status(
        &self,
        task_id: &str,
        request_id: Option<&str>,
    ) -> Result<serde_json::Value, ProviderError>;
}
