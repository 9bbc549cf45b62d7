//! DashScope asynchronous task API.
//!
//! Jobs are submitted with `X-DashScope-Async: enable` and answered with a
//! task id under `output.task_id`; status is read from `GET {task_url}/{id}`.

use super::{GenerationJob, ProviderError, VideoProvider};
use crate::config::InferenceConfig;
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;

const ASYNC_HEADER: &str = "X-DashScope-Async";

pub struct DashScopeProvider {
    config: InferenceConfig,
    client: Client,
}

impl DashScopeProvider {
    pub fn new(config: InferenceConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "DashScope API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn submit_body<'a>(&'a self, job: &'a GenerationJob) -> SubmitRequest<'a> {
        SubmitRequest {
            model: &self.config.model,
            input: SubmitInput {
                image_url: &job.image_url,
                video_url: &job.video_url,
            },
            parameters: SubmitParameters {
                mode: &self.config.mode,
            },
        }
    }

    /// `{task_url}/{task_id}` with the id percent-encoded as a single segment.
    fn task_url(&self, task_id: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.config.task_url).map_err(|e| {
            ProviderError::NotConfigured(format!("invalid task URL '{}': {}", self.config.task_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "task URL '{}' cannot take a path",
                    self.config.task_url
                ))
            })?
            .pop_if_empty()
            .push(task_id);
        Ok(url)
    }

    fn send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(format!(
                "inference API timed out after {}s",
                self.config.timeout_secs
            ))
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }

    async fn read_body(&self, response: Response) -> Result<bytes::Bytes, ProviderError> {
        response.bytes().await.map_err(|e| self.send_error(e))
    }

    /// JSON when the provider says so, raw text otherwise.
    async fn error_payload(&self, response: Response) -> Result<serde_json::Value, ProviderError> {
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        let raw = self.read_body(response).await?;
        Ok(error_payload(is_json, &raw))
    }
}

#[async_trait]
impl VideoProvider for DashScopeProvider {
    async fn submit(
        &self,
        job: &GenerationJob,
        request_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = self.submit_body(job);

        tracing::info!(
            url = %self.config.api_url,
            model = %self.config.model,
            image_url = %job.image_url,
            video_url = %job.video_url,
            "Submitting generation task"
        );

        let response = self
            .client
            .traced_post(&self.config.api_url)
            .header(ASYNC_HEADER, "enable")
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .request_id(request_id)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        tracing::debug!(status = %status, "Inference API responded to submission");

        if status != StatusCode::OK {
            let payload = self.error_payload(response).await?;
            tracing::warn!(status = %status, payload = %payload, "Task submission rejected");
            return Err(ProviderError::Upstream {
                status,
                message: "inference API request failed".to_string(),
                body: payload,
            });
        }

        let raw = self.read_body(response).await?;
        let parsed: SubmitResponse = serde_json::from_slice(&raw)
            .map_err(|e| ProviderError::InvalidResponse(format!("submission response: {}", e)))?;

        let task_id = parsed
            .output
            .and_then(|output| output.task_id)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("submission response has no output.task_id".to_string())
            })?;

        tracing::info!(task_id = %task_id, "Generation task submitted");
        Ok(task_id)
    }

    async fn task_status(
        &self,
        task_id: &str,
        request_id: Option<&str>,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = self.task_url(task_id)?;

        let response = self
            .client
            .traced_get(url.as_str())
            .bearer_auth(&self.config.api_key)
            .request_id(request_id)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let payload = self.error_payload(response).await?;
            tracing::warn!(task_id = %task_id, status = %status, "Task status query failed");
            return Err(ProviderError::Upstream {
                status,
                message: format!("status query failed: {}", status.as_u16()),
                body: payload,
            });
        }

        let raw = self.read_body(response).await?;
        let parsed: StatusResponse = serde_json::from_slice(&raw)
            .map_err(|e| ProviderError::InvalidResponse(format!("status response: {}", e)))?;

        Ok(parsed
            .output
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())))
    }
}

fn error_payload(is_json: bool, raw: &[u8]) -> serde_json::Value {
    if is_json {
        if let Ok(value) = serde_json::from_slice(raw) {
            return value;
        }
    }
    serde_json::Value::String(String::from_utf8_lossy(raw).into_owned())
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    model: &'a str,
    input: SubmitInput<'a>,
    parameters: SubmitParameters<'a>,
}

#[derive(Debug, Serialize)]
struct SubmitInput<'a> {
    image_url: &'a str,
    video_url: &'a str,
}

#[derive(Debug, Serialize)]
struct SubmitParameters<'a> {
    mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    output: Option<SubmitOutput>,
}

#[derive(Debug, Deserialize)]
struct SubmitOutput {
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    output: Option<serde_json::Value>,
}
