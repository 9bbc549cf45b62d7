use serde::{Deserialize, Serialize};

/// Both fields are optional here so a missing one is reported as a 400 by the
/// handler rather than as a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl GenerateRequest {
    /// Both URLs, if present and non-empty.
    pub fn urls(&self) -> Option<(&str, &str)> {
        let image_url = self.image_url.as_deref().filter(|s| !s.is_empty())?;
        let video_url = self.video_url.as_deref().filter(|s| !s.is_empty())?;
        Some((image_url, video_url))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub task_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub success: bool,
    pub data: serde_json::Value,
}
