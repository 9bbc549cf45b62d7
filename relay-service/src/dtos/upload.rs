use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Public URL of the stored object.
    pub url: String,
    /// Generated object key, `{uuid}{.ext}`.
    pub filename: String,
}
