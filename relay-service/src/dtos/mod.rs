pub mod generation;
pub mod upload;

pub use generation::{GenerateRequest, GenerateResponse, TaskStatusResponse};
pub use upload::UploadResponse;
