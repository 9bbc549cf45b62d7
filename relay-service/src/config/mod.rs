use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_parsed};
use service_core::error::AppError;
use std::time::Duration;

const DEFAULT_API_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/image2video/video-synthesis";
const DEFAULT_TASK_URL: &str = "https://dashscope.aliyuncs.com/api/v1/tasks";
const DEFAULT_MODEL: &str = "wan2.2-animate-mix";
const DEFAULT_MODE: &str = "wan-std";
const DEFAULT_OSS_ENDPOINT: &str = "https://oss-cn-beijing.aliyuncs.com";
/// 100 MiB.
const DEFAULT_MAX_FILE_SIZE: &str = "104857600";
const DEFAULT_ALLOWED_EXTENSIONS: &str = ".jpg,.jpeg,.png,.bmp,.webp,.mp4,.avi,.mov";

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub inference: InferenceConfig,
    pub object_store: ObjectStoreConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub api_key: String,
    /// Task submission endpoint.
    pub api_url: String,
    /// Base URL for task status queries; the task id is appended.
    pub task_url: String,
    pub model: String,
    pub mode: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_file_size: usize,
    /// Lowercased, each with a leading dot.
    pub allowed_extensions: Vec<String>,
    pub local_dir: String,
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = core_config::is_production();

        let endpoint = get_env("OSS_ENDPOINT", Some(DEFAULT_OSS_ENDPOINT), is_prod)?;
        let region = match std::env::var("OSS_REGION") {
            Ok(region) => region,
            Err(_) => region_from_endpoint(&endpoint),
        };

        Ok(RelayConfig {
            common: common_config,
            inference: InferenceConfig {
                api_key: get_env("DASHSCOPE_API_KEY", None, is_prod)?,
                api_url: get_env("DASHSCOPE_API_URL", Some(DEFAULT_API_URL), is_prod)?,
                task_url: get_env("DASHSCOPE_TASK_URL", Some(DEFAULT_TASK_URL), is_prod)?,
                model: get_env("DASHSCOPE_MODEL", Some(DEFAULT_MODEL), is_prod)?,
                mode: get_env("DASHSCOPE_MODE", Some(DEFAULT_MODE), is_prod)?,
                timeout_secs: get_env_parsed("INFERENCE_TIMEOUT_SECS", Some("60"), is_prod)?,
            },
            object_store: ObjectStoreConfig {
                access_key_id: get_env("OSS_ACCESS_KEY_ID", None, is_prod)?,
                access_key_secret: get_env("OSS_ACCESS_KEY_SECRET", None, is_prod)?,
                endpoint,
                bucket: get_env("OSS_BUCKET_NAME", None, is_prod)?,
                region,
                timeout_secs: get_env_parsed("OSS_TIMEOUT_SECS", Some("120"), is_prod)?,
            },
            upload: UploadConfig {
                max_file_size: get_env_parsed(
                    "MAX_FILE_SIZE",
                    Some(DEFAULT_MAX_FILE_SIZE),
                    is_prod,
                )?,
                allowed_extensions: parse_extensions(&get_env(
                    "ALLOWED_EXTENSIONS",
                    Some(DEFAULT_ALLOWED_EXTENSIONS),
                    is_prod,
                )?),
                local_dir: get_env("UPLOAD_FOLDER", Some("uploads"), is_prod)?,
            },
        })
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ObjectStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint host without scheme or trailing slash, e.g. `oss-cn-beijing.aliyuncs.com`.
    pub fn endpoint_host(&self) -> &str {
        strip_scheme(&self.endpoint)
    }
}

impl UploadConfig {
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed == extension)
    }
}

/// Split a comma separated list into normalised `.ext` entries.
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty() && ext != ".")
        .map(|ext| {
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect()
}

fn strip_scheme(endpoint: &str) -> &str {
    let endpoint = endpoint.trim();
    let endpoint = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    endpoint.trim_end_matches('/')
}

/// OSS endpoints are named after their region (`oss-cn-beijing.aliyuncs.com`).
fn region_from_endpoint(endpoint: &str) -> String {
    strip_scheme(endpoint)
        .split('.')
        .next()
        .filter(|label| !label.is_empty())
        .unwrap_or("us-east-1")
        .to_string()
}
