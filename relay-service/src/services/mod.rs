pub mod local_files;
pub mod metrics;
pub mod providers;
pub mod storage;

pub use local_files::LocalFiles;
pub use metrics::{get_metrics, init_metrics};
pub use providers::dashscope::DashScopeProvider;
pub use providers::{GenerationJob, ProviderError, VideoProvider};
pub use storage::{ObjectStorage, Storage, StorageError};
