pub mod files;
pub mod generation;
pub mod health;
pub mod upload;

pub use files::get_file;
pub use generation::{check_status, generate_video};
pub use health::{health_check, metrics_endpoint};
pub use upload::upload_file;
