mod error_sanitizer;
mod init_tracing;
mod request_id;
mod tracing_config;

pub use error_sanitizer::sanitize_error_message;
pub use init_tracing::init_tracing;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use tracing_config::TracingConfig;
