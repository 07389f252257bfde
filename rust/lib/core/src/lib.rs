pub mod config;
pub mod error;
pub mod types;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use types::{format_timestamp, names_are_similar, normalize_name, normalize_timestamp, now_rfc3339};
