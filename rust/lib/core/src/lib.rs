pub mod config;
pub mod error;
pub mod types;

pub use config::{ServiceConfig, load_toml};
pub use error::ServiceError;
pub use types::{ListParams, ListResult, merge_patch, new_id, now_rfc3339};
