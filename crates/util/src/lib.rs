//! Daoscript utility functions and helpers.

pub mod path_processing;
pub mod text_processing;

pub use path_processing::{default_config_path, expand_tilde};
pub use text_processing::{redact_sensitive, redact_sensitive_with, truncate_for_summary};
