//! Utility helpers shared by the API client, the engine, and the CLI.

pub mod http;
pub mod interpolation;
pub mod json;
pub mod path_processing;
pub mod text_processing;

pub use interpolation::{InterpolationError, interpolate_string};
pub use json::{first_scalar_by_keys, get_case_insensitive, has_data, scalar_to_string};
pub use path_processing::{config_file_path, expand_tilde};
pub use text_processing::{redact_sensitive, redact_sensitive_with};
