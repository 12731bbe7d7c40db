//! Configuration management for the work-plan engine.
//! This module handles parsing, interpolation, and validation of the
//! ~/.config/labelplan/config.json configuration file.

mod io;
mod model;
mod validation;

pub use io::{API_BASE_ENV, API_TOKEN_ENV, CONFIG_PATH_ENV, default_config_path, interpolate_config, load_config, load_config_from_path};
pub use model::{ApiConfig, ConfigError, LabelPlanConfig, WorkPlanSettings};
pub use validation::{validate_config, validate_settings};
