//! Harness configuration.
//!
//! Values are layered: an optional JSON file, then environment variables,
//! then per-workflow validation once the workflow to run is known.

mod io;
mod model;
mod validation;

pub use io::{CONFIG_PATH_ENV, apply_env_overrides, default_config_path, load_config, load_config_file};
pub use model::{ConfigError, ConfigFile, ContractSettings, Contracts, DEFAULT_ACCOUNTS_PATH, HarnessConfig, vars};
pub use validation::{ValidationError, require, validate_config, validate_proposal_value};
