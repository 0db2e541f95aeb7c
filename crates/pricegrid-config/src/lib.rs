//! Configuration system for the pricegrid client.
//!
//! Provides TOML-based configuration with:
//! - Pricing service connection settings (`[server]`)
//! - Default search parameters (`[search]`)
//! - Prefetch and matrix behavior (`[prefetch]`, `[matrix]`)
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigSource, LoadedConfig, PROJECT_CONFIG_FILE, USER_CONFIG_FILE,
    load_config, load_config_file, load_config_with_options, log_dir, save_config,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
