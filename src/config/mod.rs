//! Configuration module for ajum-index
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file, and layering command line options on top of it.
//!
//! # Example
//!
//! ```no_run
//! use ajum_index::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ajum.toml")).unwrap();
//! println!("Waiting {}s between requests", config.client.timer);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClientConfig, Config, Overrides, PathsConfig, WorkersConfig, DEFAULT_BASE_URL, DEFAULT_FROM,
    DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
