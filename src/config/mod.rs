//! Configuration module for Stencil
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use stencil::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("stencil.toml")).unwrap();
//! println!("Crawler will dispatch at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, Limit, OutputConfig, ProjectConfig, Strategy};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_keywords};
