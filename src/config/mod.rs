// src/config/mod.rs

//! Schedule files.
//!
//! - [`model`] defines the TOML-backed data model.
//! - [`loader`] reads a file from disk.
//! - [`validate`] turns a raw file into a validated [`ConfigFile`] with its
//!   dependency graph.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, DefaultSection, RawConfigFile, TaskConfig};
