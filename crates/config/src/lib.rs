//! Layered settings for the catalog engine: built-in defaults, then a
//! TOML/YAML/JSON file, then `JDB_` environment variables.

pub mod error;
mod settings;

pub use crate::settings::{ENV_PREFIX, LoginConfig, Settings, default_cookie_file};
