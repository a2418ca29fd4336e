//! Configuration parsing for pedal-mapper
//!
//! This crate loads the layered JSON configuration (a required default file
//! with an optional user override merged over it) and resolves it into
//! per-button key combinations.

mod error;
mod keys;
mod mapping;
mod model;
mod parser;

pub use error::ConfigError;
pub use keys::resolve_key;
pub use mapping::{parse_mapping, Button, ButtonMapping, KeyCombo, MapperSettings};
pub use model::*;
pub use parser::{
    expand_path, load_layered, parse_config, parse_config_str, DEFAULT_CONFIG_PATH,
    USER_CONFIG_PATH,
};
