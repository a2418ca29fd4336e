use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::mapping::Button;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}", .path.display())]
    #[diagnostic(code(pedal_mapper::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in {}", .path.display())]
    #[diagnostic(code(pedal_mapper::config::parse_error))]
    ParseError {
        path: PathBuf,
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(pedal_mapper::config::invalid))]
    Invalid { message: String },

    #[error("Unresolved key symbol '{symbol}' in {}", .button.config_key())]
    #[diagnostic(
        code(pedal_mapper::config::unresolved_key),
        help("use a name like \"RightMeta\", \"F13\" or a raw kernel name like \"KEY_RIGHTMETA\"")
    )]
    UnresolvedKeySymbol { symbol: String, button: Button },
}
