//! Layered JSON configuration loading

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::PedalConfig;

/// System-wide configuration layer, always loaded
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pedal-mapper/config.json";

/// Per-user override layer, loaded only if it exists
pub const USER_CONFIG_PATH: &str = "~/.config/pedal-mapper/config.json";

/// Convert a 1-indexed line and column into a byte offset into `source`
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();

    let line_text = source[line_start..].split('\n').next().unwrap_or("");
    let within_line = line_text
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(line_text.len());

    line_start + within_line
}

/// Parse a single configuration layer from a string.
///
/// `path` is only used to label errors.
pub fn parse_config_str(content: &str, path: &Path) -> Result<PedalConfig, ConfigError> {
    let config: PedalConfig = serde_json::from_str(content).map_err(|e| {
        let offset = line_col_to_offset(content, e.line(), e.column());
        ConfigError::ParseError {
            path: path.to_path_buf(),
            src: content.to_string(),
            span: miette::SourceSpan::from((offset, 0)),
            source: e,
        }
    })?;

    for key in config.unknown.keys() {
        tracing::warn!("Unknown configuration key '{}' in {}", key, path.display());
    }

    Ok(config)
}

/// Read and parse one configuration layer
pub fn parse_config(path: &Path) -> Result<PedalConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content, path)
}

/// Load the default layer and shallow-merge the user layer over it.
///
/// The default layer is required. A missing user layer is not an error;
/// any other failure to read it is.
pub fn load_layered(default_path: &Path, user_path: &Path) -> Result<PedalConfig, ConfigError> {
    tracing::info!("Loading default configuration from {}", default_path.display());
    let base = parse_config(default_path)?;

    let content = match std::fs::read_to_string(user_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No user configuration at {}", user_path.display());
            return Ok(base);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: user_path.to_path_buf(),
                source,
            })
        }
    };

    tracing::info!("Applying user configuration from {}", user_path.display());
    let overlay = parse_config_str(&content, user_path)?;
    Ok(base.merge(overlay))
}

/// Expand `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;
    use crate::model::ComboSpec;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_basic_config() {
        let config = r#"
            {
                "left_keys": [],
                "middle_keys": [{ "mods": ["RIGHTMETA"], "keys": ["F13"] }],
                "right_keys": [{ "mods": ["RIGHTSHIFT", "RIGHTMETA"], "keys": ["F13"] }],
                "polling_rate": 10
            }
        "#;

        let result = parse_config_str(config, Path::new("test.json")).unwrap();
        assert_eq!(result.left_keys, Some(Vec::new()));
        assert_eq!(result.polling_rate, Some(10));
        assert_eq!(
            result.right_keys.unwrap()[0],
            ComboSpec {
                mods: vec!["RIGHTSHIFT".to_string(), "RIGHTMETA".to_string()],
                keys: vec!["F13".to_string()],
            }
        );
    }

    #[test]
    fn test_syntax_error_has_span() {
        let config = "{\n  \"polling_rate\": 10,\n  oops\n}";

        let err = parse_config_str(config, Path::new("broken.json")).unwrap_err();
        match err {
            ConfigError::ParseError { path, span, src, .. } => {
                assert_eq!(path, PathBuf::from("broken.json"));
                assert_eq!(src, config);
                // The error is reported on line 3, where `oops` starts
                let line3 = config.find("oops").unwrap();
                assert!(
                    span.offset() >= line3 && span.offset() <= line3 + 4,
                    "span offset {} should point into `oops` at {}",
                    span.offset(),
                    line3
                );
            }
            other => panic!("Expected ParseError, got: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let config = r#"{ "polling_rate": "fast" }"#;
        let result = parse_config_str(config, Path::new("test.json"));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_negative_polling_rate_is_parse_error() {
        let config = r#"{ "polling_rate": -5 }"#;
        let result = parse_config_str(config, Path::new("test.json"));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_line_col_to_offset() {
        let source = "ab\ncde\nf";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 3);
        assert_eq!(line_col_to_offset(source, 2, 3), 5);
        assert_eq!(line_col_to_offset(source, 3, 1), 7);
        // Past the end of a line clamps to its end
        assert_eq!(line_col_to_offset(source, 1, 10), 2);
    }

    #[test]
    fn test_load_layered_merges_user_over_default() {
        let dir = TempDir::new().unwrap();
        let default = write_file(
            &dir,
            "default.json",
            r#"{"polling_rate": 10, "middle_keys": [{"mods": ["RIGHTMETA"], "keys": ["F13"]}]}"#,
        );
        let user = write_file(&dir, "user.json", r#"{"polling_rate": 5}"#);

        let merged = load_layered(&default, &user).unwrap();
        assert_eq!(merged.polling_rate, Some(5));
        assert_eq!(merged.middle_keys.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_load_layered_missing_user_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let default = write_file(&dir, "default.json", r#"{"polling_rate": 7}"#);

        let merged = load_layered(&default, &dir.path().join("absent.json")).unwrap();
        assert_eq!(merged.polling_rate, Some(7));
    }

    #[test]
    fn test_load_layered_missing_default_file_fails() {
        let dir = TempDir::new().unwrap();
        let user = write_file(&dir, "user.json", r#"{"polling_rate": 5}"#);

        match load_layered(&dir.path().join("absent.json"), &user) {
            Err(ConfigError::Io { path, source }) => {
                assert!(path.ends_with("absent.json"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_layered_unreadable_user_path_fails() {
        let dir = TempDir::new().unwrap();
        let default = write_file(&dir, "default.json", r#"{"polling_rate": 10}"#);
        // Reading through a regular file fails with ENOTDIR, not NotFound
        let user = write_file(&dir, "user.json", "{}").join("config.json");

        match load_layered(&default, &user) {
            Err(ConfigError::Io { path, source }) => {
                assert_eq!(path, user);
                assert_ne!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_layered_user_directory_fails() {
        let dir = TempDir::new().unwrap();
        let default = write_file(&dir, "default.json", r#"{"polling_rate": 10}"#);
        let user = dir.path().join("user.json");
        std::fs::create_dir(&user).unwrap();

        let result = load_layered(&default, &user);
        assert!(matches!(result, Err(ConfigError::Io { .. })), "{:?}", result);
    }

    #[test]
    fn test_load_layered_broken_user_file_fails() {
        let dir = TempDir::new().unwrap();
        let default = write_file(&dir, "default.json", r#"{"polling_rate": 10}"#);
        let user = write_file(&dir, "user.json", r#"{"polling_rate": }"#);

        let result = load_layered(&default, &user);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_shipped_default_config_parses() {
        let content = include_str!("../../../config/default.json");
        let config = parse_config_str(content, Path::new("config/default.json")).unwrap();
        assert_eq!(config.polling_rate, Some(10));
        assert!(config.unknown.is_empty());
        assert_eq!(config.middle_keys.map(|c| c.len()), Some(1));
        assert_eq!(config.right_keys.map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_tilde_expansion() {
        let path = expand_path(USER_CONFIG_PATH);
        let path_str = path.to_string_lossy();
        assert!(!path_str.starts_with('~'), "Tilde should be expanded, but got: {}", path_str);
        assert!(path_str.ends_with("/.config/pedal-mapper/config.json"));
    }

    #[test]
    fn test_absolute_path_unchanged() {
        assert_eq!(expand_path(DEFAULT_CONFIG_PATH), PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
