//! Configuration loaded from an optional TOML file.
//!
//! Every key has a default, so a missing file is the same as an empty one.
//! Command-line flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Bounds for `read_buffer_size`.
const MIN_READ_BUFFER: usize = 16;
const MAX_READ_BUFFER: usize = 65536;

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Control socket path. `None` picks a path under `$XDG_RUNTIME_DIR`.
    pub socket_path: Option<PathBuf>,
    /// Number of control clients that may be connected at once.
    pub max_clients: usize,
    /// Size of the single read performed per control message.
    pub read_buffer_size: usize,
    /// Emit JSON snapshots instead of text.
    pub json: bool,
    /// Print JSON on a single line instead of indented.
    pub compact: bool,
    /// Emit snapshots ordered by window id.
    pub sort: bool,
    /// Re-emit a snapshot after every compositor drain, even when nothing
    /// changed.
    pub emit_unchanged: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_clients: 1,
            read_buffer_size: 256,
            json: false,
            compact: false,
            sort: false,
            emit_unchanged: true,
        }
    }
}

impl Config {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and silently skipped when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => return Err(Error::ConfigNotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges, collecting every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.max_clients == 0 {
            errors.push("max_clients must be at least 1".to_string());
        }
        if !(MIN_READ_BUFFER..=MAX_READ_BUFFER).contains(&self.read_buffer_size) {
            errors.push(format!(
                "read_buffer_size must be between {} and {} (got {})",
                MIN_READ_BUFFER, MAX_READ_BUFFER, self.read_buffer_size
            ));
        }
        if let Some(path) = &self.socket_path
            && path.as_os_str().is_empty()
        {
            errors.push("socket_path must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(errors))
        }
    }
}

/// `$XDG_CONFIG_HOME/toplevelctl/config.toml`, falling back to `~/.config`.
pub fn default_path() -> Option<PathBuf> {
    let root = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .filter(|value| !value.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(root.join("toplevelctl").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str) -> PathBuf {
        let file = format!("toplevelctl-{}-{}.toml", name, std::process::id());
        std::env::temp_dir().join(file)
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = Config::from_toml("").expect("empty config parses");
        assert_eq!(config, Config::default());
        assert_eq!(config.max_clients, 1);
        assert_eq!(config.read_buffer_size, 256);
        assert!(config.emit_unchanged);
        assert!(!config.compact);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            socket_path = "/run/user/1000/wlr.sock"
            max_clients = 4
            sort = true
            "#,
        )
        .expect("config parses");

        assert_eq!(
            config.socket_path.as_deref(),
            Some(Path::new("/run/user/1000/wlr.sock"))
        );
        assert_eq!(config.max_clients, 4);
        assert!(config.sort);
        assert!(!config.json);
        assert_eq!(config.read_buffer_size, 256);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Config::from_toml("colour = \"red\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_validation_collects_every_error() {
        let err = Config::from_toml("max_clients = 0\nread_buffer_size = 1").unwrap_err();
        match err {
            Error::ConfigValidation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let path = temp_config("missing");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(p) if p == path));
    }

    #[test]
    fn test_load_reads_file() {
        let path = temp_config("load");
        let contents = "json = true\ncompact = true\nemit_unchanged = false\n";
        fs::write(&path, contents).expect("write config");

        let config = Config::load(Some(&path));
        let _ = fs::remove_file(&path);

        let config = config.expect("config loads");
        assert!(config.json);
        assert!(config.compact);
        assert!(!config.emit_unchanged);
    }
}
