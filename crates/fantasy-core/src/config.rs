// Configuration loading and parsing (fantasy.toml).

use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Price;

pub const CONFIG_FILE: &str = "fantasy.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// fantasy.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub game: GameConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` overrides it.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "fantasy_server=info,fantasy_core=info,warn".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Starting budget of a new fantasy team, in tenths of a million.
    pub initial_budget: u32,
}

impl GameConfig {
    pub fn initial_budget(&self) -> Price {
        Price::from_tenths(self.initial_budget)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate `config/fantasy.toml` relative to `base_dir`.
///
/// Does not seed from `defaults/`; prefer `load_config()` for that.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound { path: path.clone() },
        _ => ConfigError::Io {
            path: path.clone(),
            source: e,
        },
    })?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Copy `defaults/fantasy.toml` to `config/fantasy.toml` unless the latter
/// already exists. Returns the written path, or `None` when nothing was
/// copied. Without a shipped default an existing config is still accepted.
pub fn seed_config(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE);

    if target.exists() {
        return Ok(None);
    }
    if !source.exists() {
        return Err(ConfigError::FileNotFound { path: target });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::Io {
        path: config_dir.clone(),
        source: e,
    })?;
    std::fs::copy(&source, &target).map_err(|e| ConfigError::Io {
        path: target.clone(),
        source: e,
    })?;
    Ok(Some(target))
}

/// Load config relative to the current working directory, seeding it from
/// `defaults/` on first run.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: PathBuf::from("."),
        source: e,
    })?;
    seed_config(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0"));
    }
    if config.database.path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }
    if config.game.initial_budget == 0 {
        return Err(invalid("game.initial_budget", "must be greater than 0"));
    }

    let p = &config.pagination;
    if p.default_limit == 0 {
        return Err(invalid("pagination.default_limit", "must be greater than 0"));
    }
    if p.default_limit > p.max_limit {
        return Err(invalid(
            "pagination.default_limit",
            format!(
                "must not exceed pagination.max_limit ({}), got {}",
                p.max_limit, p.default_limit
            ),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root, located from this crate's manifest directory.
    fn project_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .find(|dir| dir.join("defaults").join(CONFIG_FILE).exists())
            .map(Path::to_path_buf)
            .expect("cannot locate defaults/fantasy.toml")
    }

    /// Fresh temp dir with `config/fantasy.toml` containing `body`.
    fn config_dir_with(name: &str, body: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), body).unwrap();
        tmp
    }

    const VALID: &str = r#"
[server]
port = 9100

[database]
path = "fantasy.db"

[game]
initial_budget = 1000
"#;

    #[test]
    fn load_valid_config_from_project_defaults() {
        let tmp = std::env::temp_dir().join("fantasy_config_test_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults").join(CONFIG_FILE),
            tmp.join("config").join(CONFIG_FILE),
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("defaults should load");
        assert!(config.server.port > 0);
        assert_eq!(config.game.initial_budget(), Price(1000));
        assert!(config.pagination.default_limit <= config.pagination.max_limit);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_sections_use_defaults() {
        let tmp = config_dir_with("fantasy_config_test_optional", VALID);
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.pagination.max_limit, 100);
        assert_eq!(
            config.logging.filter,
            "fantasy_server=info,fantasy_core=info,warn"
        );
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_budget() {
        let body = VALID.replace("initial_budget = 1000", "initial_budget = 0");
        let tmp = config_dir_with("fantasy_config_test_zero_budget", &body);
        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "game.initial_budget");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_default_limit_above_max() {
        let body = format!("{VALID}\n[pagination]\ndefault_limit = 50\nmax_limit = 10\n");
        let tmp = config_dir_with("fantasy_config_test_limits", &body);
        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().contains("pagination.default_limit"));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_db_path() {
        let body = VALID.replace("path = \"fantasy.db\"", "path = \"  \"");
        let tmp = config_dir_with("fantasy_config_test_db_path", &body);
        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "database.path"));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = std::env::temp_dir().join("fantasy_config_test_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = config_dir_with("fantasy_config_test_invalid", "this is not valid [[[ toml");
        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seed_config_copies_defaults_once() {
        let tmp = std::env::temp_dir().join("fantasy_config_test_seed");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::copy(
            project_root().join("defaults").join(CONFIG_FILE),
            tmp.join("defaults").join(CONFIG_FILE),
        )
        .unwrap();

        let written = seed_config(&tmp).unwrap();
        assert_eq!(written, Some(tmp.join("config").join(CONFIG_FILE)));
        assert!(load_config_from(&tmp).is_ok());

        // Local edits survive a second run.
        fs::write(tmp.join("config").join(CONFIG_FILE), "# custom\n").unwrap();
        assert_eq!(seed_config(&tmp).unwrap(), None);
        let content = fs::read_to_string(tmp.join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seed_config_accepts_existing_config_without_defaults() {
        let tmp = config_dir_with("fantasy_config_test_seed_existing", VALID);
        assert_eq!(seed_config(&tmp).unwrap(), None);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seed_config_errors_when_nothing_to_load() {
        let tmp = std::env::temp_dir().join("fantasy_config_test_seed_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = seed_config(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }
}
