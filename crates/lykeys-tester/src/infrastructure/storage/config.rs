//! TOML-based configuration persistence for the test console.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\LyKeysTester\config.toml`
//! - Linux:    `~/.config/lykeys-tester/config.toml`
//! - macOS:    `~/Library/Application Support/LyKeysTester/config.toml`
//!
//! The `LYKEYS_CONFIG` environment variable overrides the path.
//!
//! ```toml
//! log_level = "info"
//!
//! [driver]
//! dll_path = 'C:\lykeys\lykeysdll.dll'
//! sys_path = 'C:\lykeys\lykeys.sys'
//!
//! [rapid_test]
//! test_key = "a"
//! press_ms = 1
//! interval_ms = 1
//! duration_s = 0
//!
//! [auto_move]
//! hotkey = "F8"
//! speed = 10.0
//! range = 100.0
//! ```
//!
//! # Lenient loading
//!
//! The file is hand-edited, so a bad value must never stop the console from
//! starting.  Each field is decoded on its own: a missing field takes its
//! default silently, a field of the wrong type takes its default with a
//! `warn!`, and a file that is not TOML at all yields the full default.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::Value;
use tracing::{debug, warn};

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "LYKEYS_CONFIG";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` log level used when `RUST_LOG` is unset.
    pub log_level: String,
    pub driver: DriverConfig,
    pub rapid_test: RapidTestConfig,
    pub auto_move: AutoMoveConfig,
}

/// Locations of the driver binaries.  Unset until the operator sets them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriverConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dll_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_path: Option<PathBuf>,
}

/// Cyclic press test parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RapidTestConfig {
    pub test_key: String,
    /// Key hold time in milliseconds.
    pub press_ms: u64,
    /// Gap after each release in milliseconds.
    pub interval_ms: u64,
    /// Total run time in seconds; 0 runs until stopped.
    pub duration_s: u64,
}

/// Circular auto-motion settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoMoveConfig {
    /// Binding that toggles the motion, e.g. `"F8"` or `"ctrl+shift+F8"`.
    pub hotkey: String,
    pub speed: f64,
    pub range: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            driver: DriverConfig::default(),
            rapid_test: RapidTestConfig::default(),
            auto_move: AutoMoveConfig::default(),
        }
    }
}

impl Default for RapidTestConfig {
    fn default() -> Self {
        Self {
            test_key: "a".to_string(),
            press_ms: 1,
            interval_ms: 1,
            duration_s: 0,
        }
    }
}

impl Default for AutoMoveConfig {
    fn default() -> Self {
        Self {
            hotkey: "F8".to_string(),
            speed: 10.0,
            range: 100.0,
        }
    }
}

// ── Lenient decoding ──────────────────────────────────────────────────────────

/// Decodes `key` from `table`, falling back to `default`.
fn field<T: DeserializeOwned>(table: Option<&Value>, path: &str, key: &str, default: T) -> T {
    let Some(value) = table.and_then(|t| t.get(key)) else {
        return default;
    };
    match value.clone().try_into::<T>() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(field = %format!("{path}{key}"), error = %e, "invalid config value; using default");
            default
        }
    }
}

impl AppConfig {
    /// Decodes a config from TOML text, field by field.
    pub fn from_toml_lenient(content: &str) -> Self {
        let root: Value = match content.parse::<toml::Table>() {
            Ok(table) => Value::Table(table),
            Err(e) => {
                warn!(error = %e, "config is not valid TOML; using defaults");
                return Self::default();
            }
        };
        let defaults = Self::default();
        let root = Some(&root);
        let driver = root.and_then(|r| r.get("driver"));
        let rapid = root.and_then(|r| r.get("rapid_test"));
        let auto = root.and_then(|r| r.get("auto_move"));

        Self {
            log_level: field(root, "", "log_level", defaults.log_level),
            driver: DriverConfig {
                dll_path: field(driver, "driver.", "dll_path", None),
                sys_path: field(driver, "driver.", "sys_path", None),
            },
            rapid_test: RapidTestConfig {
                test_key: field(rapid, "rapid_test.", "test_key", defaults.rapid_test.test_key),
                press_ms: field(rapid, "rapid_test.", "press_ms", defaults.rapid_test.press_ms),
                interval_ms: field(
                    rapid,
                    "rapid_test.",
                    "interval_ms",
                    defaults.rapid_test.interval_ms,
                ),
                duration_s: field(rapid, "rapid_test.", "duration_s", defaults.rapid_test.duration_s),
            },
            auto_move: AutoMoveConfig {
                hotkey: field(auto, "auto_move.", "hotkey", defaults.auto_move.hotkey),
                speed: field(auto, "auto_move.", "speed", defaults.auto_move.speed),
                range: field(auto, "auto_move.", "range", defaults.auto_move.range),
            },
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file, honouring `LYKEYS_CONFIG`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if no override is set and the
/// base directory cannot be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the default location.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found".
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found".
/// Malformed content is never an error; see the module docs.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "config loaded");
            Ok(AppConfig::from_toml_lenient(&content))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the default location.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file_path()?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Persists `config` to `path`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LyKeysTester"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lykeys-tester"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LyKeysTester")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lykeys_config_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_matches_documented_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.rapid_test.test_key, "a");
        assert_eq!(cfg.rapid_test.press_ms, 1);
        assert_eq!(cfg.rapid_test.interval_ms, 1);
        assert_eq!(cfg.rapid_test.duration_s, 0);
        assert_eq!(cfg.auto_move.hotkey, "F8");
        assert_eq!(cfg.auto_move.speed, 10.0);
        assert_eq!(cfg.auto_move.range, 100.0);
        assert_eq!(cfg.driver, DriverConfig::default());
    }

    // ── Lenient decoding ──────────────────────────────────────────────────────

    #[test]
    fn test_empty_document_yields_defaults() {
        assert_eq!(AppConfig::from_toml_lenient(""), AppConfig::default());
    }

    #[test]
    fn test_non_toml_content_yields_defaults() {
        let cfg = AppConfig::from_toml_lenient("[[[ not valid toml");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_wrong_typed_field_falls_back_alone() {
        // Arrange
        let toml_str = r#"
[rapid_test]
test_key = "b"
press_ms = "fast"
interval_ms = 5

[auto_move]
speed = 25.5
range = true
"#;

        // Act
        let cfg = AppConfig::from_toml_lenient(toml_str);

        // Assert
        assert_eq!(cfg.rapid_test.test_key, "b");
        assert_eq!(cfg.rapid_test.press_ms, 1);
        assert_eq!(cfg.rapid_test.interval_ms, 5);
        assert_eq!(cfg.auto_move.speed, 25.5);
        assert_eq!(cfg.auto_move.range, 100.0);
        assert_eq!(cfg.auto_move.hotkey, "F8");
    }

    #[test]
    fn test_section_of_wrong_type_is_ignored() {
        let cfg = AppConfig::from_toml_lenient("rapid_test = 3\nlog_level = \"debug\"");

        assert_eq!(cfg.rapid_test, RapidTestConfig::default());
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn test_negative_duration_is_rejected_per_field() {
        let cfg = AppConfig::from_toml_lenient("[rapid_test]\nduration_s = -4");

        assert_eq!(cfg.rapid_test.duration_s, 0);
    }

    #[test]
    fn test_driver_paths_decode_when_present() {
        let cfg = AppConfig::from_toml_lenient(
            "[driver]\ndll_path = 'C:\\lykeys\\lykeysdll.dll'\nsys_path = 'C:\\lykeys\\lykeys.sys'",
        );

        assert_eq!(
            cfg.driver.dll_path,
            Some(PathBuf::from("C:\\lykeys\\lykeysdll.dll"))
        );
        assert_eq!(cfg.driver.sys_path, Some(PathBuf::from("C:\\lykeys\\lykeys.sys")));
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let dir = temp_dir();

        let cfg = load_config_from(&dir.join("absent.toml")).unwrap();

        assert_eq!(cfg, AppConfig::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.log_level = "debug".to_string();
        cfg.driver.dll_path = Some(PathBuf::from("C:/lykeys/lykeysdll.dll"));
        cfg.rapid_test.duration_s = 10;
        cfg.auto_move.hotkey = "ctrl+shift+F8".to_string();

        // Act
        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unset_driver_paths_are_omitted_from_file() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).unwrap();

        assert!(!toml_str.contains("dll_path"));
        assert!(!toml_str.contains("sys_path"));
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if std::env::var_os(CONFIG_PATH_ENV).is_some() {
            return;
        }
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
        // If NoPlatformConfigDir is returned (e.g. in a stripped CI env) that is also acceptable.
    }
}
