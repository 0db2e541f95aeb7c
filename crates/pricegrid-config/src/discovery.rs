//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/pricegrid/config.toml` (XDG user config)
//! 2. `./pricegrid.toml` (project-local)
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, PriceGridConfig, Result};

/// Default config filename for project-local config.
pub const PROJECT_CONFIG_FILE: &str = "pricegrid.toml";

/// Default config filename within XDG config directory.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "pricegrid";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: PriceGridConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Primary source file (first successfully loaded), for save operations.
    pub source: Option<ConfigSource>,
    /// Warnings generated during loading (e.g., unparsable layers).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
///
/// Searches for config files in order:
/// 1. User config dir (from `config_dir`, `PRICEGRID_CONFIG_DIR` env, or platform default)
/// 2. Project-local (`./pricegrid.toml` or specified project dir)
///
/// Later files override earlier ones.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `PRICEGRID_CONFIG_DIR` and the platform default.
/// Pass `Some(path)` to use a specific directory, or `None` to use the default resolution.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = PriceGridConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_path = config_dir
        .map(|dir| dir.join(USER_CONFIG_FILE))
        .or_else(xdg_config_path);
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));

    for path in user_path.into_iter().chain(Some(project_path)) {
        sources.push(load_layer(&mut config, path, &mut warnings));
    }

    // Find primary source (first successfully loaded file)
    let source = sources.iter().find(|s| s.loaded).cloned();

    Ok(LoadedConfig {
        config,
        sources,
        source,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<PriceGridConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    PriceGridConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &PriceGridConfig, path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Environment variable to override the config directory.
///
/// When set, this takes precedence over the platform default (XDG/Application Support).
/// Useful for testing and running multiple instances with different configs.
pub const CONFIG_DIR_ENV: &str = "PRICEGRID_CONFIG_DIR";

/// Get the user config file path.
///
/// Checks `PRICEGRID_CONFIG_DIR` env var first, then falls back to platform default
/// (`~/.config/pricegrid/config.toml` on Linux, `~/Library/Application Support/pricegrid/config.toml` on macOS).
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory.
///
/// Checks `PRICEGRID_CONFIG_DIR` env var first, then falls back to platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for log files: `logs/` under the given or default config dir.
pub fn log_dir(config_dir: Option<&Path>) -> Option<PathBuf> {
    config_dir
        .map(Path::to_path_buf)
        .or_else(xdg_config_dir)
        .map(|d| d.join("logs"))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; an unreadable one becomes a warning.
fn load_layer(
    config: &mut PriceGridConfig,
    path: PathBuf,
    warnings: &mut Vec<String>,
) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(&path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };

    ConfigSource { path, loaded }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_xdg_config_path_shape() {
        // May be None in some CI environments
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[search]
currency = "GBP"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.search().currency, "GBP");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        // Use explicit empty config dir so we don't pick up the real user config
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert_eq!(loaded.config, PriceGridConfig::new());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.source.is_none());
    }

    #[test]
    fn test_project_overrides_user_config() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[server]
base_url = "http://user:3000"

[prefetch]
enabled = false
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join("pricegrid.toml"),
            r#"
[server]
base_url = "http://project:3000"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();

        assert_eq!(loaded.config.server().base_url, "http://project:3000");
        // Sections the project file doesn't mention come from the user file
        assert!(!loaded.config.prefetch().enabled);
        assert_eq!(loaded.loaded_from().len(), 2);
        assert!(loaded.source.unwrap().path.ends_with("config.toml"));
    }

    #[test]
    fn test_malformed_layer_warns_but_continues() {
        let project_dir = TempDir::new().unwrap();
        let user_dir = TempDir::new().unwrap();
        fs::write(project_dir.path().join("pricegrid.toml"), "not valid toml {{{{").unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PriceGridConfig::new();
        config.matrix = Some(crate::MatrixSection {
            mark_unanswered_absent: true,
        });
        save_config(&config, &path).unwrap();

        assert_eq!(load_config_file(&path).unwrap(), config);
    }

    #[test]
    fn test_log_dir_under_config_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(log_dir(Some(dir.path())), Some(dir.path().join("logs")));
    }
}
