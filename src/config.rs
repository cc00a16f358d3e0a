//! Configuration for lessonkit paths and import settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LESSONKIT_HOME, LESSONKIT_LIBRARY, LESSONKIT_ASSETS)
//! 2. Config file (.lessonkit/config.yaml)
//! 3. Defaults (~/.lessonkit)
//!
//! Config file discovery:
//! - Searches current directory and parents for .lessonkit/config.yaml
//! - `home` is relative to the .lessonkit/ directory, other paths to the
//!   project root (the directory holding .lessonkit/)
//!
//! Library code never reads this module; the binary resolves a
//! [`ResolvedConfig`] once and hands paths and settings down.

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{ImportSettings, DEFAULT_FALLBACK_EXTENSION, DEFAULT_PACK_TITLE};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const ENV_HOME: &str = "LESSONKIT_HOME";
pub const ENV_LIBRARY: &str = "LESSONKIT_LIBRARY";
pub const ENV_ASSETS: &str = "LESSONKIT_ASSETS";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub import: Option<ImportConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .lessonkit/)
    pub home: Option<String>,
    /// Library root (relative to project root)
    pub library: Option<String>,
    /// Embedded bundle assets (relative to project root)
    pub assets: Option<String>,
    /// Pending-import queue directory (relative to project root)
    pub pending: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    pub fallback_extension: Option<String>,
    pub default_pack_title: Option<String>,
    pub user_agent: Option<String>,
    pub download_timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory (staging, pending queue)
    pub home: PathBuf,
    /// Library root (catalog plus pack/track folders)
    pub library: PathBuf,
    /// Directory holding embedded bundles
    pub assets: PathBuf,
    /// Pending-import queue directory
    pub pending: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub import: ImportDefaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDefaults {
    pub fallback_extension: String,
    pub default_pack_title: String,
    pub user_agent: String,
    pub download_timeout_seconds: u64,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            fallback_extension: DEFAULT_FALLBACK_EXTENSION.to_string(),
            default_pack_title: DEFAULT_PACK_TITLE.to_string(),
            user_agent: format!("lessonkit/{}", env!("CARGO_PKG_VERSION")),
            download_timeout_seconds: 300,
        }
    }
}

impl ImportDefaults {
    fn merged(config: Option<&ImportConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            fallback_extension: config
                .fallback_extension
                .clone()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .unwrap_or(defaults.fallback_extension),
            default_pack_title: config
                .default_pack_title
                .clone()
                .unwrap_or(defaults.default_pack_title),
            user_agent: config.user_agent.clone().unwrap_or(defaults.user_agent),
            download_timeout_seconds: config
                .download_timeout_seconds
                .unwrap_or(defaults.download_timeout_seconds),
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

impl ResolvedConfig {
    /// Importer settings derived from this configuration
    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            fallback_extension: self.import.fallback_extension.clone(),
            default_pack_title: self.import.default_pack_title.clone(),
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(paths::CONFIG_DIR).join(paths::CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Resolve configuration from an optional config file, an environment
/// lookup and a default home directory
fn resolve(
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let parsed = config_file.as_deref().map(load_config_file).transpose()?;

    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let project_root = config_dir.parent().unwrap_or(Path::new("."));
    let file_paths = parsed.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let home = env(ENV_HOME)
        .map(PathBuf::from)
        .or_else(|| file_paths.home.as_deref().map(|p| resolve_path(config_dir, p)))
        .unwrap_or(default_home);

    let library = env(ENV_LIBRARY)
        .map(PathBuf::from)
        .or_else(|| file_paths.library.as_deref().map(|p| resolve_path(project_root, p)))
        .unwrap_or_else(|| home.join(paths::LIBRARY_DIR));

    let assets = env(ENV_ASSETS)
        .map(PathBuf::from)
        .or_else(|| file_paths.assets.as_deref().map(|p| resolve_path(project_root, p)))
        .unwrap_or_else(|| home.join(paths::ASSETS_DIR));

    let pending = file_paths
        .pending
        .as_deref()
        .map(|p| resolve_path(project_root, p))
        .unwrap_or_else(|| home.join(paths::PENDING_DIR));

    let import = ImportDefaults::merged(parsed.as_ref().and_then(|c| c.import.as_ref()));

    Ok(ResolvedConfig {
        home,
        library,
        assets,
        pending,
        config_file,
        import,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".lessonkit");
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    resolve(
        find_config_file(&cwd),
        |key| std::env::var(key).ok(),
        default_home,
    )
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(root: &Path, yaml: &str) -> PathBuf {
        let dir = root.join(".lessonkit");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let home = PathBuf::from("/users/test/.lessonkit");
        let config = resolve(None, no_env, home.clone()).unwrap();

        assert_eq!(config.home, home);
        assert_eq!(config.library, home.join("library"));
        assert_eq!(config.assets, home.join("assets"));
        assert_eq!(config.pending, home.join("pending"));
        assert_eq!(config.import, ImportDefaults::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  home: ./
  library: ../lessons
import:
  fallback_extension: .MP3
  download_timeout_seconds: 30
"#,
        );

        let parsed = load_config_file(&path).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.paths.library, Some("../lessons".to_string()));

        let config = resolve(Some(path), no_env, PathBuf::from("/unused")).unwrap();
        assert_eq!(config.import.fallback_extension, "mp3");
        assert_eq!(config.import.download_timeout(), Duration::from_secs(30));
        assert_eq!(config.import.default_pack_title, "Imported");
        assert!(config.library.ends_with("lessons"));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            "version: \"1.0\"\npaths:\n  library: ./lib\n  assets: ./bundles\n",
        );
        let env: HashMap<&str, &str> = [(ENV_LIBRARY, "/env/library")].into_iter().collect();

        let config = resolve(
            Some(path),
            |key| env.get(key).map(|v| v.to_string()),
            PathBuf::from("/default/home"),
        )
        .unwrap();

        assert_eq!(config.library, PathBuf::from("/env/library"));
        assert_eq!(config.assets, temp.path().join("bundles"));
        assert_eq!(config.home, PathBuf::from("/default/home"));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "version: \"1.0\"\n");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested), Some(path));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn test_import_settings() {
        let config = resolve(None, no_env, PathBuf::from("/h")).unwrap();
        let settings = config.import_settings();
        assert_eq!(settings.fallback_extension, "m4a");
        assert_eq!(settings.default_pack_title, "Imported");
    }
}
