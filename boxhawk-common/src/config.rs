//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "BOXHAWK_ROOT_FOLDER";

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    /// Create resolver for a module (module name only appears in logs)
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Set the command-line override
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Resolve the root folder; never fails, falls through to the compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(config_path) = find_config_file() {
            match read_root_folder_key(&config_path) {
                Ok(Some(path)) => {
                    info!(module = %self.module_name, "Root folder from {}: {}", config_path.display(), path.display());
                    return path;
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable config file {}: {}", config_path.display(), e),
            }
        }

        let path = default_root_folder();
        info!(module = %self.module_name, "Root folder (compiled default): {}", path.display());
        path
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Database file path inside the root folder
    pub fn database_path(&self, database_file: &str) -> PathBuf {
        self.root_folder.join(database_file)
    }
}

/// Review service configuration, read from `<root>/boxhawk-rv.toml`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Socket address for the HTTP listener
    pub bind_addr: String,
    /// Prefix used to build public image URLs
    pub public_base_url: String,
    /// SQLite file name, relative to the root folder
    pub database_file: String,
    /// Blob directory, relative to the root folder
    pub blob_dir: String,
    /// Listing page size when the caller gives none
    pub default_page_size: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
            public_base_url: "http://127.0.0.1:5740/media".to_string(),
            database_file: "boxhawk.db".to_string(),
            blob_dir: "blobs".to_string(),
            default_page_size: 12,
        }
    }
}

impl ServiceConfig {
    /// File name of the service config inside the root folder
    pub const FILE_NAME: &'static str = "boxhawk-rv.toml";

    /// Parse from TOML text; unspecified keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the root folder; a missing file yields defaults with a warning
    pub fn load(root_folder: &Path) -> Result<Self> {
        let path = root_folder.join(Self::FILE_NAME);
        if !path.exists() {
            warn!("No {} found in {}, using defaults", Self::FILE_NAME, root_folder.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.default_page_size < 1 {
            return Err(Error::Config("default_page_size must be at least 1".to_string()));
        }
        if self.database_file.trim().is_empty() || self.blob_dir.trim().is_empty() {
            return Err(Error::Config("database_file and blob_dir must be set".to_string()));
        }
        Ok(())
    }
}

/// User config first, then system-wide
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("boxhawk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    let system_config = PathBuf::from("/etc/boxhawk/config.toml");
    system_config.exists().then_some(system_config)
}

fn read_root_folder_key(config_path: &Path) -> Result<Option<PathBuf>> {
    let content = std::fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(value
        .get("root_folder")
        .and_then(|v| v.as_str())
        .map(PathBuf::from))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("boxhawk"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/boxhawk"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("boxhawk"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/boxhawk"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("boxhawk"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\boxhawk"))
    } else {
        PathBuf::from("./boxhawk_data")
    }
}
