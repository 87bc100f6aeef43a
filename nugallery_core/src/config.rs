/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load NuGallery-Core settings from TOML with defaults for
    every field, covering feed, credential, and workspace
    discovery behaviour.

  Security / Safety Notes:
    Configuration never holds credentials; only the provider
    location and proxy URL are read from disk.

  Dependencies:
    serde and toml for parsing, dirs for default locations.

  Operational Scope:
    Loaded once by the binary and passed by reference to the
    source registry and workspace discovery.

  Revision History:
    2026-10-18 COD  Authored configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults for unattended execution
    - Missing optional file tolerated, missing explicit file fatal
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GalleryError, Result};

const CONFIG_DIR_NAME: &str = "nugallery";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub log_dir: Option<PathBuf>,
    pub feed: FeedConfig,
    pub credentials: CredentialConfig,
    pub workspace: WorkspaceConfig,
}

/// `[feed]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
    /// Editor-level proxy; takes precedence over the environment.
    pub proxy: Option<String>,
    /// Known sources; the first one is the default.
    pub sources: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: format!("NuGallery-Core/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            sources: vec!["https://www.nuget.org/api/v2".to_string()],
        }
    }
}

/// `[credentials]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Folder holding the credential provider; may contain `{user-profile}`.
    pub provider_folder: String,
    /// Runtime host used to launch the portable provider.
    pub runtime: String,
    /// Bound in seconds for non-interactive provider runs.
    pub timeout: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            provider_folder: "{user-profile}/.nuget/plugins/netcore/CredentialProvider.Microsoft"
                .to_string(),
            runtime: "dotnet".to_string(),
            timeout: 10,
        }
    }
}

/// `[workspace]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub props_pattern: String,
    pub project_pattern: String,
    pub exclude: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            props_pattern: "**/Directory.*.props".to_string(),
            project_pattern: "**/*.{csproj,fsproj,vbproj}".to_string(),
            exclude: Some("**/node_modules/**".to_string()),
        }
    }
}

impl GalleryConfig {
    /// Load from `path`, or from the default location when none is given.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GalleryError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| GalleryError::Config(format!("{} is invalid: {err}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Directory for session logs.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR_NAME)
                .join("logs")
        })
    }

    /// First configured source, used when the caller names none.
    pub fn default_source(&self) -> Result<&str> {
        self.feed
            .sources
            .first()
            .map(String::as_str)
            .ok_or_else(|| GalleryError::Config("No package sources configured".into()))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
