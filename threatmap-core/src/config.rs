use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::{Palette, DEFAULT_SHARED_COLOR};

/// Default workspace file name in the current directory
pub const LOCAL_WORKSPACE_FILE: &str = "threatmap.yaml";

/// A registered analysis workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceEntry {
    /// Path to the workspace YAML file
    pub path: String,
    #[serde(default)]
    pub description: String,
}

/// User configuration: registered workspaces and color overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceEntry>,
    /// Optional default workspace name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_workspace: Option<String>,
    /// Replacement for the built-in target palette
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub palette: Vec<String>,
    /// Replacement for the shared proximate target color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_color: Option<String>,
}

impl Config {
    /// Loads the config from `path`, or an empty config if the file is missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }

    pub fn get_workspace(&self, name: &str) -> Option<&WorkspaceEntry> {
        self.workspaces.get(name)
    }

    /// Registers a new workspace or updates an existing one
    pub fn register_workspace(&mut self, name: String, path: String, description: String) {
        self.workspaces
            .insert(name, WorkspaceEntry { path, description });
    }

    pub fn set_default_workspace(&mut self, name: &str) -> Result<()> {
        if !self.workspaces.contains_key(name) {
            anyhow::bail!("Workspace '{}' not found in config", name);
        }
        self.default_workspace = Some(name.to_string());
        Ok(())
    }

    pub fn get_default_workspace(&self) -> Option<(&str, &WorkspaceEntry)> {
        let name = self.default_workspace.as_deref()?;
        self.workspaces.get(name).map(|entry| (name, entry))
    }

    /// Palette with any configured overrides applied
    pub fn palette(&self) -> Palette {
        let shared = self
            .shared_color
            .clone()
            .unwrap_or_else(|| DEFAULT_SHARED_COLOR.to_string());
        Palette::new(self.palette.clone(), shared)
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("THREATMAP_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
    Ok(home_dir.join(".threatmap.config"))
}

/// Decides which workspace file to use.
///
/// Priority: explicit file, then named workspace, then `THREATMAP_WORKSPACE`,
/// then `./threatmap.yaml` if it exists, then the configured default, and
/// finally `./threatmap.yaml` (created on first save).
pub fn determine_workspace_path(
    config: &Config,
    file: Option<&Path>,
    workspace: Option<&str>,
) -> Result<PathBuf> {
    let env_workspace = env::var("THREATMAP_WORKSPACE").ok();
    resolve_workspace_path(
        config,
        file,
        workspace,
        env_workspace.as_deref(),
        Path::new(LOCAL_WORKSPACE_FILE),
    )
}

/// Resolution behind [`determine_workspace_path`], with the environment
/// value and the local file location passed in.
fn resolve_workspace_path(
    config: &Config,
    file: Option<&Path>,
    workspace: Option<&str>,
    env_workspace: Option<&str>,
    local: &Path,
) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file.to_path_buf());
    }

    if let Some(name) = workspace {
        return match config.get_workspace(name) {
            Some(entry) => Ok(PathBuf::from(&entry.path)),
            None => anyhow::bail!("Workspace '{}' not found in config", name),
        };
    }

    if let Some(name) = env_workspace {
        return match config.get_workspace(name) {
            Some(entry) => Ok(PathBuf::from(&entry.path)),
            None => anyhow::bail!("Workspace '{}' from THREATMAP_WORKSPACE not found in config", name),
        };
    }

    if local.exists() {
        return Ok(local.to_path_buf());
    }

    if let Some((_, entry)) = config.get_default_workspace() {
        return Ok(PathBuf::from(&entry.path));
    }

    Ok(local.to_path_buf())
}
