use sidebar_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::model::Settings;

/// Persistence collaborator for [`Settings`].
pub trait SettingsStore: Send + Sync {
    /// Load the stored settings; a store with nothing saved yields defaults.
    fn load(&self) -> Result<Settings>;

    fn save(&self, settings: &Settings) -> Result<()>;
}

/// YAML file on disk, `<config dir>/sidebar/settings.yaml` by default.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("sidebar").join("settings.yaml"))
            .ok_or_else(|| Error::Config("could not determine config directory".into()))
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!("no settings file at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings = serde_yaml::from_str(&contents)?;
        debug!("loaded settings from {}", self.path.display());
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(settings)?;
        std::fs::write(&self.path, yaml)?;
        info!("saved settings to {}", self.path.display());
        Ok(())
    }
}

/// Settings held in memory only.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        let guard = self
            .settings
            .lock()
            .map_err(|_| Error::Config("settings lock poisoned".into()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| Error::Config("settings lock poisoned".into()))?;
        *guard = Some(settings.clone());
        Ok(())
    }
}
