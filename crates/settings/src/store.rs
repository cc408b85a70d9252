//! Settings store

use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{Settings, SettingsError};

/// Environment variables with this prefix override the file
pub const ENV_PREFIX: &str = "WATCHER";

/// Current settings plus the file they persist to.
///
/// Readers get a copy; subscribers are notified after every successful
/// update.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: watch::Sender<Settings>,
    write: Mutex<()>,
}

impl SettingsStore {
    /// Load from `path` (missing file means defaults) under `WATCHER_*`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::open_with_prefix(path, ENV_PREFIX)
    }

    pub fn open_with_prefix(path: impl AsRef<Path>, env_prefix: &str) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let settings = load(&path, env_prefix)?;
        info!("Loaded settings from {}", path.display());
        debug!("Settings: {:?}", settings);
        Ok(Self::with_settings(Some(path), settings))
    }

    /// Defaults, never written anywhere
    pub fn in_memory() -> Self {
        Self::with_settings(None, Settings::default())
    }

    fn with_settings(path: Option<PathBuf>, settings: Settings) -> Self {
        let (current, _rx) = watch::channel(settings);
        Self {
            path,
            current,
            write: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Settings {
        self.current.borrow().clone()
    }

    /// Apply `change`, clamp, persist, then notify subscribers. On a
    /// persist failure nothing changes.
    pub fn update<F>(&self, change: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let _write = match self.write.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut next = self.get();
        change(&mut next);
        let next = next.clamped();

        if let Some(path) = &self.path {
            persist(path, &next)?;
        }

        self.current.send_replace(next.clone());
        debug!("Settings updated: {:?}", next);
        Ok(next)
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.current.subscribe()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn load(path: &Path, env_prefix: &str) -> Result<Settings, SettingsError> {
    let layered = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json).required(false))
        .add_source(Environment::with_prefix(env_prefix).try_parsing(true))
        .build()?;

    let settings: Settings = layered.try_deserialize()?;
    Ok(settings.clamped())
}

fn persist(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let encoded = serde_json::to_vec_pretty(settings)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Write aside and rename so a crash never leaves half a file
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, encoded)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}
