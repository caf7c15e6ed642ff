use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use logdeck_types::SortOrder;

/// Narrow persistence contract the pipeline reads at startup and writes on
/// every change. Getters return `None` until a value has been stored;
/// setters are total and never fail the caller.
pub trait SettingsStore: Send + Sync {
    fn sort_order(&self) -> Option<SortOrder>;
    fn set_sort_order(&self, order: SortOrder);
    fn show_filters(&self) -> Option<bool>;
    fn set_show_filters(&self, show: bool);
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsData {
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    show_filters: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// TOML-file-backed settings. The file is read once at open; setters write
/// through and log write failures instead of propagating them.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    data: Mutex<SettingsData>,
}

impl FileSettings {
    /// Load settings from `path`. A missing file yields defaults; an
    /// unreadable or unparseable file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SettingsData::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, mutate: impl FnOnce(&mut SettingsData)) {
        let mut data = self.data.lock();
        mutate(&mut data);
        let serialized = match toml::to_string_pretty(&*data) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed to serialize settings");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), error = %err, "failed to persist settings");
        }
    }
}

impl SettingsStore for FileSettings {
    fn sort_order(&self) -> Option<SortOrder> {
        self.data.lock().sort_order
    }

    fn set_sort_order(&self, order: SortOrder) {
        self.update(|data| data.sort_order = Some(order));
    }

    fn show_filters(&self) -> Option<bool> {
        self.data.lock().show_filters
    }

    fn set_show_filters(&self, show: bool) {
        self.update(|data| data.show_filters = Some(show));
    }
}

/// In-memory settings for tests and hosts that do not persist preferences.
#[derive(Debug, Default)]
pub struct MemorySettings {
    data: Mutex<SettingsData>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn sort_order(&self) -> Option<SortOrder> {
        self.data.lock().sort_order
    }

    fn set_sort_order(&self, order: SortOrder) {
        self.data.lock().sort_order = Some(order);
    }

    fn show_filters(&self) -> Option<bool> {
        self.data.lock().show_filters
    }

    fn set_show_filters(&self, show: bool) {
        self.data.lock().show_filters = Some(show);
    }
}
