use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::session::state::{clamp_phase_secs, DEFAULT_PHASE_SECS};

/// Preferences that survive across runs: phase length and the chime toggle.
/// The time limit is deliberately per-session (a full reset clears it) and
/// is never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub phase_secs: u32,
    pub sound_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            phase_secs: DEFAULT_PHASE_SECS,
            sound_enabled: false,
        }
    }
}

impl Preferences {
    /// A hand-edited settings file may carry anything; keep it in range.
    fn clamped(mut self) -> Self {
        self.phase_secs = clamp_phase_secs(self.phase_secs);
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Preferences>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<Preferences>(&contents)
                .unwrap_or_default()
                .clamped()
        } else {
            Preferences::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Default location under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "boxbreathe")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    pub fn preferences(&self) -> Preferences {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, prefs: Preferences) -> Result<()> {
        let prefs = prefs.clamped();
        {
            let mut guard = self.data.write().unwrap();
            *guard = prefs;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.preferences(), Preferences::default());
    }

    #[test]
    fn update_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(Preferences {
                phase_secs: 6,
                sound_enabled: true,
            })
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(
            reloaded.preferences(),
            Preferences {
                phase_secs: 6,
                sound_enabled: true,
            }
        );
    }

    #[test]
    fn out_of_range_values_on_disk_are_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"phaseSecs": 42, "soundEnabled": true}"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.preferences().phase_secs, 6);
        assert!(store.preferences().sound_enabled);
    }

    #[test]
    fn garbage_on_disk_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json at all").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.preferences(), Preferences::default());
    }
}
