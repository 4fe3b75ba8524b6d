// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile controller (C11): load/activate/reload orchestration tying the
//! loader (C7) to the device configuration manager (C8).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::device_manager::DeviceConfigManager;
use crate::error::ProfileError;
use crate::loader;
use crate::profile::Profile;

/// Drives profile activation and owns the sanctioned profile directories
/// used for path-traversal checks on save.
pub struct ProfileController {
    devices: Arc<DeviceConfigManager>,
    allowed_dirs: Vec<PathBuf>,
}

impl ProfileController {
    pub fn new(devices: Arc<DeviceConfigManager>, allowed_dirs: Vec<PathBuf>) -> Self {
        Self { devices, allowed_dirs }
    }

    /// Load, validate, and activate the profile at `path`. On validation
    /// failure the previously active profile and registry are left
    /// untouched — activation is all-or-nothing.
    pub fn load_and_activate(&self, path: &Path) -> Result<(), ProfileError> {
        let profile = loader::load_profile_file(path)?;
        self.activate(profile)
    }

    pub fn activate(&self, profile: Profile) -> Result<(), ProfileError> {
        let name = profile.profile_name.clone();
        match self.devices.apply(profile) {
            Ok(()) => {
                info!(profile = %name, "profile activated");
                Ok(())
            }
            Err(e) => {
                error!(profile = %name, error = %e, "profile activation failed, previous profile remains active");
                Err(e)
            }
        }
    }

    /// Re-read and re-validate the profile at `path`. An equivalent call to
    /// [`Self::load_and_activate`], named separately since hosts expose it
    /// as a distinct "reload current profile" entry point.
    pub fn reload(&self, path: &Path) -> Result<(), ProfileError> {
        self.load_and_activate(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let profile = self
            .devices
            .active_profile()
            .ok_or_else(|| "no active profile to save".to_string())?;
        loader::save_profile_file(&profile, path, &self.allowed_dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::factory::Services;
    use crate::facades::{NullGameController, NullInputSimulator, NullMidiAdapter};
    use crate::state::StateStore;

    fn services() -> Services {
        Services {
            state: Arc::new(StateStore::new()),
            input: Arc::new(NullInputSimulator::new()),
            midi: Arc::new(NullMidiAdapter::new()),
            controller: Arc::new(NullGameController),
        }
    }

    const VALID_JSON: &str = r#"{
        "ProfileName": "Test",
        "MidiDevices": [{
            "InputProfile": "default",
            "DeviceName": "DevA",
            "Mappings": [{
                "InputType": "NoteOn",
                "Note": 60,
                "Channel": 1,
                "Action": {"$type": "KeyPressRelease", "virtual_key": 65}
            }]
        }]
    }"#;

    #[test]
    fn load_and_activate_from_file() {
        let dir = std::env::temp_dir().join("midirouter_controller_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.json");
        std::fs::write(&path, VALID_JSON).unwrap();

        let manager = Arc::new(DeviceConfigManager::new(services()));
        let controller = ProfileController::new(manager.clone(), vec![dir.clone()]);
        controller.load_and_activate(&path).unwrap();

        assert_eq!(manager.active_profile().unwrap().profile_name, "Test");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_profile_leaves_previous_active() {
        let dir = std::env::temp_dir().join("midirouter_controller_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let good_path = dir.join("good.json");
        let bad_path = dir.join("bad.json");
        std::fs::write(&good_path, VALID_JSON).unwrap();
        std::fs::write(&bad_path, r#"{"ProfileName": "", "MidiDevices": []}"#).unwrap();

        let manager = Arc::new(DeviceConfigManager::new(services()));
        let controller = ProfileController::new(manager.clone(), vec![dir.clone()]);
        controller.load_and_activate(&good_path).unwrap();
        assert!(controller.load_and_activate(&bad_path).is_err());
        assert_eq!(manager.active_profile().unwrap().profile_name, "Test");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_round_trips_active_profile() {
        let dir = std::env::temp_dir().join("midirouter_controller_test_save");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.json");
        std::fs::write(&path, VALID_JSON).unwrap();

        let manager = Arc::new(DeviceConfigManager::new(services()));
        let controller = ProfileController::new(manager, vec![dir.clone()]);
        controller.load_and_activate(&path).unwrap();

        let save_path = dir.join("saved.json");
        controller.save(&save_path).unwrap();
        let reloaded = loader::load_profile_file(&save_path).unwrap();
        assert_eq!(reloaded.profile_name, "Test");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
