// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile loader/validator (C7 — part 2): file I/O, atomic save, and
//! registry construction from a validated [`Profile`].

use std::path::{Path, PathBuf};

use crate::actions::factory::{ActionFactory, Services};
use crate::error::ProfileError;
use crate::mapping::{RegistryBuilder, RegistryEntry, RegistrySnapshot};
use crate::profile::Profile;

/// Parse `json`, run full validation, and report every violation at once.
/// Never partially loads: on any error the caller receives `Err` with the
/// complete list, and no partial profile.
pub fn load_profile(json: &str) -> Result<Profile, ProfileError> {
    let profile: Profile = serde_json::from_str(json)
        .map_err(|e| ProfileError::single("$", format!("invalid JSON: {e}")))?;
    let errors = profile.validate();
    if errors.is_empty() {
        Ok(profile)
    } else {
        Err(ProfileError(errors))
    }
}

/// Read and parse a profile from disk.
pub fn load_profile_file(path: &Path) -> Result<Profile, ProfileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ProfileError::single(path.display().to_string(), e.to_string()))?;
    load_profile(&contents)
}

/// Verify `path` resolves inside one of `allowed_dirs` after symlink
/// resolution, rejecting path traversal and TOCTOU redirection to a
/// location outside the sanctioned profile directories.
pub fn check_path_allowed(path: &Path, allowed_dirs: &[PathBuf]) -> Result<PathBuf, String> {
    let canonical = path
        .canonicalize()
        .or_else(|_| {
            // The file may not exist yet (a fresh save): canonicalize the
            // parent instead and re-append the file name.
            let parent = path.parent().ok_or("path has no parent")?;
            let file_name = path.file_name().ok_or("path has no file name")?;
            parent
                .canonicalize()
                .map(|p| p.join(file_name))
                .map_err(|e| e.to_string())
        })
        .map_err(|e| format!("cannot resolve path: {e}"))?;

    for dir in allowed_dirs {
        if let Ok(dir) = dir.canonicalize() {
            if canonical.starts_with(&dir) {
                return Ok(canonical);
            }
        }
    }
    Err(format!("{} is outside the allowed profile directories", canonical.display()))
}

/// Serialize `profile` verbatim and write it atomically (write to a temp
/// file, then rename) so a crash mid-write never corrupts the existing
/// profile on disk.
pub fn save_profile_file(
    profile: &Profile,
    path: &Path,
    allowed_dirs: &[PathBuf],
) -> Result<(), String> {
    check_path_allowed(path, allowed_dirs)?;
    let json = profile.to_json().map_err(|e| e.to_string())?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json).map_err(|e| e.to_string())?;
    std::fs::rename(&tmp_path, path).map_err(|e| e.to_string())?;
    Ok(())
}

/// Build a registry snapshot from a validated profile by instantiating a
/// runtime action (via the factory) for every enabled mapping.
pub fn build_registry(profile: &Profile, services: Services) -> Result<RegistrySnapshot, ProfileError> {
    let factory = ActionFactory::for_runtime(services);
    let mut builder = RegistryBuilder::new();
    let mut errors = Vec::new();

    for (di, device) in profile.devices.iter().enumerate() {
        for (mi, mapping) in device.mappings.iter().enumerate() {
            if !mapping.is_enabled {
                continue;
            }
            let path = format!("MidiDevices[{di}].Mappings[{mi}]");
            let fingerprint = match mapping.fingerprint(&device.device_name) {
                Ok(f) => f,
                Err(msg) => {
                    errors.push(crate::error::ConfigValidation::new(&path, msg));
                    continue;
                }
            };
            let origin = format!(
                "{}/{:?}/{:?}",
                device.device_name, fingerprint.channel, fingerprint.kind
            );
            match factory.create(&mapping.action, &origin) {
                Ok(action) => builder.insert(RegistryEntry {
                    fingerprint,
                    action: action.into(),
                }),
                Err(e) => errors.push(crate::error::ConfigValidation::new(&path, e.to_string())),
            }
        }
    }

    if errors.is_empty() {
        Ok(builder.build())
    } else {
        Err(ProfileError(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn loads_valid_profile() {
        let profile = load_profile(VALID_JSON).unwrap();
        assert_eq!(profile.profile_name, "Test");
    }

    #[test]
    fn rejects_profile_missing_required_fingerprint_field() {
        let json = r#"{
            "ProfileName": "Test",
            "MidiDevices": [{
                "InputProfile": "default",
                "DeviceName": "DevA",
                "Mappings": [{
                    "InputType": "NoteOn",
                    "Channel": 1,
                    "Action": {"$type": "KeyPressRelease", "virtual_key": 65}
                }]
            }]
        }"#;
        assert!(load_profile(json).is_err());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = std::env::temp_dir().join("midirouter_loader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let outside = std::env::temp_dir().join("midirouter_outside.json");
        let _ = std::fs::write(&outside, "{}");
        let result = check_path_allowed(&outside, &[dir.clone()]);
        assert!(result.is_err());
        let _ = std::fs::remove_file(&outside);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
