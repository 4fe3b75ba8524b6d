// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Device configuration manager (C8): holds the active profile and
//! registry, and tracks the device-name ↔ open-device-id binding as
//! hardware connects and disconnects.

use dashmap::DashMap;
use std::sync::{Arc, RwLock};

use crate::actions::factory::Services;
use crate::error::ProfileError;
use crate::loader::build_registry;
use crate::mapping::MappingRegistry;
use crate::profile::Profile;
use crate::state::StateStore;

/// Tracks the bidirectional binding between a hardware device id (assigned
/// by the MIDI adapter at `open_input` time) and the profile-facing device
/// name used in fingerprints.
#[derive(Default)]
struct DeviceBindings {
    id_to_names: DashMap<String, Vec<String>>,
    name_to_id: DashMap<String, String>,
}

impl DeviceBindings {
    fn bind(&self, id: &str, name: &str) {
        self.name_to_id.insert(name.to_string(), id.to_string());
        self.id_to_names.entry(id.to_string()).or_default().push(name.to_string());
    }

    fn unbind_id(&self, id: &str) {
        if let Some((_, names)) = self.id_to_names.remove(id) {
            for name in names {
                self.name_to_id.remove(&name);
            }
        }
    }

    /// Preferring concrete names over wildcards, since a `"*"` entry would
    /// otherwise swallow device-specific mappings in the caller's lookup.
    fn names_for_id(&self, id: &str) -> Vec<String> {
        let mut names = self
            .id_to_names
            .get(id)
            .map(|v| v.clone())
            .unwrap_or_default();
        names.sort_by_key(|n| n == "*");
        names
    }
}

/// Owns the current profile, the mapping registry, and the state store.
/// `apply` is the only mutation path and is only ever called by the
/// profile controller (C11) during load/activate/reload.
pub struct DeviceConfigManager {
    services: Services,
    registry: MappingRegistry,
    bindings: DeviceBindings,
    active_profile: RwLock<Option<Arc<Profile>>>,
}

impl DeviceConfigManager {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            registry: MappingRegistry::new(),
            bindings: DeviceBindings::default(),
            active_profile: RwLock::new(None),
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.services.state
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// 1. Reset state (performs the key-release sweep). 2. Rebuild the
    /// registry from `profile`. 3. Atomically publish it.
    pub fn apply(&self, profile: Profile) -> Result<(), ProfileError> {
        let initial = profile.initial_states.clone().unwrap_or_default();
        self.services
            .state
            .initialize(&initial, self.services.input.as_ref())
            .map_err(|e| ProfileError::single("InitialStates", e.to_string()))?;

        let snapshot = build_registry(&profile, self.services.clone())?;
        self.registry.publish(snapshot);
        *self.active_profile.write().unwrap() = Some(Arc::new(profile));
        Ok(())
    }

    pub fn registry(&self) -> Arc<crate::mapping::RegistrySnapshot> {
        self.registry.snapshot()
    }

    pub fn active_profile(&self) -> Option<Arc<Profile>> {
        self.active_profile.read().unwrap().clone()
    }

    pub fn bind_device(&self, id: &str, name: &str) {
        self.bindings.bind(id, name);
    }

    pub fn unbind_device(&self, id: &str) {
        self.bindings.unbind_id(id);
    }

    pub fn device_names_for_id(&self, id: &str) -> Vec<String> {
        self.bindings.names_for_id(id)
    }

    /// Whether `device_name`/`channel` has a `ControlChangeRelative` mapping
    /// registered for `control_number` in the active profile. Wire bytes
    /// never self-describe relative vs. absolute CCs; the adapter consults
    /// this before constructing the event so `MidiEvent::is_relative` can be
    /// set correctly ahead of dispatch (see `mapping.rs` lookup, which keys
    /// off the event, not the fingerprint alone).
    pub fn is_relative_cc(&self, device_name: &str, channel: u8, control_number: u8) -> bool {
        use crate::profile::InputType;

        let Some(profile) = self.active_profile() else {
            return false;
        };
        profile.devices.iter().any(|device| {
            let matches_name = device.device_name == device_name || device.device_name.is_empty() || device_name == "*";
            matches_name
                && device.mappings.iter().any(|m| {
                    m.input_type == InputType::ControlChangeRelative
                        && m.control_number == Some(control_number)
                        && m.channel.is_none_or(|c| c == channel)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facades::{NullGameController, NullInputSimulator, NullMidiAdapter};

    fn null_services() -> Services {
        Services {
            state: Arc::new(StateStore::new()),
            input: Arc::new(NullInputSimulator::new()),
            midi: Arc::new(NullMidiAdapter::new()),
            controller: Arc::new(NullGameController),
        }
    }

    #[test]
    fn binding_prefers_concrete_name_over_wildcard() {
        let manager = DeviceConfigManager::new(null_services());
        manager.bind_device("dev1", "*");
        manager.bind_device("dev1", "DevA");
        assert_eq!(manager.device_names_for_id("dev1"), vec!["DevA", "*"]);
    }

    #[test]
    fn unbind_removes_all_names_for_id() {
        let manager = DeviceConfigManager::new(null_services());
        manager.bind_device("dev1", "DevA");
        manager.unbind_device("dev1");
        assert!(manager.device_names_for_id("dev1").is_empty());
    }

    #[test]
    fn is_relative_cc_reflects_active_profile() {
        use crate::actions::config::ActionConfig;
        use crate::profile::{DeviceConfig, InputType, MappingEntry, Profile};

        let manager = DeviceConfigManager::new(null_services());
        manager
            .apply(Profile {
                profile_name: "Test".to_string(),
                description: None,
                initial_states: None,
                devices: vec![DeviceConfig {
                    input_profile: "default".to_string(),
                    device_name: "DevA".to_string(),
                    midi_channels: None,
                    mappings: vec![MappingEntry {
                        id: None,
                        description: None,
                        is_enabled: true,
                        input_type: InputType::ControlChangeRelative,
                        note: None,
                        control_number: Some(20),
                        channel: Some(1),
                        sysex_pattern: None,
                        action: ActionConfig::KeyPressRelease { virtual_key: 65 },
                    }],
                }],
            })
            .unwrap();

        assert!(manager.is_relative_cc("DevA", 1, 20));
        assert!(!manager.is_relative_cc("DevA", 2, 20));
        assert!(!manager.is_relative_cc("DevA", 1, 21));
    }

    #[test]
    fn switching_profiles_releases_held_keys_s5() {
        use crate::actions::config::ActionConfig;
        use crate::profile::{DeviceConfig, InputType, MappingEntry, Profile};

        let sim = Arc::new(NullInputSimulator::new());
        let manager = DeviceConfigManager::new(Services {
            state: Arc::new(StateStore::new()),
            input: sim.clone(),
            midi: Arc::new(NullMidiAdapter::new()),
            controller: Arc::new(NullGameController),
        });

        let held_key_profile = |name: &str| Profile {
            profile_name: name.to_string(),
            description: None,
            initial_states: None,
            devices: vec![DeviceConfig {
                input_profile: "default".to_string(),
                device_name: "DevA".to_string(),
                midi_channels: None,
                mappings: vec![MappingEntry {
                    id: None,
                    description: None,
                    is_enabled: true,
                    input_type: InputType::NoteOn,
                    note: Some(60),
                    control_number: None,
                    channel: None,
                    sysex_pattern: None,
                    action: ActionConfig::KeyDown {
                        virtual_key: 65,
                        auto_release_after_ms: None,
                    },
                }],
            }],
        };

        manager.apply(held_key_profile("A")).unwrap();
        // Simulate the held key left down by a prior KeyDown dispatch.
        manager
            .state()
            .set_unchecked(&crate::state::internal_key_for_vk(65), 1);

        manager.apply(held_key_profile("B")).unwrap();

        assert_eq!(sim.key_ups(), vec![65]);
    }
}
