// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Event dispatcher (C9): the callback-thread-facing entry point. Resolves
//! the device name, looks up the mapping registry, and hands matched
//! actions off to the processor (C10) without blocking.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::device_manager::DeviceConfigManager;
use crate::events::MidiEvent;
use crate::processor::EventProcessor;

/// Bridges the MIDI adapter's callback thread to the processor. Every
/// method here must return promptly: the adapter's callback thread is
/// typically a library-owned thread that cannot be blocked without
/// risking dropped or delayed MIDI input.
pub struct Dispatcher {
    devices: Arc<DeviceConfigManager>,
    processor: EventProcessor,
}

impl Dispatcher {
    pub fn new(devices: Arc<DeviceConfigManager>) -> Self {
        Self {
            devices,
            processor: EventProcessor::new(),
        }
    }

    /// Called for every incoming message, tagged with the adapter-assigned
    /// `device_id` it arrived on. Resolves fingerprint matches across every
    /// device name currently bound to that id (normally exactly one) and
    /// submits the combined, ordered action list to the processor.
    pub fn dispatch(&self, device_id: &str, event: MidiEvent) {
        let names = self.devices.device_names_for_id(device_id);
        if names.is_empty() {
            trace!(device_id, "event from unbound device, dropped");
            return;
        }

        let registry = self.devices.registry();
        let midi_value = event.resolved_value();

        let mut matched = Vec::new();
        for name in &names {
            matched.extend(registry.lookup(name, &event));
        }
        debug!(device_id, matches = matched.len(), "dispatched event");
        self.processor.submit(matched, midi_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::config::ActionConfig;
    use crate::actions::factory::Services;
    use crate::facades::{NullGameController, NullInputSimulator, NullMidiAdapter};
    use crate::profile::{DeviceConfig, InputType, MappingEntry, Profile};
    use crate::state::StateStore;
    use std::time::Duration;

    fn services(sim: Arc<NullInputSimulator>) -> Services {
        Services {
            state: Arc::new(StateStore::new()),
            input: sim,
            midi: Arc::new(NullMidiAdapter::new()),
            controller: Arc::new(NullGameController),
        }
    }

    fn profile() -> Profile {
        Profile {
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
                    input_type: InputType::NoteOn,
                    note: Some(60),
                    control_number: None,
                    channel: None,
                    sysex_pattern: None,
                    action: ActionConfig::KeyPressRelease { virtual_key: 65 },
                }],
            }],
        }
    }

    #[tokio::test]
    async fn dispatch_resolves_device_and_runs_action() {
        let sim = Arc::new(NullInputSimulator::new());
        let manager = Arc::new(DeviceConfigManager::new(services(sim.clone())));
        manager.apply(profile()).unwrap();
        manager.bind_device("dev-id-1", "DevA");

        let dispatcher = Dispatcher::new(manager);
        dispatcher.dispatch("dev-id-1", crate::events::MidiEvent::note_on(1, 60, 100));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sim.key_downs(), vec![65]);
    }

    #[tokio::test]
    async fn dispatch_from_unbound_device_is_dropped() {
        let sim = Arc::new(NullInputSimulator::new());
        let manager = Arc::new(DeviceConfigManager::new(services(sim.clone())));
        manager.apply(profile()).unwrap();

        let dispatcher = Dispatcher::new(manager);
        dispatcher.dispatch("unknown", crate::events::MidiEvent::note_on(1, 60, 100));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sim.key_downs().is_empty());
    }
}
