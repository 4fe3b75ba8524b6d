// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile data model (C7 — part 1): the declarative, serializable
//! representation of a loaded profile and its static validation rules.
//!
//! See [`crate::loader`] for file I/O and registry construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::actions::ActionConfig;
use crate::error::ConfigValidation;
use crate::events::{ChannelSelector, EventFingerprint, FingerprintKind, SysExPattern};
use crate::state::is_user_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    NoteOn,
    NoteOff,
    /// Alias of `ControlChangeAbsolute`, accepted on load for profiles that
    /// don't distinguish relative encoders.
    #[serde(alias = "ControlChange")]
    ControlChangeAbsolute,
    ControlChangeRelative,
    SysEx,
}

fn default_true() -> bool {
    true
}

/// A single mapping: fingerprint-defining fields plus the action it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingEntry {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "IsEnabled", default = "default_true")]
    pub is_enabled: bool,
    #[serde(rename = "InputType")]
    pub input_type: InputType,
    #[serde(rename = "Note", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<u8>,
    #[serde(rename = "ControlNumber", default, skip_serializing_if = "Option::is_none")]
    pub control_number: Option<u8>,
    #[serde(rename = "Channel", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    #[serde(rename = "SysExPattern", default, skip_serializing_if = "Option::is_none")]
    pub sysex_pattern: Option<String>,
    #[serde(rename = "Action")]
    pub action: ActionConfig,
}

impl MappingEntry {
    /// Derive the registry fingerprint for this mapping within `device_name`.
    /// Fails if the fields required by `input_type` are missing or malformed.
    pub fn fingerprint(&self, device_name: &str) -> Result<EventFingerprint, String> {
        let channel = match self.channel {
            Some(c) => ChannelSelector::Channel(c),
            None => ChannelSelector::Any,
        };
        let kind = match self.input_type {
            InputType::NoteOn => FingerprintKind::NoteOn(self.note.ok_or("NoteOn requires Note")?),
            InputType::NoteOff => FingerprintKind::NoteOff(self.note.ok_or("NoteOff requires Note")?),
            InputType::ControlChangeAbsolute => FingerprintKind::ControlChangeAbsolute(
                self.control_number.ok_or("ControlChange requires ControlNumber")?,
            ),
            InputType::ControlChangeRelative => FingerprintKind::ControlChangeRelative(
                self.control_number.ok_or("ControlChangeRelative requires ControlNumber")?,
            ),
            InputType::SysEx => {
                let raw = self.sysex_pattern.as_deref().ok_or("SysEx requires SysExPattern")?;
                let pattern = SysExPattern::parse(raw).ok_or("malformed SysExPattern")?;
                FingerprintKind::SysEx(pattern)
            }
        };
        let device_name = if device_name.is_empty() { "*" } else { device_name };
        Ok(EventFingerprint {
            device_name: device_name.to_string(),
            channel,
            kind,
        })
    }

    fn validate(&self, path: &str) -> Vec<ConfigValidation> {
        let mut errors = Vec::new();
        if let Some(c) = self.channel {
            if !(1..=16).contains(&c) {
                errors.push(ConfigValidation::new(path, "Channel must be 1..=16"));
            }
        }
        if let Err(msg) = self.fingerprint("placeholder") {
            errors.push(ConfigValidation::new(path, msg));
        }
        errors.extend(self.action.validate(&format!("{path}.Action")));
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(rename = "InputProfile")]
    pub input_profile: String,
    #[serde(rename = "DeviceName")]
    pub device_name: String,
    #[serde(rename = "MidiChannels", default, skip_serializing_if = "Option::is_none")]
    pub midi_channels: Option<Vec<u8>>,
    #[serde(rename = "Mappings")]
    pub mappings: Vec<MappingEntry>,
}

impl DeviceConfig {
    fn validate(&self, path: &str) -> Vec<ConfigValidation> {
        let mut errors = Vec::new();
        for (i, mapping) in self.mappings.iter().enumerate() {
            errors.extend(mapping.validate(&format!("{path}.Mappings[{i}]")));
        }
        errors
    }
}

/// A fully-parsed profile. The top-level unit the loader produces and the
/// device configuration manager (C8) activates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(rename = "ProfileName")]
    pub profile_name: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "InitialStates", default, skip_serializing_if = "Option::is_none")]
    pub initial_states: Option<HashMap<String, i32>>,
    #[serde(rename = "MidiDevices")]
    pub devices: Vec<DeviceConfig>,
}

impl Profile {
    /// Static validation beyond per-action checks: non-empty name, at
    /// least one device, valid fingerprints, user-defined initial state
    /// keys. Collects every violation rather than stopping at the first.
    pub fn validate(&self) -> Vec<ConfigValidation> {
        let mut errors = Vec::new();
        if self.profile_name.is_empty() {
            errors.push(ConfigValidation::new("ProfileName", "must not be empty"));
        }
        if self.devices.is_empty() {
            errors.push(ConfigValidation::new("MidiDevices", "must have at least one device"));
        }
        for (i, device) in self.devices.iter().enumerate() {
            errors.extend(device.validate(&format!("MidiDevices[{i}]")));
        }
        if let Some(initial) = &self.initial_states {
            for key in initial.keys() {
                if !is_user_key(key) {
                    errors.push(ConfigValidation::new(
                        format!("InitialStates.{key}"),
                        "must be a user-defined key",
                    ));
                }
            }
        }
        errors
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
