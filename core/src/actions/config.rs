// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Declarative action configuration (C4): the `$type`-tagged variant family
//! loaded from and saved to profile JSON.

use serde::{Deserialize, Serialize};

use crate::error::ConfigValidation;
use crate::events::SysExPattern;
pub use crate::facades::{MouseButton, ScrollDirection, Shell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorHandling {
    ContinueOnError,
    StopOnError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equals,
    GreaterThan,
    LessThan,
}

/// A single range clause of a `Conditional` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionClause {
    pub min_value: u8,
    pub max_value: u8,
    pub action: Box<ActionConfig>,
}

/// The clause chosen by a `StateConditional` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCondition {
    pub state_value: i32,
    pub comparison: Comparison,
    pub action: Box<ActionConfig>,
    /// `-1` means "leave state unchanged".
    pub set_state_after: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiMessageType {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PitchBend,
    SysEx,
}

/// A single outgoing MIDI command issued by a `MidiOutput` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiOutputCommand {
    pub message_type: MidiMessageType,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysex_data: Option<SysExPattern>,
}

/// The closed family of action kinds, tagged by `$type` on the wire.
///
/// Every variant validates independently of the runtime; an invalid config
/// is rejected by the profile loader and never reaches the factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ActionConfig {
    KeyPressRelease {
        virtual_key: u16,
    },
    KeyDown {
        virtual_key: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_release_after_ms: Option<u32>,
    },
    KeyUp {
        virtual_key: u16,
    },
    KeyToggle {
        virtual_key: u16,
    },
    MouseClick {
        button: MouseButton,
    },
    MouseScroll {
        direction: ScrollDirection,
        amount: u32,
    },
    CommandExecution {
        command: String,
        shell: Shell,
        run_hidden: bool,
        wait_for_exit: bool,
    },
    Delay {
        milliseconds: u32,
    },
    GameControllerButton {
        button: String,
        controller_index: u8,
    },
    GameControllerAxis {
        axis: String,
        controller_index: u8,
        axis_value: f32,
        use_midi_value: bool,
        min_value: u8,
        max_value: u8,
        invert: bool,
    },
    Sequence {
        sub_actions: Vec<ActionConfig>,
        error_handling: ErrorHandling,
    },
    Conditional {
        conditions: Vec<ConditionClause>,
    },
    RelativeCC {
        increase: Box<ActionConfig>,
        decrease: Box<ActionConfig>,
    },
    MidiOutput {
        output_device_name: String,
        commands: Vec<MidiOutputCommand>,
    },
    SetState {
        state_key: String,
        state_value: i32,
    },
    StateConditional {
        state_key: String,
        condition: StateCondition,
    },
    Alternating {
        primary: Box<ActionConfig>,
        secondary: Box<ActionConfig>,
        start_with_primary: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state_key: Option<String>,
    },
}

impl ActionConfig {
    /// Validate this node and recursively validate its children, collecting
    /// every violation (rather than stopping at the first) so the loader
    /// can report them all.
    pub fn validate(&self, path: &str) -> Vec<ConfigValidation> {
        let mut errors = Vec::new();
        match self {
            ActionConfig::MouseScroll { amount, .. } => {
                if *amount == 0 {
                    errors.push(ConfigValidation::new(path, "amount must be > 0"));
                }
            }
            ActionConfig::Delay { milliseconds } => {
                if *milliseconds == 0 {
                    errors.push(ConfigValidation::new(path, "milliseconds must be > 0"));
                }
            }
            ActionConfig::GameControllerButton {
                controller_index, ..
            } => {
                if *controller_index > 3 {
                    errors.push(ConfigValidation::new(path, "controller_index must be 0..=3"));
                }
            }
            ActionConfig::GameControllerAxis {
                controller_index,
                axis_value,
                min_value,
                max_value,
                ..
            } => {
                if *controller_index > 3 {
                    errors.push(ConfigValidation::new(path, "controller_index must be 0..=3"));
                }
                if !(-1.0..=1.0).contains(axis_value) {
                    errors.push(ConfigValidation::new(path, "axis_value must be in [-1.0, 1.0]"));
                }
                if min_value > max_value {
                    errors.push(ConfigValidation::new(path, "min_value must be <= max_value"));
                }
            }
            ActionConfig::Sequence { sub_actions, .. } => {
                if sub_actions.is_empty() {
                    errors.push(ConfigValidation::new(path, "sub_actions must be non-empty"));
                }
                for (i, sub) in sub_actions.iter().enumerate() {
                    errors.extend(sub.validate(&format!("{path}.sub_actions[{i}]")));
                }
            }
            ActionConfig::Conditional { conditions } => {
                if conditions.is_empty() {
                    errors.push(ConfigValidation::new(path, "conditions must be non-empty"));
                }
                let mut ranges: Vec<(u8, u8)> = Vec::new();
                for (i, clause) in conditions.iter().enumerate() {
                    let clause_path = format!("{path}.conditions[{i}]");
                    if clause.min_value > clause.max_value {
                        errors.push(ConfigValidation::new(&clause_path, "min_value must be <= max_value"));
                    } else {
                        for (omin, omax) in &ranges {
                            if clause.min_value <= *omax && *omin <= clause.max_value {
                                errors.push(ConfigValidation::new(
                                    &clause_path,
                                    "range overlaps a previous condition",
                                ));
                            }
                        }
                        ranges.push((clause.min_value, clause.max_value));
                    }
                    errors.extend(clause.action.validate(&format!("{clause_path}.action")));
                }
            }
            ActionConfig::RelativeCC { increase, decrease } => {
                errors.extend(increase.validate(&format!("{path}.increase")));
                errors.extend(decrease.validate(&format!("{path}.decrease")));
            }
            ActionConfig::MidiOutput {
                output_device_name,
                commands,
            } => {
                if output_device_name == "*" {
                    errors.push(ConfigValidation::new(path, "output_device_name must not be '*'"));
                }
                for (i, cmd) in commands.iter().enumerate() {
                    let cmd_path = format!("{path}.commands[{i}]");
                    if !(1..=16).contains(&cmd.channel) {
                        errors.push(ConfigValidation::new(&cmd_path, "channel must be 1..=16"));
                    }
                    if cmd.data1 > 0x7F || cmd.data2 > 0x7F {
                        errors.push(ConfigValidation::new(&cmd_path, "data bytes must be 0..=127"));
                    }
                    if cmd.message_type == MidiMessageType::SysEx {
                        match &cmd.sysex_data {
                            None => errors.push(ConfigValidation::new(&cmd_path, "SysEx command requires sysex_data")),
                            Some(pattern) if pattern.literal_bytes().is_none() => errors.push(
                                ConfigValidation::new(&cmd_path, "sysex_data must not contain wildcard (XX) bytes"),
                            ),
                            Some(_) => {}
                        }
                    }
                }
            }
            ActionConfig::SetState { state_key, .. } => {
                if !crate::state::is_user_key(state_key) {
                    errors.push(ConfigValidation::new(path, "state_key must be user-defined"));
                }
            }
            ActionConfig::StateConditional {
                state_key,
                condition,
            } => {
                if !crate::state::is_user_key(state_key) {
                    errors.push(ConfigValidation::new(path, "state_key must be user-defined"));
                }
                errors.extend(condition.action.validate(&format!("{path}.condition.action")));
            }
            ActionConfig::Alternating {
                primary,
                secondary,
                state_key,
                ..
            } => {
                if let Some(key) = state_key {
                    if !crate::state::is_user_key(key) {
                        errors.push(ConfigValidation::new(path, "state_key must be user-defined"));
                    }
                }
                errors.extend(primary.validate(&format!("{path}.primary")));
                errors.extend(secondary.validate(&format!("{path}.secondary")));
            }
            ActionConfig::KeyPressRelease { .. }
            | ActionConfig::KeyDown { .. }
            | ActionConfig::KeyUp { .. }
            | ActionConfig::KeyToggle { .. }
            | ActionConfig::MouseClick { .. }
            | ActionConfig::CommandExecution { .. } => {}
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kpr(vk: u16) -> ActionConfig {
        ActionConfig::KeyPressRelease { virtual_key: vk }
    }

    #[test]
    fn conditional_overlap_is_rejected() {
        let cfg = ActionConfig::Conditional {
            conditions: vec![
                ConditionClause {
                    min_value: 0,
                    max_value: 64,
                    action: Box::new(kpr(65)),
                },
                ConditionClause {
                    min_value: 64,
                    max_value: 127,
                    action: Box::new(kpr(66)),
                },
            ],
        };
        assert!(!cfg.validate("$").is_empty());
    }

    #[test]
    fn conditional_non_overlap_is_accepted() {
        let cfg = ActionConfig::Conditional {
            conditions: vec![
                ConditionClause {
                    min_value: 0,
                    max_value: 63,
                    action: Box::new(kpr(65)),
                },
                ConditionClause {
                    min_value: 64,
                    max_value: 127,
                    action: Box::new(kpr(66)),
                },
            ],
        };
        assert!(cfg.validate("$").is_empty());
    }

    #[test]
    fn set_state_rejects_internal_key() {
        let cfg = ActionConfig::SetState {
            state_key: "*Key1".to_string(),
            state_value: 1,
        };
        assert!(!cfg.validate("$").is_empty());
    }

    #[test]
    fn midi_output_rejects_wildcard_device() {
        let cfg = ActionConfig::MidiOutput {
            output_device_name: "*".to_string(),
            commands: vec![],
        };
        assert!(!cfg.validate("$").is_empty());
    }

    #[test]
    fn json_uses_dollar_type_tag() {
        let cfg = kpr(65);
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["$type"], "KeyPressRelease");
        assert_eq!(json["virtual_key"], 65);
    }

    #[test]
    fn sequence_empty_is_rejected() {
        let cfg = ActionConfig::Sequence {
            sub_actions: vec![],
            error_handling: ErrorHandling::StopOnError,
        };
        assert!(!cfg.validate("$").is_empty());
    }
}
