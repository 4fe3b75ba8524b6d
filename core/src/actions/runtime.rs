// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Runtime action instances (C4): the executable counterpart to
//! [`super::config::ActionConfig`], produced by the factory (C5).
//!
//! Every variant implements [`RuntimeAction`]. Suspension points (`Delay`,
//! waiting on a command, flushing MIDI output, composite child awaits) are
//! cooperative `.await`s — they yield the worker task but never block a
//! thread outright, so they never stall the MIDI callback thread that
//! submitted them (see the concurrency notes in [`crate::processor`]).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::config::{Comparison, ErrorHandling, MidiMessageType, MidiOutputCommand};
use crate::error::ActionError;
use crate::facades::{GameController, InputSimulator, MidiAdapter, MouseButton, ScrollDirection, Shell};
use crate::state::StateStore;

/// The uniform execution contract every runtime action satisfies.
///
/// `midi_value` carries the triggering MIDI scalar (velocity for
/// NoteOn/Off, value for CC); `None` for SysEx triggers. Implementations
/// must not retry on failure.
#[async_trait]
pub trait RuntimeAction: Send + Sync {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError>;
}

fn missing(action_kind: &'static str, service: &'static str) -> ActionError {
    ActionError::ServiceUnavailable {
        action_kind,
        service,
    }
}

pub struct KeyPressReleaseAction {
    pub virtual_key: u16,
    pub input: Option<Arc<dyn InputSimulator>>,
}

#[async_trait]
impl RuntimeAction for KeyPressReleaseAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing("KeyPressRelease", "InputSimulator"))?;
        input
            .send_key_down(self.virtual_key)
            .map_err(|e| ActionError::InputEmitFailed {
                kind: "key_down",
                source: e.to_string(),
            })?;
        input
            .send_key_up(self.virtual_key)
            .map_err(|e| ActionError::InputEmitFailed {
                kind: "key_up",
                source: e.to_string(),
            })?;
        Ok(())
    }
}

pub struct KeyDownAction {
    pub virtual_key: u16,
    pub auto_release_after_ms: Option<u32>,
    pub input: Option<Arc<dyn InputSimulator>>,
    pub state: Option<Arc<StateStore>>,
}

#[async_trait]
impl RuntimeAction for KeyDownAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing("KeyDown", "InputSimulator"))?;
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| missing("KeyDown", "StateStore"))?;

        let key = crate::state::internal_key_for_vk(self.virtual_key);
        if state.get(&key) < 1 {
            input
                .send_key_down(self.virtual_key)
                .map_err(|e| ActionError::InputEmitFailed {
                    kind: "key_down",
                    source: e.to_string(),
                })?;
            state.set_unchecked(&key, 1);
        }

        if let Some(ms) = self.auto_release_after_ms {
            let input = Arc::clone(input);
            let state = Arc::clone(state);
            let vk = self.virtual_key;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms as u64)).await;
                let key = crate::state::internal_key_for_vk(vk);
                if state.get(&key) == 1 {
                    let _ = input.send_key_up(vk);
                    state.set_unchecked(&key, 0);
                }
            });
        }
        Ok(())
    }
}

pub struct KeyUpAction {
    pub virtual_key: u16,
    pub input: Option<Arc<dyn InputSimulator>>,
    pub state: Option<Arc<StateStore>>,
}

#[async_trait]
impl RuntimeAction for KeyUpAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing("KeyUp", "InputSimulator"))?;
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| missing("KeyUp", "StateStore"))?;

        let key = crate::state::internal_key_for_vk(self.virtual_key);
        if state.get(&key) == 1 {
            input
                .send_key_up(self.virtual_key)
                .map_err(|e| ActionError::InputEmitFailed {
                    kind: "key_up",
                    source: e.to_string(),
                })?;
            state.set_unchecked(&key, 0);
        }
        Ok(())
    }
}

pub struct KeyToggleAction {
    pub down: KeyDownAction,
    pub up: KeyUpAction,
    pub virtual_key: u16,
    pub state: Option<Arc<StateStore>>,
}

#[async_trait]
impl RuntimeAction for KeyToggleAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| missing("KeyToggle", "StateStore"))?;
        let key = crate::state::internal_key_for_vk(self.virtual_key);
        if state.get(&key) == 1 {
            self.up.execute(midi_value).await
        } else {
            self.down.execute(midi_value).await
        }
    }
}

pub struct MouseClickAction {
    pub button: MouseButton,
    pub input: Option<Arc<dyn InputSimulator>>,
}

#[async_trait]
impl RuntimeAction for MouseClickAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing("MouseClick", "InputSimulator"))?;
        input
            .send_mouse_click(self.button)
            .map_err(|e| ActionError::InputEmitFailed {
                kind: "mouse_click",
                source: e.to_string(),
            })
    }
}

pub struct MouseScrollAction {
    pub direction: ScrollDirection,
    pub amount: u32,
    pub input: Option<Arc<dyn InputSimulator>>,
}

#[async_trait]
impl RuntimeAction for MouseScrollAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing("MouseScroll", "InputSimulator"))?;
        input
            .send_mouse_scroll(self.direction, self.amount)
            .map_err(|e| ActionError::InputEmitFailed {
                kind: "mouse_scroll",
                source: e.to_string(),
            })
    }
}

pub struct CommandExecutionAction {
    pub command: String,
    pub shell: Shell,
    pub run_hidden: bool,
    pub wait_for_exit: bool,
    pub input: Option<Arc<dyn InputSimulator>>,
}

#[async_trait]
impl RuntimeAction for CommandExecutionAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| missing("CommandExecution", "InputSimulator"))?;
        let input = Arc::clone(input);
        let command = self.command.clone();
        let shell = self.shell;
        let hidden = self.run_hidden;
        let wait = self.wait_for_exit;
        // Spawned so a blocking wait-for-exit never stalls the current task's
        // executor thread; the handle is still awaited so the action's own
        // completion matches the synchronous contract of `wait_for_exit`.
        let handle = tokio::task::spawn_blocking(move || input.run_command(&command, shell, hidden, wait));
        match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ActionError::CommandFailed {
                command: self.command.clone(),
                detail: e.to_string(),
            }),
            Err(join_err) => Err(ActionError::CommandFailed {
                command: self.command.clone(),
                detail: join_err.to_string(),
            }),
        }
    }
}

pub struct DelayAction {
    pub milliseconds: u32,
}

#[async_trait]
impl RuntimeAction for DelayAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        tokio::time::sleep(Duration::from_millis(self.milliseconds as u64)).await;
        Ok(())
    }
}

pub struct GameControllerButtonAction {
    pub button: String,
    pub controller_index: u8,
    pub controller: Option<Arc<dyn GameController>>,
}

#[async_trait]
impl RuntimeAction for GameControllerButtonAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let controller = self
            .controller
            .as_ref()
            .ok_or_else(|| missing("GameControllerButton", "GameController"))?;
        controller
            .set_button(self.controller_index, &self.button, true)
            .map_err(|e| ActionError::InputEmitFailed {
                kind: "game_controller_button",
                source: e.to_string(),
            })
    }
}

pub struct GameControllerAxisAction {
    pub axis: String,
    pub controller_index: u8,
    pub axis_value: f32,
    pub use_midi_value: bool,
    pub min_value: u8,
    pub max_value: u8,
    pub invert: bool,
    pub controller: Option<Arc<dyn GameController>>,
}

impl GameControllerAxisAction {
    /// Linear-map `midi_value` from `[min_value, max_value]` to `[-1.0, 1.0]`,
    /// clamped, then negated if `invert`.
    fn mapped_value(&self, midi_value: i32) -> f32 {
        let midi_value = midi_value.clamp(0, 127) as u8;
        let clamped = midi_value.clamp(self.min_value, self.max_value) as f32;
        let span = (self.max_value as f32 - self.min_value as f32).max(1.0);
        let normalized = (clamped - self.min_value as f32) / span; // 0.0..=1.0
        let mapped = normalized * 2.0 - 1.0; // -1.0..=1.0
        if self.invert { -mapped } else { mapped }
    }
}

#[async_trait]
impl RuntimeAction for GameControllerAxisAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let controller = self
            .controller
            .as_ref()
            .ok_or_else(|| missing("GameControllerAxis", "GameController"))?;
        let value = if self.use_midi_value {
            self.mapped_value(midi_value.unwrap_or(0))
        } else {
            self.axis_value
        };
        controller
            .set_axis(self.controller_index, &self.axis, value)
            .map_err(|e| ActionError::InputEmitFailed {
                kind: "game_controller_axis",
                source: e.to_string(),
            })
    }
}

pub struct SequenceAction {
    pub sub_actions: Vec<Box<dyn RuntimeAction>>,
    pub error_handling: ErrorHandling,
}

#[async_trait]
impl RuntimeAction for SequenceAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let mut failures = Vec::new();
        for (i, action) in self.sub_actions.iter().enumerate() {
            if let Err(e) = action.execute(midi_value).await {
                failures.push((i, Box::new(e)));
                if self.error_handling == ErrorHandling::StopOnError {
                    break;
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ActionError::SequenceFailed {
                total: self.sub_actions.len(),
                failures,
            })
        }
    }
}

pub struct ConditionalAction {
    pub conditions: Vec<(u8, u8, Box<dyn RuntimeAction>)>,
}

#[async_trait]
impl RuntimeAction for ConditionalAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let Some(value) = midi_value else {
            return Ok(());
        };
        for (min, max, action) in &self.conditions {
            if *min as i32 <= value && value <= *max as i32 {
                return action.execute(midi_value).await;
            }
        }
        Ok(())
    }
}

/// `increase`/`decrease` dispatch by the sign of `midi_value`, which for a
/// relative-CC-triggered event has already been decoded to a signed delta
/// by [`crate::events::MidiEvent::resolved_value`] — this action only
/// needs the sign, not the encoding that produced it.
pub struct RelativeCcAction {
    pub increase: Box<dyn RuntimeAction>,
    pub decrease: Box<dyn RuntimeAction>,
}

#[async_trait]
impl RuntimeAction for RelativeCcAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let Some(value) = midi_value else {
            return Ok(());
        };
        match value.signum() {
            1 => self.increase.execute(midi_value).await,
            -1 => self.decrease.execute(midi_value).await,
            _ => Ok(()),
        }
    }
}

pub struct MidiOutputAction {
    pub output_device_name: String,
    pub commands: Vec<MidiOutputCommand>,
    pub midi: Option<Arc<dyn MidiAdapter>>,
}

fn encode_midi_command(channel: u8, cmd: &MidiOutputCommand) -> Vec<u8> {
    let status_nibble: u8 = match cmd.message_type {
        MidiMessageType::NoteOn => 0x90,
        MidiMessageType::NoteOff => 0x80,
        MidiMessageType::ControlChange => 0xB0,
        MidiMessageType::ProgramChange => 0xC0,
        MidiMessageType::PitchBend => 0xE0,
        MidiMessageType::SysEx => 0xF0,
    };
    if cmd.message_type == MidiMessageType::SysEx {
        return cmd
            .sysex_data
            .as_ref()
            .and_then(|pattern| pattern.literal_bytes())
            .unwrap_or_default();
    }
    let status = status_nibble | (channel.saturating_sub(1) & 0x0F);
    match cmd.message_type {
        MidiMessageType::ProgramChange => vec![status, cmd.data1],
        MidiMessageType::PitchBend => {
            // 14-bit value: data2 is the MSB, data1 the LSB.
            vec![status, cmd.data1, cmd.data2]
        }
        _ => vec![status, cmd.data1, cmd.data2],
    }
}

#[async_trait]
impl RuntimeAction for MidiOutputAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let midi = self
            .midi
            .as_ref()
            .ok_or_else(|| missing("MidiOutput", "MidiAdapter"))?;
        for cmd in &self.commands {
            let bytes = encode_midi_command(cmd.channel, cmd);
            midi.send(&self.output_device_name, &bytes)
                .map_err(|e| ActionError::MidiSendFailed {
                    device: self.output_device_name.clone(),
                    source: e.to_string(),
                })?;
        }
        Ok(())
    }
}

pub struct SetStateAction {
    pub state_key: String,
    pub state_value: i32,
    pub state: Option<Arc<StateStore>>,
}

#[async_trait]
impl RuntimeAction for SetStateAction {
    async fn execute(&self, _midi_value: Option<i32>) -> Result<(), ActionError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| missing("SetState", "StateStore"))?;
        state.set(&self.state_key, self.state_value)?;
        Ok(())
    }
}

pub struct StateConditionalAction {
    pub state_key: String,
    pub state_value: i32,
    pub comparison: Comparison,
    pub action: Box<dyn RuntimeAction>,
    pub set_state_after: i32,
    pub state: Option<Arc<StateStore>>,
}

#[async_trait]
impl RuntimeAction for StateConditionalAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| missing("StateConditional", "StateStore"))?;
        let current = state.get(&self.state_key);
        let matched = match self.comparison {
            Comparison::Equals => current == self.state_value,
            Comparison::GreaterThan => current > self.state_value,
            Comparison::LessThan => current < self.state_value,
        };
        if !matched {
            return Ok(());
        }
        let result = self.action.execute(midi_value).await;
        // Applied regardless of the branch action's outcome.
        if self.set_state_after != -1 {
            state.set_unchecked(&self.state_key, self.set_state_after);
        }
        result
    }
}

pub struct AlternatingAction {
    pub state_key: String,
    pub primary: Box<dyn RuntimeAction>,
    pub secondary: Box<dyn RuntimeAction>,
    pub start_with_primary: bool,
    pub state: Option<Arc<StateStore>>,
}

#[async_trait]
impl RuntimeAction for AlternatingAction {
    async fn execute(&self, midi_value: Option<i32>) -> Result<(), ActionError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| missing("Alternating", "StateStore"))?;
        let current = state.get(&self.state_key);
        let is_primary = if current == -1 {
            self.start_with_primary
        } else {
            current == 0
        };
        if is_primary {
            let result = self.primary.execute(midi_value).await;
            state.set_unchecked(&self.state_key, 1);
            result
        } else {
            let result = self.secondary.execute(midi_value).await;
            state.set_unchecked(&self.state_key, 0);
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(min: u8, max: u8, invert: bool) -> GameControllerAxisAction {
        GameControllerAxisAction {
            axis: "x".to_string(),
            controller_index: 0,
            axis_value: 0.0,
            use_midi_value: true,
            min_value: min,
            max_value: max,
            invert,
            controller: None,
        }
    }

    #[test]
    fn axis_mapping_endpoints() {
        let a = axis(0, 127, false);
        assert!((a.mapped_value(0) - -1.0).abs() < 0.01);
        assert!((a.mapped_value(127) - 1.0).abs() < 0.01);
        assert!(a.mapped_value(64).abs() < 0.05);
    }

    #[test]
    fn axis_mapping_inverted() {
        let a = axis(0, 127, true);
        assert!((a.mapped_value(0) - 1.0).abs() < 0.01);
        assert!((a.mapped_value(127) - -1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn editor_context_services_missing_fails_loudly() {
        let action = KeyPressReleaseAction {
            virtual_key: 65,
            input: None,
        };
        let err = action.execute(None).await.unwrap_err();
        assert!(matches!(err, ActionError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn conditional_picks_unique_branch_s4() {
        use crate::facades::NullInputSimulator;
        let sim = Arc::new(NullInputSimulator::new());
        let input: Arc<dyn InputSimulator> = sim.clone();
        let low = Box::new(KeyPressReleaseAction {
            virtual_key: 65,
            input: Some(Arc::clone(&input)),
        });
        let high = Box::new(KeyPressReleaseAction {
            virtual_key: 66,
            input: Some(Arc::clone(&input)),
        });
        let cond = ConditionalAction {
            conditions: vec![(0, 63, low), (64, 127, high)],
        };
        cond.execute(Some(0)).await.unwrap();
        cond.execute(Some(63)).await.unwrap();
        cond.execute(Some(64)).await.unwrap();
        cond.execute(Some(127)).await.unwrap();

        assert_eq!(sim.key_downs(), vec![65, 65, 66, 66]);
    }

    #[tokio::test]
    async fn alternating_toggles_primary_then_secondary_s1() {
        use crate::facades::NullInputSimulator;
        let sim = Arc::new(NullInputSimulator::new());
        let input: Arc<dyn InputSimulator> = sim.clone();
        let state = Arc::new(StateStore::new());

        let action = AlternatingAction {
            state_key: "Toggle".to_string(),
            primary: Box::new(KeyPressReleaseAction {
                virtual_key: 65,
                input: Some(Arc::clone(&input)),
            }),
            secondary: Box::new(KeyPressReleaseAction {
                virtual_key: 66,
                input: Some(Arc::clone(&input)),
            }),
            start_with_primary: true,
            state: Some(Arc::clone(&state)),
        };

        action.execute(None).await.unwrap();
        action.execute(None).await.unwrap();
        action.execute(None).await.unwrap();

        assert_eq!(sim.key_downs(), vec![65, 66, 65]);
    }

    #[tokio::test]
    async fn key_down_auto_release_fires_once_after_delay_s2() {
        use crate::facades::NullInputSimulator;
        let sim = Arc::new(NullInputSimulator::new());
        let input: Arc<dyn InputSimulator> = sim.clone();
        let state = Arc::new(StateStore::new());

        let action = KeyDownAction {
            virtual_key: 65,
            auto_release_after_ms: Some(10),
            input: Some(Arc::clone(&input)),
            state: Some(Arc::clone(&state)),
        };

        action.execute(None).await.unwrap();
        assert_eq!(sim.key_downs(), vec![65]);
        assert!(sim.key_ups().is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sim.key_ups(), vec![65]);

        // A second KeyDown after release re-presses; the earlier auto-release
        // task must not fire again and release a key that's already down.
        action.execute(None).await.unwrap();
        assert_eq!(sim.key_downs(), vec![65, 65]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sim.key_ups(), vec![65, 65]);
    }

    fn midi_cmd(message_type: MidiMessageType, channel: u8, data1: u8, data2: u8) -> MidiOutputCommand {
        MidiOutputCommand {
            message_type,
            channel,
            data1,
            data2,
            sysex_data: None,
        }
    }

    #[tokio::test]
    async fn midi_output_sends_note_on_program_change_and_pitch_bend() {
        use crate::facades::NullMidiAdapter;
        let adapter = Arc::new(NullMidiAdapter::new());
        let midi: Arc<dyn MidiAdapter> = adapter.clone();

        let action = MidiOutputAction {
            output_device_name: "loopMIDI Port".to_string(),
            commands: vec![
                midi_cmd(MidiMessageType::NoteOn, 1, 60, 100),
                midi_cmd(MidiMessageType::ProgramChange, 1, 5, 0),
                midi_cmd(MidiMessageType::PitchBend, 2, 0x00, 0x40),
            ],
            midi: Some(midi),
        };

        action.execute(None).await.unwrap();

        assert_eq!(
            adapter.sent(),
            vec![
                ("loopMIDI Port".to_string(), vec![0x90, 60, 100]),
                ("loopMIDI Port".to_string(), vec![0xC0, 5]),
                ("loopMIDI Port".to_string(), vec![0xE1, 0x00, 0x40]),
            ]
        );
    }

    #[tokio::test]
    async fn midi_output_sends_literal_sysex_bytes() {
        use crate::events::SysExPattern;
        use crate::facades::NullMidiAdapter;
        let adapter = Arc::new(NullMidiAdapter::new());
        let midi: Arc<dyn MidiAdapter> = adapter.clone();

        let pattern = SysExPattern::parse("F0 43 12 00 41 F7").unwrap();
        let action = MidiOutputAction {
            output_device_name: "loopMIDI Port".to_string(),
            commands: vec![MidiOutputCommand {
                message_type: MidiMessageType::SysEx,
                channel: 1,
                data1: 0,
                data2: 0,
                sysex_data: Some(pattern),
            }],
            midi: Some(midi),
        };

        action.execute(None).await.unwrap();

        assert_eq!(
            adapter.sent(),
            vec![("loopMIDI Port".to_string(), vec![0xF0, 0x43, 0x12, 0x00, 0x41, 0xF7])]
        );
    }

    #[tokio::test]
    async fn midi_output_sysex_without_pattern_sends_nothing() {
        use crate::facades::NullMidiAdapter;
        let adapter = Arc::new(NullMidiAdapter::new());
        let midi: Arc<dyn MidiAdapter> = adapter.clone();

        let action = MidiOutputAction {
            output_device_name: "loopMIDI Port".to_string(),
            commands: vec![midi_cmd(MidiMessageType::SysEx, 1, 0, 0)],
            midi: Some(midi),
        };

        action.execute(None).await.unwrap();

        assert_eq!(adapter.sent(), vec![("loopMIDI Port".to_string(), vec![])]);
    }
}
