// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Action factory (C5): builds runtime actions from configs, resolving
//! service dependencies according to the construction context.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::actions::config::ActionConfig;
use crate::actions::runtime::*;
use crate::error::ActionError;
use crate::facades::{GameController, InputSimulator, MidiAdapter};
use crate::state::{StateStore, ALTERNATING_KEY_PREFIX};

/// Runtime-context services. All four are always available; the dispatcher
/// is the only caller of this constructor.
#[derive(Clone)]
pub struct Services {
    pub state: Arc<StateStore>,
    pub input: Arc<dyn InputSimulator>,
    pub midi: Arc<dyn MidiAdapter>,
    pub controller: Arc<dyn GameController>,
}

#[derive(Clone)]
enum FactoryContext {
    /// Full service access; used by the dispatcher.
    Runtime(Services),
    /// No service dependencies; used by the GUI profile round trip. Actions
    /// built here hold `None` service refs and fail at `execute` time.
    Editor,
}

/// Constructs runtime actions from declarative configs. Construction itself
/// is pure: it never touches the state store or emits input.
pub struct ActionFactory {
    context: FactoryContext,
}

impl ActionFactory {
    pub fn for_runtime(services: Services) -> Self {
        Self {
            context: FactoryContext::Runtime(services),
        }
    }

    pub fn for_editor() -> Self {
        Self {
            context: FactoryContext::Editor,
        }
    }

    fn state(&self) -> Option<Arc<StateStore>> {
        match &self.context {
            FactoryContext::Runtime(s) => Some(Arc::clone(&s.state)),
            FactoryContext::Editor => None,
        }
    }

    fn input(&self) -> Option<Arc<dyn InputSimulator>> {
        match &self.context {
            FactoryContext::Runtime(s) => Some(Arc::clone(&s.input)),
            FactoryContext::Editor => None,
        }
    }

    fn midi(&self) -> Option<Arc<dyn MidiAdapter>> {
        match &self.context {
            FactoryContext::Runtime(s) => Some(Arc::clone(&s.midi)),
            FactoryContext::Editor => None,
        }
    }

    fn controller(&self) -> Option<Arc<dyn GameController>> {
        match &self.context {
            FactoryContext::Runtime(s) => Some(Arc::clone(&s.controller)),
            FactoryContext::Editor => None,
        }
    }

    fn is_runtime(&self) -> bool {
        matches!(self.context, FactoryContext::Runtime(_))
    }

    fn require_state(&self, action_kind: &'static str) -> Result<Option<Arc<StateStore>>, ActionError> {
        let state = self.state();
        if self.is_runtime() && state.is_none() {
            return Err(ActionError::ServiceUnavailable {
                action_kind,
                service: "StateStore",
            });
        }
        Ok(state)
    }

    fn require_midi(&self, action_kind: &'static str) -> Result<Option<Arc<dyn MidiAdapter>>, ActionError> {
        let midi = self.midi();
        if self.is_runtime() && midi.is_none() {
            return Err(ActionError::ServiceUnavailable {
                action_kind,
                service: "MidiAdapter",
            });
        }
        Ok(midi)
    }

    /// `origin` is a stable identifier for this config's position in the
    /// mapping tree (e.g. `"{device}/{fingerprint}"`), used to derive
    /// auto-generated `Alternating` state keys deterministically.
    pub fn create(
        &self,
        config: &ActionConfig,
        origin: &str,
    ) -> Result<Box<dyn RuntimeAction>, ActionError> {
        Ok(match config {
            ActionConfig::KeyPressRelease { virtual_key } => Box::new(KeyPressReleaseAction {
                virtual_key: *virtual_key,
                input: self.input(),
            }),
            ActionConfig::KeyDown {
                virtual_key,
                auto_release_after_ms,
            } => Box::new(KeyDownAction {
                virtual_key: *virtual_key,
                auto_release_after_ms: *auto_release_after_ms,
                input: self.input(),
                state: self.state(),
            }),
            ActionConfig::KeyUp { virtual_key } => Box::new(KeyUpAction {
                virtual_key: *virtual_key,
                input: self.input(),
                state: self.state(),
            }),
            ActionConfig::KeyToggle { virtual_key } => Box::new(KeyToggleAction {
                down: KeyDownAction {
                    virtual_key: *virtual_key,
                    auto_release_after_ms: None,
                    input: self.input(),
                    state: self.state(),
                },
                up: KeyUpAction {
                    virtual_key: *virtual_key,
                    input: self.input(),
                    state: self.state(),
                },
                virtual_key: *virtual_key,
                state: self.state(),
            }),
            ActionConfig::MouseClick { button } => Box::new(MouseClickAction {
                button: *button,
                input: self.input(),
            }),
            ActionConfig::MouseScroll { direction, amount } => Box::new(MouseScrollAction {
                direction: *direction,
                amount: *amount,
                input: self.input(),
            }),
            ActionConfig::CommandExecution {
                command,
                shell,
                run_hidden,
                wait_for_exit,
            } => Box::new(CommandExecutionAction {
                command: command.clone(),
                shell: *shell,
                run_hidden: *run_hidden,
                wait_for_exit: *wait_for_exit,
                input: self.input(),
            }),
            ActionConfig::Delay { milliseconds } => Box::new(DelayAction {
                milliseconds: *milliseconds,
            }),
            ActionConfig::GameControllerButton {
                button,
                controller_index,
            } => Box::new(GameControllerButtonAction {
                button: button.clone(),
                controller_index: *controller_index,
                controller: self.controller(),
            }),
            ActionConfig::GameControllerAxis {
                axis,
                controller_index,
                axis_value,
                use_midi_value,
                min_value,
                max_value,
                invert,
            } => Box::new(GameControllerAxisAction {
                axis: axis.clone(),
                controller_index: *controller_index,
                axis_value: *axis_value,
                use_midi_value: *use_midi_value,
                min_value: *min_value,
                max_value: *max_value,
                invert: *invert,
                controller: self.controller(),
            }),
            ActionConfig::Sequence {
                sub_actions,
                error_handling,
            } => {
                let mut built = Vec::with_capacity(sub_actions.len());
                for (i, sub) in sub_actions.iter().enumerate() {
                    built.push(self.create(sub, &format!("{origin}/seq{i}"))?);
                }
                Box::new(SequenceAction {
                    sub_actions: built,
                    error_handling: *error_handling,
                })
            }
            ActionConfig::Conditional { conditions } => {
                let mut built = Vec::with_capacity(conditions.len());
                for (i, clause) in conditions.iter().enumerate() {
                    built.push((
                        clause.min_value,
                        clause.max_value,
                        self.create(&clause.action, &format!("{origin}/cond{i}"))?,
                    ));
                }
                Box::new(ConditionalAction { conditions: built })
            }
            ActionConfig::RelativeCC { increase, decrease } => Box::new(RelativeCcAction {
                increase: self.create(increase, &format!("{origin}/inc"))?,
                decrease: self.create(decrease, &format!("{origin}/dec"))?,
            }),
            ActionConfig::MidiOutput {
                output_device_name,
                commands,
            } => Box::new(MidiOutputAction {
                output_device_name: output_device_name.clone(),
                commands: commands.clone(),
                midi: self.require_midi("MidiOutput")?,
            }),
            ActionConfig::SetState {
                state_key,
                state_value,
            } => Box::new(SetStateAction {
                state_key: state_key.clone(),
                state_value: *state_value,
                state: self.require_state("SetState")?,
            }),
            ActionConfig::StateConditional {
                state_key,
                condition,
            } => Box::new(StateConditionalAction {
                state_key: state_key.clone(),
                state_value: condition.state_value,
                comparison: condition.comparison,
                action: self.create(&condition.action, &format!("{origin}/statecond"))?,
                set_state_after: condition.set_state_after,
                state: self.require_state("StateConditional")?,
            }),
            ActionConfig::Alternating {
                primary,
                secondary,
                start_with_primary,
                state_key,
            } => {
                let key = match state_key {
                    Some(k) => k.clone(),
                    None => auto_alternating_key(origin),
                };
                Box::new(AlternatingAction {
                    state_key: key,
                    primary: self.create(primary, &format!("{origin}/primary"))?,
                    secondary: self.create(secondary, &format!("{origin}/secondary"))?,
                    start_with_primary: *start_with_primary,
                    state: self.require_state("Alternating")?,
                })
            }
        })
    }
}

/// Deterministic auto-generated state key for `Alternating` actions with no
/// explicit `state_key`, in the reserved `@Alt` namespace.
fn auto_alternating_key(origin: &str) -> String {
    let mut hasher = DefaultHasher::new();
    origin.hash(&mut hasher);
    format!("{ALTERNATING_KEY_PREFIX}{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::config::{ActionConfig, ErrorHandling};

    #[test]
    fn auto_key_is_deterministic_and_namespaced() {
        let a = auto_alternating_key("DevA/NoteOn(60)");
        let b = auto_alternating_key("DevA/NoteOn(60)");
        let c = auto_alternating_key("DevA/NoteOn(61)");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(ALTERNATING_KEY_PREFIX));
        assert!(!crate::state::is_user_key(&a));
        assert!(!crate::state::is_internal_key(&a));
    }

    #[tokio::test]
    async fn editor_context_builds_without_panicking() {
        let factory = ActionFactory::for_editor();
        let cfg = ActionConfig::Sequence {
            sub_actions: vec![ActionConfig::KeyPressRelease { virtual_key: 65 }],
            error_handling: ErrorHandling::StopOnError,
        };
        let action = factory.create(&cfg, "root").unwrap();
        let err = action.execute(None).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::SequenceFailed { .. }
        ));
    }

    #[test]
    fn editor_context_required_service_actions_construct_successfully() {
        let factory = ActionFactory::for_editor();
        let cfg = ActionConfig::SetState {
            state_key: "Foo".to_string(),
            state_value: 1,
        };
        assert!(factory.create(&cfg, "root").is_ok());
    }
}
