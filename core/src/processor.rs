// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Per-event task execution (C10): fire-and-forget, sequential within an
//! event, parallel across events, with per-action error isolation.

use std::sync::Arc;
use tracing::error;

use crate::actions::RuntimeAction;

/// Spawns one detached task per event. Actions within that task run in
/// the order the registry returned them; a single action's failure is
/// logged and does not prevent the remaining actions for the same event
/// from running, nor does it affect any other in-flight event.
pub struct EventProcessor;

impl EventProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Submit `actions` (already resolved for one incoming event) for
    /// execution. Returns immediately — the caller (the dispatcher) never
    /// waits on completion, so a slow or stuck action never backs up the
    /// callback thread that produced the event.
    pub fn submit(&self, actions: Vec<Arc<dyn RuntimeAction>>, midi_value: Option<i32>) {
        if actions.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for action in actions {
                if let Err(e) = action.execute(midi_value).await {
                    error!(error = %e, "action execution failed");
                }
            }
        });
    }
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::runtime::KeyPressReleaseAction;
    use crate::facades::{InputSimulator, NullInputSimulator};
    use std::time::Duration;

    #[tokio::test]
    async fn submits_and_executes_actions_in_order() {
        let sim = Arc::new(NullInputSimulator::new());
        let input: Arc<dyn InputSimulator> = sim.clone();
        let action1: Arc<dyn RuntimeAction> = Arc::new(KeyPressReleaseAction {
            virtual_key: 65,
            input: Some(input.clone()),
        });
        let action2: Arc<dyn RuntimeAction> = Arc::new(KeyPressReleaseAction {
            virtual_key: 66,
            input: Some(input.clone()),
        });

        let processor = EventProcessor::new();
        processor.submit(vec![action1, action2], None);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sim.key_downs(), vec![65, 66]);
    }

    #[tokio::test]
    async fn one_failing_action_does_not_block_the_next() {
        let sim = Arc::new(NullInputSimulator::new());
        let input: Arc<dyn InputSimulator> = sim.clone();
        let failing: Arc<dyn RuntimeAction> = Arc::new(KeyPressReleaseAction {
            virtual_key: 65,
            input: None,
        });
        let succeeding: Arc<dyn RuntimeAction> = Arc::new(KeyPressReleaseAction {
            virtual_key: 66,
            input: Some(input.clone()),
        });

        let processor = EventProcessor::new();
        processor.submit(vec![failing, succeeding], None);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sim.key_downs(), vec![66]);
    }

    #[test]
    fn empty_submission_spawns_nothing() {
        // No tokio runtime required: submit() returns before touching it.
        let processor = EventProcessor::new();
        processor.submit(Vec::new(), None);
    }
}
