// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Error types surfaced by the core engine.
//!
//! Every error is a typed variant, never a panic or an exception. Callers
//! match on these to decide whether to log-and-continue (the common case
//! for action execution) or abort (profile load failures).

use thiserror::Error;

/// State store rejection: a key outside the user/internal/reserved grammar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state key: {key}")]
pub struct InvalidStateKey {
    pub key: String,
}

/// A single profile validation failure, tied to a JSON-pointer-like path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{path}: {message}")]
pub struct ConfigValidation {
    pub path: String,
    pub message: String,
}

impl ConfigValidation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Aggregated failure returned by the profile loader/validator.
///
/// Loading never partially succeeds: either the profile is fully valid or
/// the caller receives the complete list of violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("profile failed validation with {} error(s)", .0.len())]
pub struct ProfileError(pub Vec<ConfigValidation>);

impl ProfileError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![ConfigValidation::new(path, message)])
    }

    pub fn errors(&self) -> &[ConfigValidation] {
        &self.0
    }
}

/// Errors produced while running an action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Editor-context action executed without its required service. This
    /// indicates a bug in the factory/dispatcher wiring, not user input.
    #[error("service unavailable for {action_kind}: {service}")]
    ServiceUnavailable {
        action_kind: &'static str,
        service: &'static str,
    },

    /// State store rejected a key.
    #[error(transparent)]
    InvalidStateKey(#[from] InvalidStateKey),

    /// The input simulator facade reported a failure emitting an effect.
    #[error("failed to emit {kind}: {source}")]
    InputEmitFailed { kind: &'static str, source: String },

    /// Outgoing MIDI send failed.
    #[error("failed to send MIDI to {device}: {source}")]
    MidiSendFailed { device: String, source: String },

    /// A spawned command failed to start or exited with a non-zero status.
    #[error("command failed: {command}: {detail}")]
    CommandFailed { command: String, detail: String },

    /// A `Sequence` action recorded one or more sub-action failures.
    #[error("sequence failed: {} of {} sub-action(s) errored", .failures.len(), total)]
    SequenceFailed {
        total: usize,
        failures: Vec<(usize, Box<ActionError>)>,
    },
}

/// Errors raised by the mapping registry / profile activation pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("profile validation failed")]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    StateKey(#[from] InvalidStateKey),

    #[error("failed to read profile file {path}: {source}")]
    ProfileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profile JSON: {0}")]
    ProfileJson(#[from] serde_json::Error),
}
