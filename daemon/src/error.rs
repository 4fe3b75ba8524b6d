// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Errors surfaced by the daemon binary itself (CLI, adapter setup, and the
//! profile file watcher). Profile validation failures are the core's own
//! [`midirouter_core::ProfileError`]; this type wraps the narrower set of
//! things that can go wrong outside the core.

use midirouter_core::ProfileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("failed to initialize MIDI adapter: {0}")]
    MidiAdapter(String),

    #[error("failed to initialize input simulator: {0}")]
    InputSimulator(String),

    #[error("no input port matching {0:?} found")]
    DeviceNotFound(String),

    #[error("failed to watch profile file: {0}")]
    FileWatcher(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
