// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! MIDI-to-input router core engine.
//!
//! A user-space daemon core that listens on MIDI input devices and routes
//! messages to synthetic keyboard/mouse input, game-controller emulation,
//! shell commands, outbound MIDI, and a small persistent state machine —
//! driven entirely by a declarative, hot-reloadable JSON profile.
//!
//! This crate is UI- and hardware-independent: it only depends on the
//! [`facades`] traits for OS input emission, MIDI I/O, and controller
//! emulation. Concrete implementations (midir, enigo, uinput) live in the
//! `midirouter-daemon` binary crate.
//!
//! # Architecture
//!
//! ```text
//! MidiAdapter callback → Dispatcher (C9) → MappingRegistry (C6) lookup
//!   → EventProcessor (C10) → RuntimeAction::execute (C4)
//! ```
//!
//! Profile activation flows the other direction: [`loader`] validates a
//! profile and builds a [`mapping::RegistrySnapshot`]; [`device_manager`]
//! publishes it atomically; [`controller`] is the load/reload entry point
//! a host binds to its CLI or file-watcher.

#![allow(missing_docs)]

pub mod actions;
pub mod controller;
pub mod device_manager;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod facades;
pub mod loader;
pub mod logging;
pub mod mapping;
pub mod processor;
pub mod profile;
pub mod state;

pub use actions::{ActionConfig, ActionFactory, RuntimeAction, Services};
pub use controller::ProfileController;
pub use device_manager::DeviceConfigManager;
pub use dispatcher::Dispatcher;
pub use error::{ActionError, ConfigValidation, EngineError, InvalidStateKey, ProfileError};
pub use events::{ChannelSelector, EventFingerprint, EventKind, MidiEvent, RelativeEncoding};
pub use facades::{DeviceInfo, FacadeError, GameController, InputSimulator, MidiAdapter};
pub use mapping::{MappingRegistry, RegistrySnapshot};
pub use processor::EventProcessor;
pub use profile::{DeviceConfig, InputType, MappingEntry, Profile};
pub use state::StateStore;
