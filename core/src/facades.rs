// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Contracts the core consumes from its host environment: input
//! simulation (C2), MIDI I/O (C3), and game-controller emulation. Concrete
//! implementations live outside this crate (see the daemon's `adapters`
//! module); the core only depends on these traits.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shell {
    PowerShell,
    CommandPrompt,
}

/// Errors returned across the facade boundary. Concrete adapters wrap
/// their own error types' `Display` output into these variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacadeError {
    InputEmit { kind: &'static str, detail: String },
    MidiSend { device: String, detail: String },
    Command { command: String, detail: String },
}

impl fmt::Display for FacadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacadeError::InputEmit { kind, detail } => write!(f, "{kind}: {detail}"),
            FacadeError::MidiSend { device, detail } => write!(f, "{device}: {detail}"),
            FacadeError::Command { command, detail } => write!(f, "{command}: {detail}"),
        }
    }
}

/// The OS input simulator the core emits synthetic input through.
///
/// Implementations are assumed thread-safe: the dispatcher may call these
/// methods concurrently from multiple worker threads.
pub trait InputSimulator: Send + Sync {
    fn send_key_down(&self, vk: u16) -> Result<(), FacadeError>;
    fn send_key_up(&self, vk: u16) -> Result<(), FacadeError>;
    fn send_mouse_click(&self, button: MouseButton) -> Result<(), FacadeError>;
    fn send_mouse_scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), FacadeError>;

    /// Spawn `command` via `shell`. If `wait` is true, blocks the calling
    /// (worker) thread until the child exits and returns its status.
    fn run_command(
        &self,
        command: &str,
        shell: Shell,
        hidden: bool,
        wait: bool,
    ) -> Result<(), FacadeError>;
}

/// Information about a discoverable MIDI device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub supports_input: bool,
    pub supports_output: bool,
}

/// The MIDI hardware adapter the core consumes for device enumeration,
/// subscription, and outbound sends. Device opening/closing and the
/// callback-driven event subscription are host responsibilities; the core
/// only calls `send` directly (for `MidiOutput` actions).
pub trait MidiAdapter: Send + Sync {
    fn list_devices(&self) -> Vec<DeviceInfo>;
    fn send(&self, output_device_name: &str, bytes: &[u8]) -> Result<(), FacadeError>;
}

/// The game-controller emulation backend the core consumes for
/// `GameControllerButton`/`GameControllerAxis` actions.
pub trait GameController: Send + Sync {
    fn set_button(&self, controller_index: u8, name: &str, pressed: bool) -> Result<(), FacadeError>;
    fn set_axis(&self, controller_index: u8, name: &str, value: f32) -> Result<(), FacadeError>;
}

/// An [`InputSimulator`] that records calls without touching the OS.
/// Used by editor-context round trips and unit tests (grounds scenarios
/// S1/S2/S4/S5/S6, which assert on the exact emitted call sequence).
#[cfg(any(test, feature = "test-mocks"))]
pub struct NullInputSimulator {
    key_downs: std::sync::Mutex<Vec<u16>>,
    key_ups: std::sync::Mutex<Vec<u16>>,
}

#[cfg(any(test, feature = "test-mocks"))]
impl NullInputSimulator {
    pub fn new() -> Self {
        Self {
            key_downs: std::sync::Mutex::new(Vec::new()),
            key_ups: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn key_downs(&self) -> Vec<u16> {
        self.key_downs.lock().unwrap().clone()
    }

    pub fn key_ups(&self) -> Vec<u16> {
        self.key_ups.lock().unwrap().clone()
    }

    /// Interleaved `(is_down, vk)` call log, for tests that assert ordering
    /// across down/up pairs (e.g. S1's `down(65), up(65); down(66), up(66)`).
    pub fn calls(&self) -> Vec<(bool, u16)> {
        let downs = self.key_downs.lock().unwrap();
        let ups = self.key_ups.lock().unwrap();
        let mut all: Vec<(bool, u16, usize)> = downs
            .iter()
            .enumerate()
            .map(|(i, v)| (true, *v, i))
            .chain(ups.iter().enumerate().map(|(i, v)| (false, *v, i)))
            .collect();
        all.sort_by_key(|(_, _, seq)| *seq);
        all.into_iter().map(|(d, v, _)| (d, v)).collect()
    }
}

#[cfg(any(test, feature = "test-mocks"))]
impl Default for NullInputSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-mocks"))]
impl InputSimulator for NullInputSimulator {
    fn send_key_down(&self, vk: u16) -> Result<(), FacadeError> {
        self.key_downs.lock().unwrap().push(vk);
        Ok(())
    }

    fn send_key_up(&self, vk: u16) -> Result<(), FacadeError> {
        self.key_ups.lock().unwrap().push(vk);
        Ok(())
    }

    fn send_mouse_click(&self, _button: MouseButton) -> Result<(), FacadeError> {
        Ok(())
    }

    fn send_mouse_scroll(&self, _direction: ScrollDirection, _amount: u32) -> Result<(), FacadeError> {
        Ok(())
    }

    fn run_command(
        &self,
        _command: &str,
        _shell: Shell,
        _hidden: bool,
        _wait: bool,
    ) -> Result<(), FacadeError> {
        Ok(())
    }
}

/// A [`MidiAdapter`] that accepts every send without touching hardware.
#[cfg(any(test, feature = "test-mocks"))]
#[derive(Default)]
pub struct NullMidiAdapter {
    sent: std::sync::Mutex<Vec<(String, Vec<u8>)>>,
}

#[cfg(any(test, feature = "test-mocks"))]
impl NullMidiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(any(test, feature = "test-mocks"))]
impl MidiAdapter for NullMidiAdapter {
    fn list_devices(&self) -> Vec<DeviceInfo> {
        Vec::new()
    }

    fn send(&self, output_device_name: &str, bytes: &[u8]) -> Result<(), FacadeError> {
        self.sent
            .lock()
            .unwrap()
            .push((output_device_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// A [`GameController`] that accepts every call without emulating hardware.
#[cfg(any(test, feature = "test-mocks"))]
#[derive(Default)]
pub struct NullGameController;

#[cfg(any(test, feature = "test-mocks"))]
impl GameController for NullGameController {
    fn set_button(&self, _controller_index: u8, _name: &str, _pressed: bool) -> Result<(), FacadeError> {
        Ok(())
    }

    fn set_axis(&self, _controller_index: u8, _name: &str, _value: f32) -> Result<(), FacadeError> {
        Ok(())
    }
}
