// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Concrete `enigo`-backed `InputSimulator` (C2).
//!
//! Grounded in the teacher's `midimon-daemon/src/action_executor.rs`
//! (enigo-driven keyboard/mouse/shell execution), adapted to the profile's
//! raw virtual-key codes: `enigo::Key::Raw(vk)` passes the code straight
//! through to the platform backend instead of remapping through a named-key
//! table, matching the spec's "opaque `virtual_key: u16`" contract.

use enigo::{Button, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use midirouter_core::facades::{FacadeError, InputSimulator, MouseButton, ScrollDirection, Shell};
use std::process::{Command, Stdio};
use std::sync::Mutex;

pub struct EnigoInputSimulator {
    enigo: Mutex<Enigo>,
}

impl EnigoInputSimulator {
    pub fn new() -> Result<Self, String> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| e.to_string())?;
        Ok(Self { enigo: Mutex::new(enigo) })
    }
}

fn emit(kind: &'static str, result: enigo::InputResult<()>) -> Result<(), FacadeError> {
    result.map_err(|e| FacadeError::InputEmit { kind, detail: e.to_string() })
}

impl InputSimulator for EnigoInputSimulator {
    fn send_key_down(&self, vk: u16) -> Result<(), FacadeError> {
        let mut enigo = self.enigo.lock().unwrap();
        emit("key_down", enigo.key(Key::Raw(vk), Direction::Press))
    }

    fn send_key_up(&self, vk: u16) -> Result<(), FacadeError> {
        let mut enigo = self.enigo.lock().unwrap();
        emit("key_up", enigo.key(Key::Raw(vk), Direction::Release))
    }

    fn send_mouse_click(&self, button: MouseButton) -> Result<(), FacadeError> {
        let mut enigo = self.enigo.lock().unwrap();
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
            MouseButton::Middle => Button::Middle,
        };
        emit("mouse_click", enigo.button(button, Direction::Click))
    }

    fn send_mouse_scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), FacadeError> {
        let mut enigo = self.enigo.lock().unwrap();
        let amount = amount as i32;
        let result = match direction {
            ScrollDirection::Up => enigo.scroll(-amount, enigo::Axis::Vertical),
            ScrollDirection::Down => enigo.scroll(amount, enigo::Axis::Vertical),
            ScrollDirection::Left => enigo.scroll(-amount, enigo::Axis::Horizontal),
            ScrollDirection::Right => enigo.scroll(amount, enigo::Axis::Horizontal),
        };
        emit("mouse_scroll", result)
    }

    fn run_command(&self, command: &str, shell: Shell, hidden: bool, wait: bool) -> Result<(), FacadeError> {
        let (program, flag) = match shell {
            Shell::PowerShell => ("powershell", "-Command"),
            Shell::CommandPrompt => ("cmd", "/C"),
        };
        let mut cmd = Command::new(program);
        cmd.arg(flag).arg(command);
        if hidden {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let mut child = cmd.spawn().map_err(|e| FacadeError::Command {
            command: command.to_string(),
            detail: e.to_string(),
        })?;
        if wait {
            let status = child.wait().map_err(|e| FacadeError::Command {
                command: command.to_string(),
                detail: e.to_string(),
            })?;
            if !status.success() {
                return Err(FacadeError::Command {
                    command: command.to_string(),
                    detail: format!("exited with {status}"),
                });
            }
        }
        Ok(())
    }
}
