// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Concrete `uinput`-backed `GameController`.
//!
//! The teacher's `gamepad_device.rs` wraps `gilrs`, which only reads
//! physical controllers — it has no way to emit synthetic button/axis state.
//! `GameController` is an emulation facade (`set_button`/`set_axis`), so this
//! adapter instead drives the kernel `uinput` subsystem directly, building a
//! virtual gamepad with `uinput::Device::name(...).event(...).create()` the
//! way `other_examples/manifests/RyosukeMondo-keyrx2` uses the same crate.
//!
//! One virtual device is created per `controller_index` the profile
//! references, lazily, on first use.

use midirouter_core::facades::{FacadeError, GameController};
use std::collections::HashMap;
use std::sync::Mutex;
use uinput::event::controller::{Controller, DPad, GamePad};
use uinput::event::absolute::{Absolute, Position};
use uinput::Device;

const AXES: &[(&str, Position)] = &[
    ("left_x", Position::X),
    ("left_y", Position::Y),
    ("right_x", Position::RX),
    ("right_y", Position::RY),
];

fn button_event(name: &str) -> Option<Controller> {
    Some(match name {
        "a" | "south" => Controller::GamePad(GamePad::A),
        "b" | "east" => Controller::GamePad(GamePad::B),
        "x" | "west" => Controller::GamePad(GamePad::X),
        "y" | "north" => Controller::GamePad(GamePad::Y),
        "left_shoulder" | "lb" => Controller::GamePad(GamePad::TL),
        "right_shoulder" | "rb" => Controller::GamePad(GamePad::TR),
        "left_stick" => Controller::GamePad(GamePad::ThumbL),
        "right_stick" => Controller::GamePad(GamePad::ThumbR),
        "start" => Controller::GamePad(GamePad::Start),
        "select" | "back" => Controller::GamePad(GamePad::Select),
        "dpad_up" => Controller::DPad(DPad::Up),
        "dpad_down" => Controller::DPad(DPad::Down),
        "dpad_left" => Controller::DPad(DPad::Left),
        "dpad_right" => Controller::DPad(DPad::Right),
        _ => return None,
    })
}

fn build_virtual_pad(controller_index: u8) -> Result<Device, String> {
    let mut builder = uinput::default()
        .map_err(|e| e.to_string())?
        .name(format!("midirouter-pad-{controller_index}"))
        .map_err(|e| e.to_string())?;

    for (_, axis) in AXES {
        builder = builder
            .event(Absolute::Position(*axis))
            .map_err(|e| e.to_string())?
            .min(-32768)
            .max(32767);
    }

    let buttons = [
        GamePad::A, GamePad::B, GamePad::X, GamePad::Y,
        GamePad::TL, GamePad::TR, GamePad::ThumbL, GamePad::ThumbR,
        GamePad::Start, GamePad::Select,
    ];
    for button in buttons {
        builder = builder
            .event(Controller::GamePad(button))
            .map_err(|e| e.to_string())?;
    }
    for dpad in [DPad::Up, DPad::Down, DPad::Left, DPad::Right] {
        builder = builder
            .event(Controller::DPad(dpad))
            .map_err(|e| e.to_string())?;
    }

    builder.create().map_err(|e| e.to_string())
}

pub struct UinputGameController {
    pads: Mutex<HashMap<u8, Device>>,
}

impl UinputGameController {
    pub fn new() -> Self {
        Self { pads: Mutex::new(HashMap::new()) }
    }

    fn with_pad<T>(
        &self,
        controller_index: u8,
        f: impl FnOnce(&mut Device) -> uinput::Result<T>,
    ) -> Result<T, FacadeError> {
        let mut pads = self.pads.lock().unwrap();
        if !pads.contains_key(&controller_index) {
            let pad = build_virtual_pad(controller_index).map_err(|detail| FacadeError::InputEmit {
                kind: "gamepad_create",
                detail,
            })?;
            pads.insert(controller_index, pad);
        }
        let pad = pads.get_mut(&controller_index).expect("just inserted");
        f(pad).map_err(|e| FacadeError::InputEmit { kind: "gamepad_emit", detail: e.to_string() })
    }
}

impl Default for UinputGameController {
    fn default() -> Self {
        Self::new()
    }
}

impl GameController for UinputGameController {
    fn set_button(&self, controller_index: u8, name: &str, pressed: bool) -> Result<(), FacadeError> {
        let Some(event) = button_event(name) else {
            return Err(FacadeError::InputEmit {
                kind: "gamepad_button",
                detail: format!("unknown button name {name:?}"),
            });
        };
        self.with_pad(controller_index, |pad| {
            pad.send(event, if pressed { 1 } else { 0 })?;
            pad.synchronize()
        })
    }

    fn set_axis(&self, controller_index: u8, name: &str, value: f32) -> Result<(), FacadeError> {
        let Some((_, axis)) = AXES.iter().find(|(n, _)| *n == name) else {
            return Err(FacadeError::InputEmit {
                kind: "gamepad_axis",
                detail: format!("unknown axis name {name:?}"),
            });
        };
        let scaled = (value.clamp(-1.0, 1.0) * 32767.0) as i32;
        self.with_pad(controller_index, |pad| {
            pad.send(Absolute::Position(*axis), scaled)?;
            pad.synchronize()
        })
    }
}
