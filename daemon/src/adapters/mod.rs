// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Concrete facade implementations wiring `midirouter-core` to real hardware.

pub mod gamepad;
pub mod input_sim;
pub mod midi;
