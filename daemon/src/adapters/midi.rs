// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Concrete `midir`-backed `MidiAdapter` (C3): device enumeration, outbound
//! sends, and the callback that turns raw bytes into a [`MidiEvent`] bound
//! for the dispatcher (C9).
//!
//! Mirrors the teacher's own `midi_device.rs` connection/callback shape,
//! trimmed of its reconnection state machine (the daemon's file-watch-driven
//! hot reload is the only lifecycle concern this binary carries).

use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use midirouter_core::facades::{DeviceInfo, FacadeError, MidiAdapter};
use midirouter_core::{DeviceConfigManager, Dispatcher, MidiEvent, RelativeEncoding};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

fn channel_to_u8(channel: Channel) -> u8 {
    match channel {
        Channel::Ch1 => 1,
        Channel::Ch2 => 2,
        Channel::Ch3 => 3,
        Channel::Ch4 => 4,
        Channel::Ch5 => 5,
        Channel::Ch6 => 6,
        Channel::Ch7 => 7,
        Channel::Ch8 => 8,
        Channel::Ch9 => 9,
        Channel::Ch10 => 10,
        Channel::Ch11 => 11,
        Channel::Ch12 => 12,
        Channel::Ch13 => 13,
        Channel::Ch14 => 14,
        Channel::Ch15 => 15,
        Channel::Ch16 => 16,
    }
}

/// Parse raw MIDI bytes delivered by a midir callback into a [`MidiEvent`].
/// `device_name`/`devices` are consulted only to decide whether an incoming
/// control change is relative or absolute (the wire bytes don't say).
fn parse_event(bytes: &[u8], device_name: &str, devices: &DeviceConfigManager) -> Option<MidiEvent> {
    match MidiMsg::from_midi(bytes) {
        Ok((MidiMsg::ChannelVoice { channel, msg }, _))
        | Ok((MidiMsg::RunningChannelVoice { channel, msg }, _)) => {
            let channel = channel_to_u8(channel);
            match msg {
                ChannelVoiceMsg::NoteOn { note, velocity } => Some(MidiEvent::note_on(channel, note, velocity)),
                ChannelVoiceMsg::NoteOff { note, .. } => Some(MidiEvent::note_off(channel, note)),
                ChannelVoiceMsg::ControlChange { control } => match control {
                    ControlChange::CC { control: cc, value } => {
                        if devices.is_relative_cc(device_name, channel, cc) {
                            Some(MidiEvent::control_change(
                                channel,
                                cc,
                                value,
                                true,
                                Some(RelativeEncoding::SignMagnitude),
                            ))
                        } else {
                            Some(MidiEvent::control_change(channel, cc, value, false, None))
                        }
                    }
                    other => {
                        trace!(?other, "unsupported ControlChange variant, ignored");
                        None
                    }
                },
                other => {
                    trace!(?other, "unsupported channel-voice message, ignored");
                    None
                }
            }
        }
        Ok((MidiMsg::SystemExclusive { .. }, _)) => Some(MidiEvent::sysex(1, bytes.to_vec())),
        Ok((other, _)) => {
            trace!(?other, "unsupported MIDI message kind, ignored");
            None
        }
        Err(e) => {
            debug!(error = ?e, bytes = ?bytes, "failed to parse MIDI message");
            None
        }
    }
}

/// Holds open output connections by device name, opened lazily on first
/// send since a profile may reference a `MidiOutput` device never opened
/// for input.
///
/// Takes no `DeviceConfigManager` at construction time: the manager's
/// `Services` holds this adapter as its `dyn MidiAdapter`, so depending on
/// the manager here would be circular. `connect_input` instead receives the
/// manager reference it needs per call.
pub struct MidirAdapter {
    midi_out: Mutex<MidiOutput>,
    outputs: Mutex<HashMap<String, MidiOutputConnection>>,
}

impl MidirAdapter {
    pub fn new() -> Result<Self, String> {
        let midi_out = MidiOutput::new("midirouter").map_err(|e| e.to_string())?;
        Ok(Self {
            midi_out: Mutex::new(midi_out),
            outputs: Mutex::new(HashMap::new()),
        })
    }

    pub fn list_input_ports(&self) -> Result<Vec<(usize, String)>, String> {
        let midi_in = MidiInput::new("midirouter-list").map_err(|e| e.to_string())?;
        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(i, p)| (i, midi_in.port_name(p).unwrap_or_else(|_| format!("port {i}"))))
            .collect())
    }

    /// Open `port_index` for input, binding `device_id` to `device_name` in
    /// `devices` and routing every parsed event to `dispatcher`. Returns the
    /// connection; the caller must keep it alive for the life of the
    /// session (dropping it closes the port).
    pub fn connect_input(
        &self,
        port_index: usize,
        device_id: String,
        device_name: String,
        devices: Arc<DeviceConfigManager>,
        dispatcher: Arc<Dispatcher>,
        rt: tokio::runtime::Handle,
    ) -> Result<MidiInputConnection<()>, String> {
        let midi_in = MidiInput::new("midirouter").map_err(|e| e.to_string())?;
        let ports = midi_in.ports();
        let port = ports.get(port_index).ok_or("port index out of range")?;
        let port_name = midi_in.port_name(port).unwrap_or_else(|_| device_name.clone());

        devices.bind_device(&device_id, &device_name);
        debug!(port_name, device_id, device_name, "opening MIDI input port");

        let callback = move |_timestamp_us: u64, bytes: &[u8], _: &mut ()| {
            if let Some(event) = parse_event(bytes, &device_name, &devices) {
                let dispatcher = Arc::clone(&dispatcher);
                let device_id = device_id.clone();
                rt.spawn_blocking(move || dispatcher.dispatch(&device_id, event));
            }
        };

        midi_in
            .connect(port, &port_name, callback, ())
            .map_err(|e| e.to_string())
    }
}

impl MidiAdapter for MidirAdapter {
    fn list_devices(&self) -> Vec<DeviceInfo> {
        let midi_out = self.midi_out.lock().unwrap();
        midi_out
            .ports()
            .iter()
            .map(|p| DeviceInfo {
                id: midi_out.port_name(p).unwrap_or_default(),
                name: midi_out.port_name(p).unwrap_or_default(),
                supports_input: true,
                supports_output: true,
            })
            .collect()
    }

    fn send(&self, output_device_name: &str, bytes: &[u8]) -> Result<(), FacadeError> {
        let mut outputs = self.outputs.lock().unwrap();
        if !outputs.contains_key(output_device_name) {
            let midi_out = MidiOutput::new("midirouter-out").map_err(|e| FacadeError::MidiSend {
                device: output_device_name.to_string(),
                detail: e.to_string(),
            })?;
            let ports = midi_out.ports();
            let port = ports
                .iter()
                .find(|p| midi_out.port_name(p).map(|n| n == output_device_name).unwrap_or(false))
                .ok_or_else(|| FacadeError::MidiSend {
                    device: output_device_name.to_string(),
                    detail: "device not connected".to_string(),
                })?;
            let conn = midi_out
                .connect(port, "midirouter-out")
                .map_err(|e| FacadeError::MidiSend {
                    device: output_device_name.to_string(),
                    detail: e.to_string(),
                })?;
            outputs.insert(output_device_name.to_string(), conn);
        }

        let conn = outputs.get_mut(output_device_name).expect("just inserted");
        conn.send(bytes).map_err(|e| {
            warn!(device = output_device_name, error = %e, "MIDI send failed");
            FacadeError::MidiSend {
                device: output_device_name.to_string(),
                detail: e.to_string(),
            }
        })
    }
}
