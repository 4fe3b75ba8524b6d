// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Incoming MIDI event representation and the fingerprint derived from it
//! for mapping registry lookups.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// How a relative (encoder-style) control-change value is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativeEncoding {
    SignMagnitude,
    TwosComplement,
    BinaryOffset,
}

/// The structured classification of a [`MidiEvent`], independent of channel
/// or device. Used to branch dispatch and to build fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    ControlChange,
    SysEx,
    Other,
    Error,
}

/// A single MIDI message as delivered by the adapter facade.
///
/// Immutable once constructed. `channel` is 1-indexed (`1..=16`) to match
/// the wire convention used throughout the profile format.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiEvent {
    pub event_type: EventKind,
    pub channel: u8,
    pub note: Option<u8>,
    pub velocity: Option<u8>,
    pub control: Option<u8>,
    pub value: Option<u8>,
    pub is_relative: bool,
    pub relative_encoding: Option<RelativeEncoding>,
    pub raw_bytes: Option<Vec<u8>>,
    pub timestamp_ms: u64,
}

impl MidiEvent {
    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        // A NoteOn with velocity 0 is conventionally a NoteOff on real hardware.
        if velocity == 0 {
            return Self::note_off(channel, note);
        }
        Self {
            event_type: EventKind::NoteOn,
            channel,
            note: Some(note),
            velocity: Some(velocity),
            control: None,
            value: None,
            is_relative: false,
            relative_encoding: None,
            raw_bytes: None,
            timestamp_ms: Self::now_ms(),
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self {
            event_type: EventKind::NoteOff,
            channel,
            note: Some(note),
            velocity: Some(0),
            control: None,
            value: None,
            is_relative: false,
            relative_encoding: None,
            raw_bytes: None,
            timestamp_ms: Self::now_ms(),
        }
    }

    pub fn control_change(
        channel: u8,
        control: u8,
        value: u8,
        is_relative: bool,
        relative_encoding: Option<RelativeEncoding>,
    ) -> Self {
        Self {
            event_type: EventKind::ControlChange,
            channel,
            note: None,
            velocity: None,
            control: Some(control),
            value: Some(value),
            is_relative,
            relative_encoding,
            raw_bytes: None,
            timestamp_ms: Self::now_ms(),
        }
    }

    pub fn sysex(channel: u8, bytes: Vec<u8>) -> Self {
        Self {
            event_type: EventKind::SysEx,
            channel,
            note: None,
            velocity: None,
            control: None,
            value: None,
            is_relative: false,
            relative_encoding: None,
            raw_bytes: Some(bytes),
            timestamp_ms: Self::now_ms(),
        }
    }

    /// MIDI scalar carried to actions via `execute(midi_value)`: velocity
    /// for notes, value for control changes, `None` otherwise.
    pub fn midi_value(&self) -> Option<u8> {
        match self.event_type {
            EventKind::NoteOn | EventKind::NoteOff => self.velocity,
            EventKind::ControlChange => self.value,
            _ => None,
        }
    }

    /// The value actually handed to `RuntimeAction::execute`. For relative
    /// control changes this is the *decoded signed delta* under the
    /// event's `relative_encoding`, not the raw byte — the only point in
    /// the pipeline that interprets relative encodings, so `RelativeCC`
    /// runtime actions stay a pure sign check.
    pub fn resolved_value(&self) -> Option<i32> {
        if self.is_relative {
            let encoding = self.relative_encoding?;
            let raw = self.value?;
            return Some(crate::actions::relative::decode(raw, encoding));
        }
        self.midi_value().map(|v| v as i32)
    }
}

/// The classification portion of an [`EventFingerprint`]: identifies which
/// registry bucket and key an event matches under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FingerprintKind {
    NoteOn(u8),
    NoteOff(u8),
    ControlChangeAbsolute(u8),
    ControlChangeRelative(u8),
    SysEx(SysExPattern),
}

/// A channel selector: either a concrete MIDI channel or the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSelector {
    Channel(u8),
    Any,
}

/// The derived key used to index the mapping registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventFingerprint {
    pub device_name: String,
    pub channel: ChannelSelector,
    pub kind: FingerprintKind,
}

/// A single byte position in a SysEx match pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysExByte {
    Literal(u8),
    Wildcard,
}

/// An ordered byte-pattern used to match incoming SysEx payloads.
///
/// Must start with a literal `0xF0` and end with a literal `0xF7`;
/// wildcards are only permitted at data positions in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SysExPattern {
    bytes: Vec<SysExByte>,
}

impl SysExPattern {
    /// Build a pattern from already-validated bytes. Returns `None` if the
    /// framing constraints (leading `F0`, trailing `F7`, no out-of-range
    /// literal) are violated.
    pub fn new(bytes: Vec<SysExByte>) -> Option<Self> {
        match (bytes.first(), bytes.last()) {
            (Some(SysExByte::Literal(0xF0)), Some(SysExByte::Literal(0xF7))) => {}
            _ => return None,
        }
        for b in &bytes {
            if let SysExByte::Literal(v) = b {
                if *v > 0x7F {
                    return None;
                }
            }
        }
        Some(Self { bytes })
    }

    /// Parse the configured string form: whitespace-separated hex byte
    /// pairs, with `XX` denoting a wildcard.
    pub fn parse(s: &str) -> Option<Self> {
        let mut bytes = Vec::new();
        for tok in s.split_whitespace() {
            if tok.eq_ignore_ascii_case("XX") {
                bytes.push(SysExByte::Wildcard);
            } else {
                let v = u8::from_str_radix(tok, 16).ok()?;
                bytes.push(SysExByte::Literal(v));
            }
        }
        Self::new(bytes)
    }

    /// Render back to the configured string form (round-trip serialization).
    pub fn to_config_string(&self) -> String {
        self.bytes
            .iter()
            .map(|b| match b {
                SysExByte::Literal(v) => format!("{v:02X}"),
                SysExByte::Wildcard => "XX".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The pattern as a concrete byte sequence, for outbound use where a
    /// wildcard has no meaning. Returns `None` if any byte is a `Wildcard`.
    pub fn literal_bytes(&self) -> Option<Vec<u8>> {
        self.bytes
            .iter()
            .map(|b| match b {
                SysExByte::Literal(v) => Some(*v),
                SysExByte::Wildcard => None,
            })
            .collect()
    }

    /// Length-equal, byte-equal-at-literals match against a raw payload.
    pub fn matches(&self, payload: &[u8]) -> bool {
        if payload.len() != self.bytes.len() {
            return false;
        }
        self.bytes.iter().zip(payload.iter()).all(|(pat, b)| match pat {
            SysExByte::Literal(v) => v == b,
            SysExByte::Wildcard => true,
        })
    }
}

impl Serialize for SysExPattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_config_string())
    }
}

impl<'de> Deserialize<'de> for SysExPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SysExPattern::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid SysEx pattern: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_zero_velocity_becomes_note_off() {
        let ev = MidiEvent::note_on(1, 60, 0);
        assert_eq!(ev.event_type, EventKind::NoteOff);
    }

    #[test]
    fn sysex_wildcard_matches_s3() {
        let pattern = SysExPattern::parse("F0 43 XX 00 41 30 XX F7").unwrap();
        assert!(pattern.matches(&[0xF0, 0x43, 0x12, 0x00, 0x41, 0x30, 0x07, 0xF7]));
        assert!(!pattern.matches(&[0xF0, 0x43, 0x12, 0x00, 0x41, 0x31, 0x07, 0xF7]));
    }

    #[test]
    fn sysex_pattern_rejects_bad_framing() {
        assert!(SysExPattern::new(vec![SysExByte::Literal(0x00), SysExByte::Literal(0xF7)]).is_none());
        assert!(SysExPattern::new(vec![SysExByte::Literal(0xF0), SysExByte::Literal(0x00)]).is_none());
    }

    #[test]
    fn sysex_round_trip_string() {
        let pattern = SysExPattern::parse("F0 43 XX F7").unwrap();
        assert_eq!(pattern.to_config_string(), "F0 43 XX F7");
    }

    #[test]
    fn midi_value_selects_by_event_type() {
        assert_eq!(MidiEvent::note_on(1, 60, 100).midi_value(), Some(100));
        assert_eq!(
            MidiEvent::control_change(1, 7, 64, false, None).midi_value(),
            Some(64)
        );
        assert_eq!(MidiEvent::sysex(1, vec![0xF0, 0xF7]).midi_value(), None);
    }
}
