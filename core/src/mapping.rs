// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Mapping registry (C6): a lock-free, read-mostly index from a MIDI event
//! fingerprint to the ordered list of actions it triggers.
//!
//! Lookups never block: readers take an [`arc_swap::Guard`] on the current
//! [`RegistrySnapshot`] and read through it; rebuilds construct an entirely
//! new snapshot off to the side and publish it with a single atomic swap
//! (RCU). In-flight lookups against the old snapshot run to completion
//! unaffected — the old `Arc` simply stays alive until its last reader
//! drops it.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::RuntimeAction;
use crate::events::{ChannelSelector, EventFingerprint, EventKind, FingerprintKind, MidiEvent, SysExPattern};

const WILDCARD_DEVICE: &str = "*";

#[derive(Default)]
struct Bucket {
    note_on_by_note: HashMap<u8, Vec<Arc<dyn RuntimeAction>>>,
    note_off_by_note: HashMap<u8, Vec<Arc<dyn RuntimeAction>>>,
    cc_absolute_by_cc: HashMap<u8, Vec<Arc<dyn RuntimeAction>>>,
    cc_relative_by_cc: HashMap<u8, Vec<Arc<dyn RuntimeAction>>>,
    sysex_patterns: Vec<(SysExPattern, Arc<dyn RuntimeAction>)>,
}

impl Bucket {
    fn insert(&mut self, kind: &FingerprintKind, action: Arc<dyn RuntimeAction>) {
        match kind {
            FingerprintKind::NoteOn(n) => self.note_on_by_note.entry(*n).or_default().push(action),
            FingerprintKind::NoteOff(n) => self.note_off_by_note.entry(*n).or_default().push(action),
            FingerprintKind::ControlChangeAbsolute(cc) => {
                self.cc_absolute_by_cc.entry(*cc).or_default().push(action)
            }
            FingerprintKind::ControlChangeRelative(cc) => {
                self.cc_relative_by_cc.entry(*cc).or_default().push(action)
            }
            FingerprintKind::SysEx(pattern) => self.sysex_patterns.push((pattern.clone(), action)),
        }
    }
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct BucketKey(String, ChannelSelector);

/// An immutable, fully-built index. Replaced wholesale on profile
/// activation; never mutated in place.
#[derive(Default)]
pub struct RegistrySnapshot {
    buckets: HashMap<BucketKey, Bucket>,
}

impl RegistrySnapshot {
    fn bucket(&self, device: &str, channel: ChannelSelector) -> Option<&Bucket> {
        self.buckets.get(&BucketKey(device.to_string(), channel))
    }

    /// Lookup order: `(device, channel)`, `("*", channel)`,
    /// `(device, any)`, `("*", any)` — concrete device name strictly
    /// precedes the wildcard for the same channel specificity.
    fn candidate_keys<'a>(&self, device: &'a str, channel: u8) -> [(&'a str, ChannelSelector); 4] {
        [
            (device, ChannelSelector::Channel(channel)),
            (WILDCARD_DEVICE, ChannelSelector::Channel(channel)),
            (device, ChannelSelector::Any),
            (WILDCARD_DEVICE, ChannelSelector::Any),
        ]
    }

    /// Resolve the ordered action list for an incoming event. Returns an
    /// empty vec for `Other`/`Error` events (no lookup is performed).
    pub fn lookup(&self, device_name: &str, event: &MidiEvent) -> Vec<Arc<dyn RuntimeAction>> {
        let mut out = Vec::new();
        match event.event_type {
            EventKind::Other | EventKind::Error => return out,
            EventKind::NoteOn | EventKind::NoteOff | EventKind::ControlChange => {
                for (dev, chan) in self.candidate_keys(device_name, event.channel) {
                    let Some(bucket) = self.bucket(dev, chan) else {
                        continue;
                    };
                    let hit = match event.event_type {
                        EventKind::NoteOn => event.note.and_then(|n| bucket.note_on_by_note.get(&n)),
                        EventKind::NoteOff => event.note.and_then(|n| bucket.note_off_by_note.get(&n)),
                        EventKind::ControlChange if event.is_relative => {
                            event.control.and_then(|c| bucket.cc_relative_by_cc.get(&c))
                        }
                        EventKind::ControlChange => {
                            event.control.and_then(|c| bucket.cc_absolute_by_cc.get(&c))
                        }
                        _ => unreachable!(),
                    };
                    if let Some(actions) = hit {
                        out.extend(actions.iter().cloned());
                    }
                }
            }
            EventKind::SysEx => {
                let Some(payload) = event.raw_bytes.as_deref() else {
                    return out;
                };
                for (dev, chan) in self.candidate_keys(device_name, event.channel) {
                    let Some(bucket) = self.bucket(dev, chan) else {
                        continue;
                    };
                    for (pattern, action) in &bucket.sysex_patterns {
                        if pattern.matches(payload) {
                            out.push(Arc::clone(action));
                        }
                    }
                }
            }
        }
        out
    }
}

/// A single entry to insert while building a snapshot.
pub struct RegistryEntry {
    pub fingerprint: EventFingerprint,
    pub action: Arc<dyn RuntimeAction>,
}

/// Builds a snapshot from a flat list of entries (already produced by the
/// profile loader/validator for every enabled mapping).
pub struct RegistryBuilder {
    snapshot: RegistrySnapshot,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            snapshot: RegistrySnapshot::default(),
        }
    }

    pub fn insert(&mut self, entry: RegistryEntry) {
        let device = if entry.fingerprint.device_name.is_empty() {
            WILDCARD_DEVICE.to_string()
        } else {
            entry.fingerprint.device_name.clone()
        };
        let key = BucketKey(device, entry.fingerprint.channel);
        self.snapshot
            .buckets
            .entry(key)
            .or_default()
            .insert(&entry.fingerprint.kind, entry.action);
    }

    pub fn build(self) -> RegistrySnapshot {
        self.snapshot
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry itself: an RCU-style holder for the current snapshot.
pub struct MappingRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    /// Atomically replace the index. Dispatches already holding the
    /// previous snapshot (via [`Self::snapshot`]) are unaffected.
    pub fn publish(&self, snapshot: RegistrySnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Take a lock-free read handle on the current index.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::config::ActionConfig;
    use crate::actions::ActionFactory;
    use crate::events::SysExPattern;

    fn action() -> Arc<dyn RuntimeAction> {
        let factory = ActionFactory::for_editor();
        factory
            .create(&ActionConfig::KeyPressRelease { virtual_key: 65 }, "t")
            .unwrap()
            .into()
    }

    #[test]
    fn concrete_device_precedes_wildcard() {
        let mut builder = RegistryBuilder::new();
        let concrete = action();
        let wildcard = action();
        builder.insert(RegistryEntry {
            fingerprint: EventFingerprint {
                device_name: "DevA".to_string(),
                channel: ChannelSelector::Channel(1),
                kind: FingerprintKind::NoteOn(60),
            },
            action: Arc::clone(&concrete),
        });
        builder.insert(RegistryEntry {
            fingerprint: EventFingerprint {
                device_name: "*".to_string(),
                channel: ChannelSelector::Channel(1),
                kind: FingerprintKind::NoteOn(60),
            },
            action: Arc::clone(&wildcard),
        });
        let snapshot = builder.build();
        let event = MidiEvent::note_on(1, 60, 100);
        let actions = snapshot.lookup("DevA", &event);
        assert_eq!(actions.len(), 2);
        assert!(Arc::ptr_eq(&actions[0], &concrete));
        assert!(Arc::ptr_eq(&actions[1], &wildcard));
    }

    #[test]
    fn sysex_bucket_matches_wildcard_pattern() {
        let mut builder = RegistryBuilder::new();
        let act = action();
        let pattern = SysExPattern::parse("F0 43 XX 00 41 30 XX F7").unwrap();
        builder.insert(RegistryEntry {
            fingerprint: EventFingerprint {
                device_name: "DevA".to_string(),
                channel: ChannelSelector::Any,
                kind: FingerprintKind::SysEx(pattern),
            },
            action: Arc::clone(&act),
        });
        let snapshot = builder.build();
        let matching = MidiEvent::sysex(1, vec![0xF0, 0x43, 0x12, 0x00, 0x41, 0x30, 0x07, 0xF7]);
        let non_matching = MidiEvent::sysex(1, vec![0xF0, 0x43, 0x12, 0x00, 0x41, 0x31, 0x07, 0xF7]);
        assert_eq!(snapshot.lookup("DevA", &matching).len(), 1);
        assert_eq!(snapshot.lookup("DevA", &non_matching).len(), 0);
    }

    #[test]
    fn rebuild_is_atomic_old_snapshot_still_readable() {
        let registry = MappingRegistry::new();
        let mut builder = RegistryBuilder::new();
        builder.insert(RegistryEntry {
            fingerprint: EventFingerprint {
                device_name: "DevA".to_string(),
                channel: ChannelSelector::Any,
                kind: FingerprintKind::NoteOn(60),
            },
            action: action(),
        });
        registry.publish(builder.build());
        let old = registry.snapshot();

        registry.publish(RegistrySnapshot::default());

        let event = MidiEvent::note_on(1, 60, 100);
        assert_eq!(old.lookup("DevA", &event).len(), 1);
        assert_eq!(registry.snapshot().lookup("DevA", &event).len(), 0);
    }
}
