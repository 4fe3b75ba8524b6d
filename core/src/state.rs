// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Shared integer state store (C1).
//!
//! Backs idempotent key actions (`*Key{vk}` namespace) and user-defined
//! state used by `SetState`/`StateConditional`/`Alternating`. Reads never
//! block writers: the map is a [`dashmap::DashMap`], so two threads can
//! mutate disjoint keys concurrently without contention.

use dashmap::DashMap;
use regex::Regex;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::InvalidStateKey;
use crate::facades::InputSimulator;

static USER_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());
static INTERNAL_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\*Key(\d+)$").unwrap());
/// Reserved namespace for auto-generated `Alternating` state keys. Disjoint
/// from both the user and internal grammars; forbidden in both validators.
pub const ALTERNATING_KEY_PREFIX: &str = "@Alt";

/// Classify a state key into one of the three disjoint namespaces.
pub fn is_user_key(key: &str) -> bool {
    USER_KEY.is_match(key) && !key.starts_with(ALTERNATING_KEY_PREFIX)
}

pub fn is_internal_key(key: &str) -> bool {
    INTERNAL_KEY.is_match(key)
}

pub fn internal_key_for_vk(vk: u16) -> String {
    format!("*Key{vk}")
}

/// Extract the virtual-key code from an internal key, if it is one.
fn internal_key_vk(key: &str) -> Option<u16> {
    INTERNAL_KEY
        .captures(key)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StateStatistics {
    pub total: usize,
    pub user_defined: usize,
    pub internal: usize,
}

/// Monotonic per-key integer store. `get` on an absent key returns `-1`.
pub struct StateStore {
    entries: DashMap<String, AtomicI64>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns `-1` if `key` is absent. Never fails.
    pub fn get(&self, key: &str) -> i32 {
        self.entries
            .get(key)
            .map(|v| v.load(Ordering::SeqCst) as i32)
            .unwrap_or(-1)
    }

    /// Validates `key` against the user/internal grammar, then records the
    /// value atomically. Rejects the reserved `@Alt` namespace as well,
    /// since only the engine itself may write auto-generated alternating
    /// state under that prefix.
    pub fn set(&self, key: &str, value: i32) -> Result<(), InvalidStateKey> {
        if !is_user_key(key) && !is_internal_key(key) && !key.starts_with(ALTERNATING_KEY_PREFIX) {
            return Err(InvalidStateKey {
                key: key.to_string(),
            });
        }
        self.set_unchecked(key, value);
        Ok(())
    }

    /// Writes without grammar validation. Used internally by the engine for
    /// auto-generated `@Alt...` keys, which are not user-settable but are
    /// still valid store entries.
    pub(crate) fn set_unchecked(&self, key: &str, value: i32) {
        match self.entries.get(key) {
            Some(existing) => {
                existing.store(value as i64, Ordering::SeqCst);
            }
            None => {
                self.entries
                    .insert(key.to_string(), AtomicI64::new(value as i64));
            }
        }
    }

    pub fn clear(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Key-release sweep followed by a full wipe. For every internal key
    /// currently `== 1`, emits `send_key_up` and forces it to `0` before
    /// removing all entries. Guarantees no OS key is left stuck.
    pub fn clear_all(&self, input: &dyn InputSimulator) {
        for entry in self.entries.iter() {
            if let Some(vk) = internal_key_vk(entry.key()) {
                if entry.value().load(Ordering::SeqCst) == 1 {
                    let _ = input.send_key_up(vk);
                    entry.value().store(0, Ordering::SeqCst);
                }
            }
        }
        self.entries.clear();
    }

    /// Resets to `initial_states`: performs the release sweep, then writes
    /// each provided pair. Rejects any internal-namespace key.
    pub fn initialize(
        &self,
        initial_states: &std::collections::HashMap<String, i32>,
        input: &dyn InputSimulator,
    ) -> Result<(), InvalidStateKey> {
        self.clear_all(input);
        for (key, value) in initial_states {
            if is_internal_key(key) {
                return Err(InvalidStateKey { key: key.clone() });
            }
            self.set(key, *value)?;
        }
        Ok(())
    }

    pub fn statistics(&self) -> StateStatistics {
        let mut stats = StateStatistics::default();
        for entry in self.entries.iter() {
            stats.total += 1;
            if is_internal_key(entry.key()) {
                stats.internal += 1;
            } else {
                stats.user_defined += 1;
            }
        }
        stats
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
