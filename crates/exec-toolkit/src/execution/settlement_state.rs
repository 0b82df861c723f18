//! Per-key settlement tracking for fan-out/fan-in aggregation.
//!
//! This module provides the state machine behind [`wait_for_all`]: each key
//! starts out pending and moves exactly once to resolved or rejected.
//!
//! [`wait_for_all`]: crate::execution::wait_for_all

use super::error::ErrorValue;
use indexmap::IndexMap;

/// The settlement status of one key.
///
/// Keys progress as follows:
/// - `Pending` -> `Resolved` (the key's handle fulfilled)
/// - `Pending` -> `Rejected` (the handle rejected, was not a handle, or the
///   deadline elapsed first)
#[derive(Debug, Clone, PartialEq)]
pub enum KeySettlement<T> {
    Pending,
    Resolved(T),
    Rejected(ErrorValue),
}

impl<T> KeySettlement<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, KeySettlement::Pending)
    }
}

/// Tracks the settlement of every key of an aggregation, in declared order.
///
/// # Examples
///
/// ```
/// use exec_toolkit::execution::SettlementState;
/// use exec_toolkit::ErrorValue;
///
/// let mut state = SettlementState::new();
/// state.register("a");
/// state.register("b");
///
/// state.resolve("a", 1);
/// assert!(state.has_pending());
///
/// state.reject("b", ErrorValue::new("boom"));
/// assert!(state.all_settled());
/// assert!(state.has_rejections());
/// ```
#[derive(Debug, Clone)]
pub struct SettlementState<T> {
    keys: IndexMap<String, KeySettlement<T>>,
}

impl<T: Clone> SettlementState<T> {
    pub fn new() -> Self {
        Self {
            keys: IndexMap::new(),
        }
    }

    /// Registers a key as pending. Registering an existing key is a no-op.
    pub fn register(&mut self, key: &str) {
        self.keys
            .entry(key.to_string())
            .or_insert(KeySettlement::Pending);
    }

    /// Records a fulfillment. Returns `false` if the key was not pending.
    pub fn resolve(&mut self, key: &str, value: T) -> bool {
        self.settle(key, KeySettlement::Resolved(value))
    }

    /// Records a rejection. Returns `false` if the key was not pending.
    pub fn reject(&mut self, key: &str, error: ErrorValue) -> bool {
        self.settle(key, KeySettlement::Rejected(error))
    }

    fn settle(&mut self, key: &str, settlement: KeySettlement<T>) -> bool {
        match self.keys.get_mut(key) {
            Some(slot) if slot.is_pending() => {
                *slot = settlement;
                true
            }
            _ => false,
        }
    }

    /// Rejects every still-pending key with `make_error()` and returns them.
    pub fn expire_pending(&mut self, make_error: impl Fn() -> ErrorValue) -> Vec<String> {
        let mut expired = Vec::new();
        for (key, slot) in self.keys.iter_mut() {
            if slot.is_pending() {
                *slot = KeySettlement::Rejected(make_error());
                expired.push(key.clone());
            }
        }
        expired
    }

    pub fn get(&self, key: &str) -> Option<&KeySettlement<T>> {
        self.keys.get(key)
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn has_pending(&self) -> bool {
        self.keys.values().any(KeySettlement::is_pending)
    }

    /// Returns true once no key is pending.
    pub fn all_settled(&self) -> bool {
        !self.has_pending()
    }

    pub fn has_rejections(&self) -> bool {
        self.keys
            .values()
            .any(|s| matches!(s, KeySettlement::Rejected(_)))
    }

    pub fn pending_keys(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter(|(_, s)| s.is_pending())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Results of the resolved keys, in declared order.
    pub fn results(&self) -> IndexMap<String, T> {
        self.keys
            .iter()
            .filter_map(|(key, s)| match s {
                KeySettlement::Resolved(value) => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Errors of the rejected keys, in declared order.
    pub fn errors(&self) -> IndexMap<String, ErrorValue> {
        self.keys
            .iter()
            .filter_map(|(key, s)| match s {
                KeySettlement::Rejected(error) => Some((key.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }
}

impl<T: Clone> Default for SettlementState<T> {
    fn default() -> Self {
        Self::new()
    }
}
