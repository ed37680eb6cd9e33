//! Per-detector state storage keyed by player identity
//!
//! Each detector owns one [`StateStore`] holding a plain state record per
//! tracked player. A tick walks the roster, creating or updating entries and
//! evicting excluded players, then sweeps away every entry whose player was
//! not seen, which is how disconnects are noticed without a dedicated event.

use shared::PlayerId;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Result of [`StateStore::upsert`].
pub enum Upsert<'a, S> {
    /// First sighting; a fresh baseline was stored.
    Created,
    /// The player was already tracked.
    Existing(&'a mut S),
}

#[derive(Debug)]
pub struct StateStore<S> {
    entries: HashMap<PlayerId, S>,
}

impl<S> Default for StateStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateStore<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Returns the existing entry, or stores `make()` and reports creation.
    pub fn upsert(&mut self, id: PlayerId, make: impl FnOnce() -> S) -> Upsert<'_, S> {
        match self.entries.entry(id) {
            Entry::Occupied(entry) => Upsert::Existing(entry.into_mut()),
            Entry::Vacant(entry) => {
                entry.insert(make());
                Upsert::Created
            }
        }
    }

    pub fn evict(&mut self, id: PlayerId) -> Option<S> {
        self.entries.remove(&id)
    }

    /// Drops every entry whose player is not in `seen`. Returns how many
    /// entries were removed.
    pub fn sweep(&mut self, seen: &HashSet<PlayerId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| seen.contains(id));
        before - self.entries.len()
    }

    pub fn get(&self, id: PlayerId) -> Option<&S> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut S> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Warning cadence shared by all detectors.
///
/// Before the first warning the interval is measured from `since` (last
/// activity, dwell start or spectator entry); afterwards from the previous
/// warning.
pub fn should_warn(
    last_warn: Option<Instant>,
    since: Instant,
    interval: Duration,
    now: Instant,
) -> bool {
    let anchor = last_warn.unwrap_or(since);
    now.saturating_duration_since(anchor) >= interval
}
