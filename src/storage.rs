//! In-memory challenge storage.
//!
//! Single source of truth for challenge state and the event log while the
//! process runs. History is not persisted: terminal challenges are dropped by
//! [`Storage::prune_terminal`] and the event log keeps only the most recent
//! `event_capacity` events. All writes go through the registry.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::{AnyChallenge, ChallengeId, ChallengeState, ChallengeSummary};

struct Entry {
    challenge: Box<dyn AnyChallenge>,
    state: ChallengeState,
    updated_at: DateTime<Utc>,
}

/// Events kept when no capacity is configured.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Storage backend. Entries are kept in id (creation) order.
pub struct Storage {
    entries: BTreeMap<ChallengeId, Entry>,
    events: VecDeque<Event>,
    next_seq: u64,
    event_capacity: usize,
}

impl Default for Storage {
    fn default() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("entries", &self.entries.len())
            .field("events", &self.events.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose event log holds at most `capacity` events (at least one).
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            events: VecDeque::new(),
            next_seq: 1,
            event_capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ChallengeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn insert(&mut self, challenge: Box<dyn AnyChallenge>, state: ChallengeState) {
        let id = challenge.id();
        self.entries.insert(
            id,
            Entry {
                challenge,
                state,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn challenge(&self, id: ChallengeId) -> Result<&(dyn AnyChallenge + 'static)> {
        self.entry(id).map(|e| e.challenge.as_ref())
    }

    pub fn challenge_mut(&mut self, id: ChallengeId) -> Result<&mut (dyn AnyChallenge + 'static)> {
        self.entries
            .get_mut(&id)
            .map(|e| e.challenge.as_mut())
            .ok_or(Error::NotFound(id))
    }

    pub fn state(&self, id: ChallengeId) -> Result<ChallengeState> {
        self.entry(id).map(|e| e.state)
    }

    /// Move a challenge to `to`, validating the transition. Returns the
    /// previous state.
    pub fn update_state(&mut self, id: ChallengeId, to: ChallengeState) -> Result<ChallengeState> {
        let entry = self.entries.get_mut(&id).ok_or(Error::NotFound(id))?;
        let from = entry.state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { id, from, to });
        }
        entry.state = to;
        entry.updated_at = Utc::now();
        Ok(from)
    }

    /// Pending challenges in creation order.
    pub fn pending(&self) -> impl Iterator<Item = &(dyn AnyChallenge + 'static)> {
        self.entries
            .values()
            .filter(|e| e.state == ChallengeState::Pending)
            .map(|e| e.challenge.as_ref())
    }

    pub fn list_by_state(&self, state: ChallengeState) -> Vec<ChallengeSummary> {
        self.entries
            .values()
            .filter(|e| e.state == state)
            .map(|e| e.challenge.summary())
            .collect()
    }

    /// Append an event. The oldest event is dropped once the log is full;
    /// sequence numbers keep counting, so readers see the gap.
    pub fn record_event(&mut self, kind: EventKind) -> Event {
        let event = Event {
            seq: self.next_seq,
            timestamp: Utc::now(),
            kind,
        };
        self.next_seq += 1;
        if self.events.len() == self.event_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
        event
    }

    /// Drop every event with a sequence number up to and including
    /// `through_seq`. Returns how many were dropped.
    pub fn prune_events(&mut self, through_seq: u64) -> usize {
        let before = self.events.len();
        while self.events.front().is_some_and(|e| e.seq <= through_seq) {
            self.events.pop_front();
        }
        before - self.events.len()
    }

    /// Remove terminal challenges last updated before `cutoff`, except those
    /// in `keep`. Returns the removed ids in creation order.
    pub fn prune_terminal(
        &mut self,
        cutoff: DateTime<Utc>,
        keep: &HashSet<ChallengeId>,
    ) -> Vec<ChallengeId> {
        let removed: Vec<ChallengeId> = self
            .entries
            .iter()
            .filter(|(id, e)| {
                e.state.is_terminal() && e.updated_at < cutoff && !keep.contains(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &removed {
            self.entries.remove(id);
        }
        removed
    }

    /// Events with a sequence number greater than `since_seq`.
    pub fn events_since(&self, since_seq: u64) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.seq > since_seq)
            .cloned()
            .collect()
    }

    fn entry(&self, id: ChallengeId) -> Result<&Entry> {
        self.entries.get(&id).ok_or(Error::NotFound(id))
    }
}
