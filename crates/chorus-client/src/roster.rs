//! Participant roster for the current channel

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chorus_protocol::{Participant, ParticipantId, ParticipantUpdate};

use crate::session::{EventSink, SessionEvent};

/// Outcome of [`Roster::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The ID was new; the participant was added
    Joined,
    /// The ID was known; present fields were merged
    Updated,
}

/// The set of participants present in the current channel
#[derive(Debug)]
pub struct Roster {
    participants: HashMap<ParticipantId, Participant>,
    offline: Participant,
    events: EventSink,
}

impl Roster {
    /// Create an empty roster raising notifications through `events`
    pub fn new(events: EventSink) -> Self {
        Self {
            participants: HashMap::new(),
            offline: Participant::offline(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    /// The stored participant, or the offline sentinel on a miss
    pub fn lookup(&self, id: &ParticipantId) -> &Participant {
        self.participants.get(id).unwrap_or(&self.offline)
    }

    /// All present participants, in no particular order
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Reconcile with a full snapshot.
    ///
    /// IDs missing from `snapshot` are removed first, then every entry of
    /// the snapshot is upserted in order.
    pub fn replace_all(&mut self, snapshot: Vec<ParticipantUpdate>) {
        let departed: Vec<ParticipantId> = {
            let incoming: HashSet<&ParticipantId> = snapshot.iter().map(|p| &p.id).collect();
            self.participants
                .keys()
                .filter(|id| !incoming.contains(id))
                .cloned()
                .collect()
        };

        for id in departed {
            self.remove(&id);
        }

        for update in snapshot {
            self.upsert(update);
        }
    }

    /// Add a new participant or merge into a known one
    pub fn upsert(&mut self, update: ParticipantUpdate) -> Upsert {
        match self.participants.entry(update.id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().apply(update);
                self.events
                    .emit(SessionEvent::ParticipantUpdated(entry.get().clone()));
                Upsert::Updated
            }
            Entry::Vacant(entry) => {
                let participant = entry.insert(Participant::from(update)).clone();
                tracing::debug!("Participant {} ({}) joined", participant.id, participant.name);
                self.events.emit(SessionEvent::ParticipantJoined(participant));
                self.events
                    .emit(SessionEvent::RosterSizeChanged(self.participants.len()));
                Upsert::Joined
            }
        }
    }

    /// Remove a participant; a no-op for unknown IDs
    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        let participant = self.participants.remove(id)?;
        tracing::debug!("Participant {} ({}) left", participant.id, participant.name);
        self.events
            .emit(SessionEvent::ParticipantLeft(participant.clone()));
        self.events
            .emit(SessionEvent::RosterSizeChanged(self.participants.len()));
        Some(participant)
    }
}
