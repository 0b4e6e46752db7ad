use dashmap::DashMap;
use meshroom_core::{OnlineParticipant, PeerId, RoomId};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// One WebSocket connection to the relay. A member may hold several over
/// time; only the newest counts as online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is online in each room, keyed by the session that announced them.
#[derive(Default)]
pub struct OnlineRegistry {
    rooms: DashMap<RoomId, HashMap<PeerId, SessionId>>,
}

impl OnlineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `member` online in `room`. Returns the session it replaced, if
    /// the member was already online through another connection.
    pub fn join(&self, room: &RoomId, member: PeerId, session: SessionId) -> Option<SessionId> {
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(member, session)
            .filter(|previous| *previous != session)
    }

    /// Removes `member` from `room` if `session` is still the one holding it.
    pub fn leave(&self, room: &RoomId, member: PeerId, session: SessionId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) if members.get(&member) == Some(&session) => {
                members.remove(&member);
                true
            }
            _ => false,
        };
        if removed {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
        removed
    }

    /// Drops every entry owned by `session`. Returns the affected rooms.
    pub fn leave_session(&self, session: SessionId) -> Vec<RoomId> {
        let mut affected = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|_, owner| *owner != session);
            if entry.value().len() != before {
                affected.push(entry.key().clone());
            }
        }
        self.rooms.retain(|_, members| !members.is_empty());
        affected
    }

    /// Online members of `room`, ordered by id.
    pub fn participants(&self, room: &RoomId) -> Vec<OnlineParticipant> {
        let mut members: Vec<PeerId> = self
            .rooms
            .get(room)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
            .into_iter()
            .map(|user_id| OnlineParticipant { user_id })
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
