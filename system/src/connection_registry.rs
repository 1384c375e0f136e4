use crate::{new_connection_id, ConnectionId, RoomId};
use std::collections::{HashMap, HashSet};

/// Live connections grouped by room. Single owner of the delivery handles.
pub struct ConnectionRegistry<H> {
    rooms: HashMap<RoomId, HashMap<ConnectionId, H>>,
}

impl<H> ConnectionRegistry<H> {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn register(&mut self, room_id: &RoomId, handle: H) -> ConnectionId {
        let connection_id = new_connection_id();
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .insert(connection_id, handle);
        log::info!("Connection {} joined room {}", connection_id, room_id);
        connection_id
    }

    /// Returns the removed handle, or `None` if the connection was already gone.
    pub fn unregister(&mut self, connection_id: &ConnectionId, room_id: &RoomId) -> Option<H> {
        let members = self.rooms.get_mut(room_id)?;
        let handle = members.remove(connection_id)?;
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        log::info!("Connection {} left room {}", connection_id, room_id);
        Some(handle)
    }

    pub fn members_of(&self, room_id: &RoomId) -> HashSet<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, |members| members.len())
    }

    pub fn contains(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.handle(connection_id, room_id).is_some()
    }

    pub fn handle(&self, connection_id: &ConnectionId, room_id: &RoomId) -> Option<&H> {
        self.rooms
            .get(room_id)
            .and_then(|members| members.get(connection_id))
    }

    pub fn handles(&self, room_id: &RoomId) -> impl Iterator<Item = (&ConnectionId, &H)> {
        self.rooms
            .get(room_id)
            .into_iter()
            .flat_map(|members| members.iter())
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }
}

impl<H> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
