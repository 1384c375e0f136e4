use crate::{ConnectionId, PageNumber, RoomId, FIRST_PAGE};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    pub page: PageNumber,
    pub presenter: Option<ConnectionId>,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            page: FIRST_PAGE,
            presenter: None,
        }
    }
}

/// Page and presenter per room. Rooms are created on first write.
pub struct RoomStateStore {
    rooms: HashMap<RoomId, RoomState>,
}

impl RoomStateStore {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn ensure(&mut self, room_id: &RoomId) -> &mut RoomState {
        self.rooms.entry(room_id.clone()).or_default()
    }

    pub fn evict(&mut self, room_id: &RoomId) -> Option<RoomState> {
        self.rooms.remove(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get_page(&self, room_id: &RoomId) -> PageNumber {
        self.rooms.get(room_id).map_or(FIRST_PAGE, |room| room.page)
    }

    pub fn set_page(&mut self, room_id: &RoomId, page: PageNumber) {
        self.ensure(room_id).page = page;
    }

    pub fn get_presenter(&self, room_id: &RoomId) -> Option<ConnectionId> {
        self.rooms.get(room_id).and_then(|room| room.presenter)
    }

    pub fn set_presenter(&mut self, room_id: &RoomId, connection_id: ConnectionId) {
        self.ensure(room_id).presenter = Some(connection_id);
    }

    /// Clears the presenter only if it is still `connection_id`, so a late
    /// disconnect of an old presenter never erases a newer claim.
    pub fn clear_presenter_if(&mut self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) if room.presenter.as_ref() == Some(connection_id) => {
                room.presenter = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for RoomStateStore {
    fn default() -> Self {
        Self::new()
    }
}
