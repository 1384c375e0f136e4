use crate::connection_registry::ConnectionRegistry;
use crate::error::DeliveryError;
use crate::message::{ClientMessage, RejectReason, RoomSnapshot, ServerMessage};
use crate::room_state::RoomStateStore;
use crate::traits::ConnectionHandle;
use crate::{ConnectionId, PageNumber, RoomId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Broadcast the viewer count when a connection joins, not only after
    /// inbound messages and disconnects.
    pub announce_joins: bool,
    /// Answer a page change from a non-presenter with `page_rejected`
    /// instead of dropping it silently.
    pub reject_unauthorized: bool,
}

/// Protocol state machine for a set of rooms.
///
/// Every method is one room-scoped step: callers must not interleave two
/// calls for the same room. The server gives each coordinator to exactly one
/// worker task, which gives that ordering for free.
///
/// A member whose handle reports [`DeliveryError::Full`] is disconnected at
/// the end of the step. Dropping its handle lets the transport close it, and
/// the client recovers current state on reconnect.
pub struct Coordinator<H> {
    registry: ConnectionRegistry<H>,
    rooms: RoomStateStore,
    options: CoordinatorOptions,
    lagging: Vec<ConnectionId>,
}

impl<H: ConnectionHandle> Coordinator<H> {
    pub fn new(options: CoordinatorOptions) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomStateStore::new(),
            options,
            lagging: Vec::new(),
        }
    }

    pub fn connect(&mut self, room_id: &RoomId, handle: H) -> ConnectionId {
        self.rooms.ensure(room_id);
        let connection_id = self.registry.register(room_id, handle);
        if self.options.announce_joins {
            self.broadcast_viewer_count(room_id);
            self.evict_lagging(room_id);
        }
        connection_id
    }

    /// Returns `false` if `from` is not a member of `room_id` and the message
    /// was dropped without side effects.
    pub fn handle_message(
        &mut self,
        room_id: &RoomId,
        from: &ConnectionId,
        message: &ClientMessage,
    ) -> bool {
        if !self.registry.contains(from, room_id) {
            log::warn!(
                "Dropping {:?} from connection {} which is not in room {}",
                message,
                from,
                room_id
            );
            return false;
        }

        match message {
            ClientMessage::AdminConnect => self.claim_presenter(room_id, from),
            ClientMessage::PageChange { page } => self.change_page(room_id, from, *page),
            ClientMessage::Unknown => {
                log::debug!("Unknown message type from {}", from);
            }
        }

        self.broadcast_viewer_count(room_id);
        self.evict_lagging(room_id);
        true
    }

    /// Idempotent. Returns `true` only for the call that actually removed the
    /// connection.
    pub fn disconnect(&mut self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        let removed = self.remove_member(room_id, connection_id);
        self.evict_lagging(room_id);
        removed
    }

    fn remove_member(&mut self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        if self.registry.unregister(connection_id, room_id).is_none() {
            return false;
        }
        if self.rooms.clear_presenter_if(room_id, connection_id) {
            log::info!("Presenter {} left room {}", connection_id, room_id);
        }

        if self.registry.count(room_id) == 0 {
            self.rooms.evict(room_id);
            log::info!("Room {} is empty, evicted", room_id);
        } else {
            self.broadcast_viewer_count(room_id);
        }
        true
    }

    pub fn snapshot(&self, room_id: &RoomId) -> RoomSnapshot {
        RoomSnapshot {
            room_id: room_id.clone(),
            page: self.rooms.get_page(room_id),
            presenter: self.rooms.get_presenter(room_id),
            viewer_count: self.registry.count(room_id),
        }
    }

    pub fn snapshots(&self) -> Vec<RoomSnapshot> {
        self.registry
            .room_ids()
            .map(|room_id| self.snapshot(room_id))
            .collect()
    }

    pub fn registry(&self) -> &ConnectionRegistry<H> {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomStateStore {
        &self.rooms
    }

    fn claim_presenter(&mut self, room_id: &RoomId, from: &ConnectionId) {
        self.rooms.set_presenter(room_id, *from);
        log::info!("Connection {} is now presenter of room {}", from, room_id);
        let current_page = self.rooms.get_page(room_id);
        self.send(
            room_id,
            from,
            &ServerMessage::AdminStatus {
                is_admin: true,
                current_page,
            },
        );
    }

    fn change_page(&mut self, room_id: &RoomId, from: &ConnectionId, page: Option<PageNumber>) {
        if self.rooms.get_presenter(room_id).as_ref() != Some(from) {
            log::debug!(
                "Ignoring page change to {:?} from non-presenter {} in room {}",
                page,
                from,
                room_id
            );
            if self.options.reject_unauthorized {
                self.send(
                    room_id,
                    from,
                    &ServerMessage::PageRejected {
                        page,
                        reason: RejectReason::NotPresenter,
                    },
                );
            }
            return;
        }
        let page = match page {
            Some(page) => page,
            None => {
                log::debug!("Ignoring page change without a valid page from {}", from);
                return;
            }
        };

        self.rooms.set_page(room_id, page);
        self.broadcast(room_id, &ServerMessage::PageUpdate { page });
    }

    fn broadcast_viewer_count(&mut self, room_id: &RoomId) {
        let count = self.registry.count(room_id);
        self.broadcast(room_id, &ServerMessage::ViewerCount { count });
    }

    fn broadcast(&mut self, room_id: &RoomId, message: &ServerMessage) {
        for (connection_id, handle) in self.registry.handles(room_id) {
            if let Err(err) = handle.deliver(message) {
                log::warn!(
                    "Failed to deliver {:?} to connection {}: {}",
                    message,
                    connection_id,
                    err
                );
                if err == DeliveryError::Full {
                    self.lagging.push(*connection_id);
                }
            }
        }
    }

    fn send(&mut self, room_id: &RoomId, to: &ConnectionId, message: &ServerMessage) {
        match self.registry.handle(to, room_id) {
            Some(handle) => {
                if let Err(err) = handle.deliver(message) {
                    log::warn!("Failed to deliver {:?} to connection {}: {}", message, to, err);
                    if err == DeliveryError::Full {
                        self.lagging.push(*to);
                    }
                }
            }
            None => log::warn!("Connection {} not found in room {}", to, room_id),
        }
    }

    // each removal broadcasts a new count, which may find more full buffers
    fn evict_lagging(&mut self, room_id: &RoomId) {
        while let Some(connection_id) = self.lagging.pop() {
            if self.remove_member(room_id, &connection_id) {
                log::warn!(
                    "Evicted connection {} from room {}: outbound buffer full",
                    connection_id,
                    room_id
                );
            }
        }
    }
}
