use coviewer_system::{RoomId, RoomSnapshot};
use tokio::sync::oneshot::Sender;

#[derive(Debug)]
pub enum AdminCommand {
    GetRoomState {
        room_id: RoomId,
        tx: Sender<RoomSnapshot>,
    },
    ListRooms {
        tx: Sender<Vec<RoomSnapshot>>,
    },
}
