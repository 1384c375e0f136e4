use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::oneshot;

use coviewer_system::{
    ClientMessage, ConnectionId, Coordinator, CoordinatorOptions, RoomId, RoomSnapshot,
};

use crate::admin::AdminCommand;
use crate::connection::ConnectionCommand;
use crate::connection_tx::ConnectionTx;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Admin(AdminCommand),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("coordinator shard has stopped")]
    Stopped,
    #[error("coordinator shard dropped the reply")]
    NoReply,
}

/// Routes commands to the shard that owns the room.
#[derive(Clone)]
pub struct ServerTx {
    shards: Arc<[UnboundedSender<ServerCommand>]>,
}

impl ServerTx {
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_index(&self, room_id: &RoomId) -> usize {
        let mut hasher = DefaultHasher::new();
        room_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub fn send(&self, room_id: &RoomId, command: ServerCommand) -> Result<(), ServerError> {
        self.shards[self.shard_index(room_id)]
            .send(command)
            .map_err(|_| ServerError::Stopped)
    }

    pub fn connect(
        &self,
        room_id: RoomId,
        tx: ConnectionTx,
    ) -> Result<oneshot::Receiver<ConnectionId>, ServerError> {
        let (registered, registered_rx) = oneshot::channel();
        let target = room_id.clone();
        self.send(
            &target,
            ServerCommand::Connection(ConnectionCommand::Connect {
                room_id,
                tx,
                registered,
            }),
        )?;
        Ok(registered_rx)
    }

    pub fn message(
        &self,
        room_id: RoomId,
        from: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), ServerError> {
        let target = room_id.clone();
        self.send(
            &target,
            ServerCommand::Connection(ConnectionCommand::Message {
                room_id,
                from,
                message,
            }),
        )
    }

    pub fn disconnect(&self, room_id: RoomId, from: ConnectionId) -> Result<(), ServerError> {
        let target = room_id.clone();
        self.send(
            &target,
            ServerCommand::Connection(ConnectionCommand::Disconnect { room_id, from }),
        )
    }

    pub async fn room_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, ServerError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            room_id,
            ServerCommand::Admin(AdminCommand::GetRoomState {
                room_id: room_id.clone(),
                tx,
            }),
        )?;
        rx.await.map_err(|_| ServerError::NoReply)
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSnapshot>, ServerError> {
        let mut replies = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            let (tx, rx) = oneshot::channel();
            shard
                .send(ServerCommand::Admin(AdminCommand::ListRooms { tx }))
                .map_err(|_| ServerError::Stopped)?;
            replies.push(rx);
        }

        let mut rooms = Vec::new();
        for rx in replies {
            rooms.extend(rx.await.map_err(|_| ServerError::NoReply)?);
        }
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(rooms)
    }
}

struct Server {
    shard: usize,
    coordinator: Coordinator<ConnectionTx>,
}

impl Server {
    fn new(shard: usize, options: CoordinatorOptions) -> Self {
        Self {
            shard,
            coordinator: Coordinator::new(options),
        }
    }

    fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command),
            ServerCommand::Admin(command) => self.handle_admin_command(command),
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect {
                room_id,
                tx,
                registered,
            } => {
                let connection_id = self.coordinator.connect(&room_id, tx);
                if registered.send(connection_id).is_err() {
                    log::warn!(
                        "Connection {} went away before registration completed",
                        connection_id
                    );
                    self.coordinator.disconnect(&room_id, &connection_id);
                }
            }
            ConnectionCommand::Message {
                room_id,
                from,
                message,
            } => {
                log::debug!("Shard {} ingress {:?} from {}", self.shard, message, from);
                self.coordinator.handle_message(&room_id, &from, &message);
            }
            ConnectionCommand::Disconnect { room_id, from } => {
                self.coordinator.disconnect(&room_id, &from);
            }
        }
    }

    fn handle_admin_command(&mut self, command: AdminCommand) {
        match command {
            AdminCommand::GetRoomState { room_id, tx } => {
                let _ = tx.send(self.coordinator.snapshot(&room_id));
            }
            AdminCommand::ListRooms { tx } => {
                let _ = tx.send(self.coordinator.snapshots());
            }
        }
    }
}

pub fn spawn_server(options: CoordinatorOptions, shard_count: usize) -> ServerTx {
    let shards = (0..shard_count.max(1))
        .map(|shard| {
            let (srv_tx, mut srv_rx) = unbounded_channel::<ServerCommand>();

            tokio::spawn(async move {
                let mut server = Server::new(shard, options);
                log::info!("Coordinator shard {} started", shard);

                while let Some(command) = srv_rx.recv().await {
                    server.handle_command(command);
                }
                log::info!("Coordinator shard {} stopped", shard);
            });

            srv_tx
        })
        .collect::<Vec<_>>();

    ServerTx {
        shards: shards.into(),
    }
}
