use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws::{self, CloseCode, CloseReason};
use tokio::sync::{mpsc, oneshot};

use coviewer_system::{ClientMessage, ConnectionId, RoomId, ServerMessage};

use crate::connection_tx::ConnectionTx;
use crate::server::ServerTx;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        room_id: RoomId,
        tx: ConnectionTx,
        registered: oneshot::Sender<ConnectionId>,
    },
    Disconnect {
        room_id: RoomId,
        from: ConnectionId,
    },
    Message {
        room_id: RoomId,
        from: ConnectionId,
        message: ClientMessage,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub buffer: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

#[derive(Message)]
#[rtype(result = "()")]
enum ConnectionActorMessage {
    Registered(ConnectionId),
    Outbound(ServerMessage),
    /// The shard dropped this connection, typically for falling behind.
    Evicted,
}

enum ConnectionState {
    /// Waiting for the shard to hand out an id. Inbound messages queue up here.
    Idle(Vec<ClientMessage>),
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
    room_id: RoomId,
    settings: ConnectionSettings,
    last_heartbeat: Instant,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, room_id: RoomId, settings: ConnectionSettings) -> Self {
        Self {
            state: ConnectionState::Idle(Vec::new()),
            srv_tx,
            room_id,
            settings,
            last_heartbeat: Instant::now(),
        }
    }

    fn forward(&mut self, message: ClientMessage) {
        match &mut self.state {
            ConnectionState::Idle(pending) => pending.push(message),
            ConnectionState::Connected(from) => {
                if let Err(err) = self.srv_tx.message(self.room_id.clone(), *from, message) {
                    log::error!("Cannot forward message for room {}: {}", self.room_id, err);
                }
            }
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.settings.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.settings.client_timeout {
                log::info!("Heartbeat timed out in room {}, closing", act.room_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

/// Relays outbound messages from the shard into the actor. Reports the
/// disconnect itself when the actor is gone before it learned its id, and
/// closes the socket when the shard drops the connection first.
async fn forward_outbound(
    addr: Addr<ConnectionActor>,
    srv_tx: ServerTx,
    room_id: RoomId,
    registered: oneshot::Receiver<ConnectionId>,
    mut rx: mpsc::Receiver<ServerMessage>,
) {
    let connection_id = match registered.await {
        Ok(connection_id) => connection_id,
        Err(_) => return,
    };
    log::debug!("Connection {} forwarder started", connection_id);

    if addr
        .send(ConnectionActorMessage::Registered(connection_id))
        .await
        .is_ok()
    {
        loop {
            match rx.recv().await {
                Some(message) => {
                    if addr
                        .send(ConnectionActorMessage::Outbound(message))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                None => {
                    let _ = addr.send(ConnectionActorMessage::Evicted).await;
                    break;
                }
            }
        }
    }

    // no-op when the actor already reported it
    let _ = srv_tx.disconnect(room_id, connection_id);
    log::debug!("Connection {} forwarder terminated", connection_id);
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);

        let (tx, rx) = mpsc::channel::<ServerMessage>(self.settings.buffer);
        let registered = match self
            .srv_tx
            .connect(self.room_id.clone(), ConnectionTx::new(tx))
        {
            Ok(registered) => registered,
            Err(err) => {
                log::error!("Cannot join room {}: {}", self.room_id, err);
                ctx.stop();
                return;
            }
        };

        tokio::spawn(forward_outbound(
            ctx.address(),
            self.srv_tx.clone(),
            self.room_id.clone(),
            registered,
            rx,
        ));
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(from) = self.state {
            if let Err(err) = self.srv_tx.disconnect(self.room_id.clone(), from) {
                log::error!("Cannot report disconnect of {}: {}", from, err);
            }
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!("Protocol error in room {}: {}", self.room_id, err);
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(bytes) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(_) => {
                self.last_heartbeat = Instant::now();
            }
            ws::Message::Text(text) => {
                self.last_heartbeat = Instant::now();
                log::debug!("Ingress {}", text);
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => self.forward(message),
                    // well-formed JSON of the wrong shape is still room activity
                    Err(err) if err.is_data() => {
                        log::debug!("Unrecognised message in room {}: {}", self.room_id, err);
                        self.forward(ClientMessage::Unknown);
                    }
                    Err(err) => {
                        log::warn!("Malformed message in room {}: {}", self.room_id, err);
                        ctx.close(Some(CloseReason {
                            code: CloseCode::Invalid,
                            description: Some(err.to_string()),
                        }));
                        ctx.stop();
                    }
                }
            }
            ws::Message::Binary(_) => {
                ctx.close(Some(CloseCode::Unsupported.into()));
                ctx.stop();
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Nop => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionActorMessage, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            ConnectionActorMessage::Registered(connection_id) => {
                let previous = std::mem::replace(
                    &mut self.state,
                    ConnectionState::Connected(connection_id),
                );
                if let ConnectionState::Idle(pending) = previous {
                    for message in pending {
                        self.forward(message);
                    }
                }
            }
            ConnectionActorMessage::Outbound(message) => {
                log::debug!("Egress {:?}", message);
                match serde_json::to_string(&message) {
                    Ok(text) => ctx.text(text),
                    Err(err) => log::error!("Cannot serialize {:?}: {}", message, err),
                }
            }
            ConnectionActorMessage::Evicted => {
                log::info!("Connection in room {} was evicted, closing", self.room_id);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Again,
                    description: Some(String::from("fell behind, reconnect")),
                }));
                ctx.stop();
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    room_id: web::Path<String>,
    srv_tx: web::Data<ServerTx>,
    settings: web::Data<ConnectionSettings>,
) -> Result<HttpResponse, Error> {
    let room_id = RoomId::from(room_id.into_inner());
    ws::start(
        ConnectionActor::new(srv_tx.get_ref().clone(), room_id, *settings.get_ref()),
        &req,
        stream,
    )
}
