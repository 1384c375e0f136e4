use coviewer_system::{ConnectionHandle, DeliveryError, ServerMessage};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Outbound buffer of one WebSocket connection, drained by its actor.
#[derive(Debug, Clone)]
pub struct ConnectionTx(Sender<ServerMessage>);

impl ConnectionTx {
    pub fn new(tx: Sender<ServerMessage>) -> Self {
        Self(tx)
    }
}

impl ConnectionHandle for ConnectionTx {
    fn deliver(&self, message: &ServerMessage) -> Result<(), DeliveryError> {
        self.0.try_send(message.clone()).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
