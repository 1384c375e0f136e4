use crate::error::DeliveryError;
use crate::message::ServerMessage;

/// Push side of one client link. Implementations must not block.
pub trait ConnectionHandle {
    fn deliver(&self, message: &ServerMessage) -> Result<(), DeliveryError>;
}
