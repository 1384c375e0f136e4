use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound buffer is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}
