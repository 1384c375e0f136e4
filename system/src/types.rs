use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

pub type ConnectionId = uuid::Uuid;
pub type PageNumber = NonZeroU32;

pub const FIRST_PAGE: PageNumber = NonZeroU32::MIN;

/// Opaque, caller-supplied room key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn new_connection_id() -> ConnectionId {
    uuid::Uuid::new_v4()
}
