use crate::{ConnectionId, PageNumber, RoomId};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    AdminConnect,
    /// `page` is `None` when the client sent anything but a positive integer.
    PageChange {
        #[serde(default, deserialize_with = "positive_page")]
        page: Option<PageNumber>,
    },
    /// Any other `type` tag. Still counts as room activity.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AdminStatus {
        is_admin: bool,
        current_page: PageNumber,
    },
    PageUpdate {
        page: PageNumber,
    },
    ViewerCount {
        count: usize,
    },
    PageRejected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<PageNumber>,
        reason: RejectReason,
    },
}

impl ClientMessage {
    pub fn page_change(page: PageNumber) -> Self {
        Self::PageChange { page: Some(page) }
    }
}

fn positive_page<'de, D>(deserializer: D) -> Result<Option<PageNumber>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|page| u32::try_from(page).ok())
        .and_then(PageNumber::new))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotPresenter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub page: PageNumber,
    pub presenter: Option<ConnectionId>,
    pub viewer_count: usize,
}
