use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MediaItem, UserId};

/// One item of the flattened cross-user timeline the viewer plays.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub user_id: UserId,
    pub username: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    pub media: MediaItem,
    pub media_index: usize,
}

/// `(user, item)` pair the viewer reports whenever its position settles.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct StoryPosition {
    pub user_id: UserId,
    pub media_index: usize,
}

impl From<&TimelineEntry> for StoryPosition {
    fn from(entry: &TimelineEntry) -> Self {
        Self {
            user_id: entry.user_id,
            media_index: entry.media_index,
        }
    }
}
