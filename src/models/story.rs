use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaItem;

pub type UserId = u64;

pub const FALLBACK_USERNAME: &str = "unknown";
pub const FALLBACK_AVATAR: &str = "/avatars/default.png";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
}

impl UserProfile {
    /// Placeholder used when a story references a user the catalog does not know.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            username: FALLBACK_USERNAME.into(),
            avatar: FALLBACK_AVATAR.into(),
        }
    }

    pub fn avatar_or_default(&self) -> &str {
        if self.avatar.trim().is_empty() {
            FALLBACK_AVATAR
        } else {
            &self.avatar
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub media: Vec<MediaItem>,
}

impl StoryRecord {
    pub fn new(user_id: UserId, created_at: DateTime<Utc>, media: Vec<MediaItem>) -> Self {
        Self {
            user_id,
            created_at,
            media,
        }
    }
}

impl StoryRecord {
    /// Newest upload time across the record's media.
    pub fn latest_media_at(&self) -> DateTime<Utc> {
        self.media
            .iter()
            .filter_map(|item| item.created_at)
            .fold(self.created_at, |latest, at| latest.max(at))
    }
}
