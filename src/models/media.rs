use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display time for an image that carries no explicit duration.
pub const DEFAULT_IMAGE_DURATION_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: String,
    /// Only meaningful for images; video length comes from playback metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Upload time of this item; items without one inherit the record's `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            duration_ms: None,
            created_at: None,
        }
    }

    pub fn image_for(url: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            duration_ms: Some(duration_ms),
            created_at: None,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            url: url.into(),
            duration_ms: None,
            created_at: None,
        }
    }

    pub fn posted_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Timer length for an image, `None` for video.
    pub fn image_duration_ms(&self, default_ms: u64) -> Option<u64> {
        match self.kind {
            MediaKind::Image => Some(self.duration_ms.filter(|ms| *ms > 0).unwrap_or(default_ms)),
            MediaKind::Video => None,
        }
    }
}
