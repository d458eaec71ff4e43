use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StoryRecord, UserId};

/// Which items of one user's story have been seen, parallel to `StoryRecord::media`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub user_id: UserId,
    pub viewed_flags: Vec<bool>,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

impl ViewState {
    pub fn unviewed(record: &StoryRecord) -> Self {
        Self {
            user_id: record.user_id,
            viewed_flags: vec![false; record.media.len()],
            last_viewed_at: None,
        }
    }

    /// An empty story counts as unviewed so the user is never sorted behind viewed ones.
    pub fn has_unviewed(&self) -> bool {
        self.viewed_flags.is_empty() || self.viewed_flags.iter().any(|viewed| !viewed)
    }

    pub fn is_viewed(&self, media_index: usize) -> bool {
        self.viewed_flags.get(media_index).copied().unwrap_or(false)
    }

    pub fn reset_flags(&mut self) {
        self.viewed_flags.iter_mut().for_each(|flag| *flag = false);
    }
}

/// One entry of the persisted blob. Every field except `user_id` may be missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedViewState {
    pub user_id: UserId,
    #[serde(default)]
    pub viewed_stories: Option<Vec<bool>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub viewed_at: Option<DateTime<Utc>>,
}

impl From<&ViewState> for PersistedViewState {
    fn from(state: &ViewState) -> Self {
        Self {
            user_id: state.user_id,
            viewed_stories: Some(state.viewed_flags.clone()),
            viewed_at: state.last_viewed_at,
        }
    }
}
