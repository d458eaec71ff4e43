use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    models::{MediaItem, TimelineEntry, UserId},
    utils::time::time_ago,
};

use super::state::{Phase, ViewerState};

/// Everything a host needs to draw the viewer for the current entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSnapshot {
    pub index: usize,
    pub phase: Phase,
    pub paused: bool,
    pub progress: f32,
    pub muted: bool,
    pub volume: f32,
    pub menu_open: bool,
    pub liked: bool,
    pub wide_media: bool,
    pub user_id: UserId,
    pub username: String,
    pub avatar: String,
    pub time_ago: String,
    pub media: MediaItem,
    /// Fill level of each of the current user's progress segments.
    pub segments: Vec<f32>,
}

/// `None` once the viewer is closed or points outside the timeline.
pub fn snapshot(
    state: &ViewerState,
    timeline: &[TimelineEntry],
    now: DateTime<Utc>,
) -> Option<ViewerSnapshot> {
    if state.is_closed() {
        return None;
    }
    let entry = timeline.get(state.index)?;

    Some(ViewerSnapshot {
        index: state.index,
        phase: state.phase,
        paused: state.paused(),
        progress: state.progress,
        muted: state.muted,
        volume: state.volume,
        menu_open: state.menu_open,
        liked: state.is_liked(),
        wide_media: state.wide_media,
        user_id: entry.user_id,
        username: entry.username.clone(),
        avatar: entry.avatar.clone(),
        time_ago: time_ago(entry.created_at, now),
        media: entry.media.clone(),
        segments: progress_segments(state, timeline),
    })
}

/// Earlier items of the current user are full, the current one shows
/// `progress`, later ones are empty.
pub fn progress_segments(state: &ViewerState, timeline: &[TimelineEntry]) -> Vec<f32> {
    let Some(current) = timeline.get(state.index) else {
        return Vec::new();
    };

    timeline
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.user_id == current.user_id)
        .map(|(index, _)| {
            if index < state.index {
                1.0
            } else if index == state.index {
                state.progress
            } else {
                0.0
            }
        })
        .collect()
}
