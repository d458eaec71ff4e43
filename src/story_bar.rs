use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    catalog::Catalog,
    models::{StoryPosition, StoryRecord, TimelineEntry, UserId, UserProfile, ViewState},
    view_state::ViewStateStore,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// One avatar in the bar.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BarEntry {
    pub user_id: UserId,
    pub username: String,
    pub avatar: String,
    pub has_unviewed: bool,
}

/// Flattens every record's media into one timeline, newest record first.
///
/// The sort is stable, so each user's items stay contiguous and in order.
pub fn flatten_timeline(users: &[UserProfile], records: &[StoryRecord]) -> Vec<TimelineEntry> {
    let mut timeline: Vec<TimelineEntry> = records
        .iter()
        .flat_map(|record| {
            let profile = users
                .iter()
                .find(|user| user.id == record.user_id)
                .cloned()
                .unwrap_or_else(|| UserProfile::placeholder(record.user_id));
            record
                .media
                .iter()
                .enumerate()
                .map(move |(media_index, media)| TimelineEntry {
                    user_id: record.user_id,
                    username: profile.username.clone(),
                    avatar: profile.avatar_or_default().to_string(),
                    created_at: record.created_at,
                    media: media.clone(),
                    media_index,
                })
        })
        .collect();

    timeline.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    timeline
}

/// Users with anything unviewed first, then fully viewed ones; newest first within each group.
pub fn story_bar_order(records: &[StoryRecord], states: &[ViewState]) -> Vec<UserId> {
    let has_unviewed = |user_id: UserId| {
        states
            .iter()
            .find(|state| state.user_id == user_id)
            .map(ViewState::has_unviewed)
            .unwrap_or(true)
    };

    let (mut unviewed, mut viewed): (Vec<&StoryRecord>, Vec<&StoryRecord>) = records
        .iter()
        .partition(|record| has_unviewed(record.user_id));

    unviewed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    viewed.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    unviewed
        .into_iter()
        .chain(viewed)
        .map(|record| record.user_id)
        .collect()
}

/// Index into `timeline` the viewer should open at for `user_id`: the user's
/// first unviewed item, or their first item when everything is seen.
pub fn open_index(
    timeline: &[TimelineEntry],
    states: &[ViewState],
    user_id: UserId,
) -> Option<usize> {
    let state = states.iter().find(|state| state.user_id == user_id);
    let is_viewed = |entry: &TimelineEntry| state.is_some_and(|s| s.is_viewed(entry.media_index));

    timeline
        .iter()
        .position(|entry| entry.user_id == user_id && !is_viewed(entry))
        .or_else(|| timeline.iter().position(|entry| entry.user_id == user_id))
}

pub struct StoryBar {
    catalog: Catalog,
    store: ViewStateStore,
    timeline: Vec<TimelineEntry>,
}

impl StoryBar {
    pub fn new(catalog: &Catalog, store: ViewStateStore) -> Self {
        let timeline = flatten_timeline(&catalog.users, store.records());
        Self {
            catalog: catalog.clone(),
            store,
            timeline,
        }
    }

    pub fn store(&self) -> &ViewStateStore {
        &self.store
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn order(&self) -> Vec<UserId> {
        story_bar_order(self.store.records(), self.store.states())
    }

    pub fn entries(&self) -> Vec<BarEntry> {
        self.order()
            .into_iter()
            .map(|user_id| {
                let profile = self.catalog.profile(user_id);
                BarEntry {
                    user_id,
                    avatar: profile.avatar_or_default().to_string(),
                    username: profile.username,
                    has_unviewed: self.store.has_unviewed(user_id),
                }
            })
            .collect()
    }

    pub fn open_user(&self, user_id: UserId) -> Option<usize> {
        open_index(&self.timeline, self.store.states(), user_id)
    }

    /// Turns a viewer position report into a persisted "viewed" mark.
    pub fn record_position(&mut self, position: StoryPosition, now: DateTime<Utc>) -> bool {
        let changed = self
            .store
            .mark_viewed(position.user_id, position.media_index, now);
        if !changed {
            log_debug!(
                "Ignoring stale position user={} media={}",
                position.user_id,
                position.media_index
            );
        }
        changed
    }

    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        self.store.refresh(now)
    }
}
