//! Durable record of which story items have been seen.
//!
//! The free functions are the pure operations (merge, expiry, marking); the
//! [`ViewStateStore`] wraps them around an injected [`KeyValueStorage`] and
//! flushes after every mutation. Storage problems never reach the caller:
//! reads degrade to "everything unviewed" and failed writes are only logged.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{PersistedViewState, StoryRecord, UserId, ViewState},
    storage::KeyValueStorage,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const STORAGE_KEY: &str = "stories_state_v2";
pub const SCHEMA_VERSION: u32 = 2;
pub const DEFAULT_VIEW_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum PersistedBlob {
    Versioned {
        version: u32,
        entries: Vec<PersistedViewState>,
    },
    Legacy(Vec<PersistedViewState>),
}

impl PersistedBlob {
    fn into_entries(self) -> Vec<PersistedViewState> {
        match self {
            PersistedBlob::Versioned { version, entries } => {
                if version > SCHEMA_VERSION {
                    log_warn!(
                        "view state schema v{version} is newer than v{SCHEMA_VERSION}; reading known fields only"
                    );
                }
                entries
            }
            PersistedBlob::Legacy(entries) => entries,
        }
    }
}

/// All-unviewed state for every record.
pub fn default_states(records: &[StoryRecord]) -> Vec<ViewState> {
    records.iter().map(ViewState::unviewed).collect()
}

/// Left-joins persisted entries onto `initial` by user id.
///
/// Entries for users missing from `initial` are dropped. Flag arrays are
/// padded with `false` or clipped so they always match the media length.
pub fn merge(initial: &[StoryRecord], persisted: &[PersistedViewState]) -> Vec<ViewState> {
    initial
        .iter()
        .map(|record| {
            let mut state = ViewState::unviewed(record);
            if let Some(saved) = persisted.iter().find(|p| p.user_id == record.user_id) {
                if let Some(flags) = &saved.viewed_stories {
                    for (slot, viewed) in state.viewed_flags.iter_mut().zip(flags) {
                        *slot = *viewed;
                    }
                }
                state.last_viewed_at = saved.viewed_at;
            }
            state
        })
        .collect()
}

/// Applies the TTL and new-content resets.
///
/// A state whose `last_viewed_at` is older than `ttl` loses all flags and its
/// timestamp. Otherwise, if the user's story has media newer than
/// `last_viewed_at`, the flags reset but the timestamp stays.
pub fn refresh_expiry(
    records: &[StoryRecord],
    list: &[ViewState],
    now: DateTime<Utc>,
    ttl: Duration,
) -> Vec<ViewState> {
    list.iter()
        .map(|state| {
            let mut next = state.clone();
            let Some(viewed_at) = state.last_viewed_at else {
                return next;
            };

            if now - viewed_at > ttl {
                next.reset_flags();
                next.last_viewed_at = None;
            } else if records
                .iter()
                .find(|record| record.user_id == state.user_id)
                .is_some_and(|record| record.latest_media_at() > viewed_at)
            {
                next.reset_flags();
            }
            next
        })
        .collect()
}

/// Marks one item seen. Returns `false` and leaves `list` untouched when the
/// user or index is unknown.
pub fn mark_viewed(
    list: &mut [ViewState],
    user_id: UserId,
    media_index: usize,
    now: DateTime<Utc>,
) -> bool {
    let Some(state) = list.iter_mut().find(|state| state.user_id == user_id) else {
        return false;
    };
    let Some(flag) = state.viewed_flags.get_mut(media_index) else {
        return false;
    };
    *flag = true;
    state.last_viewed_at = Some(now);
    true
}

/// Reads and parses the blob stored under `key`, `None` if absent or unreadable.
pub fn read_persisted(storage: &dyn KeyValueStorage, key: &str) -> Option<Vec<PersistedViewState>> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            log_warn!("Failed to read view state: {err}");
            return None;
        }
    };

    match serde_json::from_str::<PersistedBlob>(&raw) {
        Ok(blob) => Some(blob.into_entries()),
        Err(err) => {
            log_warn!("Failed to parse view state, starting unviewed: {err}");
            None
        }
    }
}

/// Writes `list` under `key`. Failures are logged and swallowed.
pub fn persist(storage: &dyn KeyValueStorage, key: &str, list: &[ViewState]) {
    let blob = PersistedBlob::Versioned {
        version: SCHEMA_VERSION,
        entries: list.iter().map(PersistedViewState::from).collect(),
    };

    let serialized = match serde_json::to_string(&blob) {
        Ok(serialized) => serialized,
        Err(err) => {
            log_warn!("Failed to serialize view state: {err}");
            return;
        }
    };

    if let Err(err) = storage.set_item(key, &serialized) {
        log_warn!("Failed to save view state: {err}");
    }
}

/// Loads, merges and expires the persisted state for `records`.
pub fn load(
    storage: &dyn KeyValueStorage,
    key: &str,
    records: &[StoryRecord],
    now: DateTime<Utc>,
    ttl: Duration,
) -> Vec<ViewState> {
    match read_persisted(storage, key) {
        Some(persisted) => refresh_expiry(records, &merge(records, &persisted), now, ttl),
        None => default_states(records),
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub storage_key: String,
    pub ttl: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.into(),
            ttl: Duration::hours(DEFAULT_VIEW_TTL_HOURS),
        }
    }
}

/// In-memory authoritative view state with write-through persistence.
pub struct ViewStateStore {
    storage: Arc<dyn KeyValueStorage>,
    options: StoreOptions,
    records: Vec<StoryRecord>,
    states: Vec<ViewState>,
}

impl ViewStateStore {
    pub fn open(
        storage: Arc<dyn KeyValueStorage>,
        records: Vec<StoryRecord>,
        options: StoreOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let states = load(
            storage.as_ref(),
            &options.storage_key,
            &records,
            now,
            options.ttl,
        );
        let unviewed = states.iter().filter(|state| state.has_unviewed()).count();
        log_info!(
            "Loaded view state for {} users ({} with unviewed items)",
            states.len(),
            unviewed
        );

        Self {
            storage,
            options,
            records,
            states,
        }
    }

    pub fn records(&self) -> &[StoryRecord] {
        &self.records
    }

    pub fn states(&self) -> &[ViewState] {
        &self.states
    }

    pub fn state_for(&self, user_id: UserId) -> Option<&ViewState> {
        self.states.iter().find(|state| state.user_id == user_id)
    }

    pub fn has_unviewed(&self, user_id: UserId) -> bool {
        self.state_for(user_id)
            .map(ViewState::has_unviewed)
            .unwrap_or(true)
    }

    pub fn is_viewed(&self, user_id: UserId, media_index: usize) -> bool {
        self.state_for(user_id)
            .is_some_and(|state| state.is_viewed(media_index))
    }

    /// Marks an item seen and flushes. Stale indices are ignored without a write.
    pub fn mark_viewed(&mut self, user_id: UserId, media_index: usize, now: DateTime<Utc>) -> bool {
        let changed = mark_viewed(&mut self.states, user_id, media_index, now);
        if changed {
            self.persist();
        }
        changed
    }

    /// Re-runs the expiry pass, e.g. for a long-lived session crossing the TTL.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        let refreshed = refresh_expiry(&self.records, &self.states, now, self.options.ttl);
        if refreshed == self.states {
            return false;
        }
        self.states = refreshed;
        self.persist();
        true
    }

    pub fn persist(&self) {
        persist(self.storage.as_ref(), &self.options.storage_key, &self.states);
    }
}
