pub mod app;
pub mod catalog;
pub mod models;
pub mod settings;
pub mod storage;
pub mod story_bar;
pub mod utils;
pub mod view_state;
pub mod viewer;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{bail, Context};
use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use app::StoriesApp;
use catalog::Catalog;
use models::{MediaKind, StoryPosition};
use settings::{SettingsStore, SETTINGS_FILE, VIEW_STATE_FILE};
use storage::JsonFileStorage;
use story_bar::StoryBar;
use view_state::ViewStateStore;
use viewer::{Effect, Phase, ViewerEvent, ViewerHost, ViewerSnapshot};

/// Length the headless player pretends every video has.
const DEMO_VIDEO_MS: u64 = 3_000;
const DEMO_POLL_MS: u64 = 250;

/// Stands in for a UI: logs what would be drawn and remembers whether a video is attached.
#[derive(Default)]
struct LogPresenter {
    video_attached: Mutex<bool>,
}

impl ViewerHost for LogPresenter {
    fn position_changed(&self, position: StoryPosition, user_changed: bool) {
        if user_changed {
            info!("Now watching user {}", position.user_id);
        }
    }

    fn present(&self, snapshot: &ViewerSnapshot) {
        info!(
            "[{}] {} · {} · {} ({} segments)",
            snapshot.index,
            snapshot.username,
            snapshot.time_ago,
            snapshot.media.url,
            snapshot.segments.len()
        );
    }

    fn media(&self, command: &Effect) {
        debug!("media: {:?}", command);
        let mut attached = match self.video_attached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match command {
            Effect::AttachVideo { .. } => *attached = true,
            Effect::DetachVideo => *attached = false,
            _ => {}
        }
    }

    fn closed(&self, session_id: Uuid) {
        info!("Viewer session {} closed", session_id);
    }
}

pub fn run() -> anyhow::Result<()> {
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    info!("Reelview starting up...");

    let data_dir = settings::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    if settings.save_if_missing()? {
        info!("Wrote default settings to {}", data_dir.join(SETTINGS_FILE).display());
    }
    let storage = Arc::new(JsonFileStorage::open(data_dir.join(VIEW_STATE_FILE))?);

    let catalog = Catalog::demo(Utc::now());
    let store = ViewStateStore::open(
        storage,
        catalog.records.clone(),
        settings.store_options(),
        Utc::now(),
    );
    let bar = StoryBar::new(&catalog, store);

    let presenter = Arc::new(LogPresenter::default());
    let app = StoriesApp::new(bar, settings.viewer_options(), presenter.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(play_demo(&app, &presenter))
}

async fn play_demo(app: &StoriesApp, presenter: &LogPresenter) -> anyhow::Result<()> {
    let entries = app.bar_entries();
    for entry in &entries {
        info!(
            "bar: {} ({})",
            entry.username,
            if entry.has_unviewed { "new" } else { "seen" }
        );
    }
    let Some(first) = entries.first() else {
        bail!("story catalog is empty");
    };

    if app.open_user(first.user_id)?.is_none() {
        warn!("Nothing to play for {}", first.username);
        return Ok(());
    }

    let mut video_position_ms = 0;
    let mut video_index = None;

    while let Some(viewer) = app.viewer() {
        tokio::time::sleep(Duration::from_millis(DEMO_POLL_MS)).await;

        let Some(view) = viewer.snapshot() else {
            break;
        };
        let attached = presenter
            .video_attached
            .lock()
            .map(|guard| *guard)
            .unwrap_or(false);
        if view.media.kind != MediaKind::Video || !attached {
            continue;
        }

        if video_index != Some(view.index) {
            video_index = Some(view.index);
            video_position_ms = 0;
            viewer.dispatch(ViewerEvent::VideoMetadata {
                duration_ms: DEMO_VIDEO_MS,
                width: 1080,
                height: 1920,
            });
        }
        if view.phase != Phase::PlayingVideo {
            continue;
        }

        video_position_ms += DEMO_POLL_MS;
        if video_position_ms >= DEMO_VIDEO_MS {
            viewer.dispatch(ViewerEvent::VideoEnded);
        } else {
            viewer.dispatch(ViewerEvent::VideoTimeUpdate {
                position_ms: video_position_ms,
            });
        }
    }

    for entry in app.bar_entries() {
        info!(
            "bar: {} ({})",
            entry.username,
            if entry.has_unviewed { "new" } else { "seen" }
        );
    }
    Ok(())
}
