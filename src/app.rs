use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    models::{StoryPosition, UserId},
    story_bar::{BarEntry, StoryBar},
    viewer::{Effect, Phase, ViewerController, ViewerEvent, ViewerHost, ViewerOptions, ViewerSnapshot},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

type ViewerSlot = Arc<Mutex<Option<ViewerController>>>;

/// The story bar plus a single modal viewer slot.
pub struct StoriesApp {
    bar: Arc<Mutex<StoryBar>>,
    viewer: ViewerSlot,
    options: ViewerOptions,
    presenter: Arc<dyn ViewerHost>,
}

/// Records positions into the bar and clears the slot when its session ends,
/// then forwards everything to the presenter.
///
/// The slot owns the controller and the controller owns this host, so the
/// host only keeps a weak handle back to the slot.
struct SessionHost {
    bar: Arc<Mutex<StoryBar>>,
    viewer: Weak<Mutex<Option<ViewerController>>>,
    presenter: Arc<dyn ViewerHost>,
}

impl ViewerHost for SessionHost {
    fn position_changed(&self, position: StoryPosition, user_changed: bool) {
        lock(&self.bar).record_position(position, Utc::now());
        self.presenter.position_changed(position, user_changed);
    }

    fn present(&self, snapshot: &ViewerSnapshot) {
        self.presenter.present(snapshot);
    }

    fn media(&self, command: &Effect) {
        self.presenter.media(command);
    }

    fn closed(&self, session_id: Uuid) {
        let finished = self.viewer.upgrade().and_then(|viewer| {
            let mut slot = lock(&viewer);
            match slot.as_ref() {
                Some(current) if current.session_id() == session_id => slot.take(),
                _ => None,
            }
        });
        // Dropped outside the slot lock.
        drop(finished);
        self.presenter.closed(session_id);
    }
}

impl StoriesApp {
    pub fn new(bar: StoryBar, options: ViewerOptions, presenter: Arc<dyn ViewerHost>) -> Self {
        Self {
            bar: Arc::new(Mutex::new(bar)),
            viewer: Arc::new(Mutex::new(None)),
            options,
            presenter,
        }
    }

    pub fn bar_entries(&self) -> Vec<BarEntry> {
        lock(&self.bar).entries()
    }

    /// Runs `f` against the bar, e.g. to inspect the view-state store.
    pub fn with_bar<T>(&self, f: impl FnOnce(&StoryBar) -> T) -> T {
        f(&lock(&self.bar))
    }

    /// Opens the viewer on a user's first unviewed item, closing any open viewer first.
    ///
    /// Returns `Ok(None)` when the user has nothing to play.
    pub fn open_user(&self, user_id: UserId) -> Result<Option<ViewerController>> {
        self.close_viewer();

        let (timeline, start) = {
            let bar = lock(&self.bar);
            match bar.open_user(user_id) {
                Some(start) => (bar.timeline().to_vec(), start),
                None => {
                    log_warn!("User {} has no stories to open", user_id);
                    return Ok(None);
                }
            }
        };

        let host = Arc::new(SessionHost {
            bar: Arc::clone(&self.bar),
            viewer: Arc::downgrade(&self.viewer),
            presenter: Arc::clone(&self.presenter),
        });
        let controller = ViewerController::open(timeline, start, self.options, host)?;
        log_info!(
            "Opened user {} at timeline index {} (session {})",
            user_id,
            start,
            controller.session_id()
        );

        if !controller.is_closed() {
            *lock(&self.viewer) = Some(controller.clone());
        }
        Ok(Some(controller))
    }

    pub fn viewer(&self) -> Option<ViewerController> {
        lock(&self.viewer).clone()
    }

    pub fn is_viewer_open(&self) -> bool {
        lock(&self.viewer).is_some()
    }

    pub fn close_viewer(&self) {
        let previous = lock(&self.viewer).take();
        if let Some(viewer) = previous {
            viewer.close();
        }
    }

    /// Forwards an event to the open viewer, if any.
    pub fn dispatch(&self, event: ViewerEvent) -> Option<Phase> {
        let viewer = self.viewer()?;
        Some(viewer.dispatch(event))
    }

    /// Re-runs view-state expiry, e.g. when the bar becomes visible again.
    pub fn refresh(&self) -> bool {
        lock(&self.bar).refresh(Utc::now())
    }
}

impl Drop for StoriesApp {
    fn drop(&mut self) {
        self.close_viewer();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
