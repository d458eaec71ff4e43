use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{StoryPosition, TimelineEntry};

use super::{
    state::{transition, Effect, Phase, ViewerEvent, ViewerOptions, ViewerState},
    view::{snapshot, ViewerSnapshot},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Receives everything the viewer wants shown or recorded.
///
/// Callbacks run after the state lock is released, so a host may dispatch
/// back into the controller from inside them.
pub trait ViewerHost: Send + Sync {
    /// Fires before the entry at the new position is presented.
    fn position_changed(&self, position: StoryPosition, user_changed: bool);

    fn present(&self, _snapshot: &ViewerSnapshot) {}

    /// Video element and audio commands: attach, detach, play, pause, seek, audio.
    fn media(&self, _command: &Effect) {}

    fn closed(&self, _session_id: Uuid) {}
}

/// Attach/detach counters for the timer and video listeners.
#[derive(Debug, Default)]
struct DriverStats {
    attached: AtomicUsize,
    detached: AtomicUsize,
    peak_active: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriverCounts {
    pub attached: usize,
    pub detached: usize,
    pub peak_active: usize,
}

impl DriverCounts {
    pub fn active(&self) -> usize {
        self.attached.saturating_sub(self.detached)
    }
}

struct Ticker {
    generation: u64,
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

struct ControllerInner {
    session_id: Uuid,
    timeline: Vec<TimelineEntry>,
    state: Mutex<ViewerState>,
    ticker: Mutex<Option<Ticker>>,
    generation: AtomicU64,
    stats: DriverStats,
    runtime: Handle,
    host: Arc<dyn ViewerHost>,
}

/// Runs one viewer session: applies events through the state machine and
/// carries out the resulting effects, owning the single ticker task.
#[derive(Clone)]
pub struct ViewerController {
    inner: Arc<ControllerInner>,
}

enum HostCall {
    Position(StoryPosition, bool),
    Present(ViewerSnapshot),
    Media(Effect),
    Closed,
}

impl ViewerController {
    /// Opens a session on the current tokio runtime and starts playback.
    pub fn open(
        timeline: Vec<TimelineEntry>,
        start_index: usize,
        options: ViewerOptions,
        host: Arc<dyn ViewerHost>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("story viewer needs a tokio runtime")?;
        let session_id = Uuid::new_v4();

        log_info!(
            "Opening viewer session {} at {}/{}",
            session_id,
            start_index,
            timeline.len()
        );

        let controller = Self {
            inner: Arc::new(ControllerInner {
                session_id,
                timeline,
                state: Mutex::new(ViewerState::new(start_index, options)),
                ticker: Mutex::new(None),
                generation: AtomicU64::new(0),
                stats: DriverStats::default(),
                runtime,
                host,
            }),
        };
        controller.dispatch(ViewerEvent::Start);
        Ok(controller)
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.inner.timeline
    }

    /// Applies one event and returns the phase it settled in.
    pub fn dispatch(&self, event: ViewerEvent) -> Phase {
        self.inner.dispatch(&event, None)
    }

    pub fn close(&self) {
        self.dispatch(ViewerEvent::Close);
    }

    pub fn state(&self) -> ViewerState {
        lock(&self.inner.state).clone()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.inner.state).phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }

    pub fn snapshot(&self) -> Option<ViewerSnapshot> {
        let state = lock(&self.inner.state);
        snapshot(&state, &self.inner.timeline, Utc::now())
    }

    pub fn driver_counts(&self) -> DriverCounts {
        let stats = &self.inner.stats;
        DriverCounts {
            attached: stats.attached.load(Ordering::SeqCst),
            detached: stats.detached.load(Ordering::SeqCst),
            peak_active: stats.peak_active.load(Ordering::SeqCst),
        }
    }

    /// Whether a ticker task currently exists.
    pub fn has_ticker(&self) -> bool {
        lock(&self.inner.ticker).is_some()
    }
}

impl ControllerInner {
    /// `tick_generation` is set for timer ticks; ticks from a replaced or
    /// cancelled ticker are dropped.
    fn dispatch(self: &Arc<Self>, event: &ViewerEvent, tick_generation: Option<u64>) -> Phase {
        let (phase, calls) = {
            let mut state = lock(&self.state);

            if let Some(generation) = tick_generation {
                if !self.is_current(generation) {
                    return state.phase;
                }
            }

            let next = transition(state.clone(), &self.timeline, event);
            *state = next.state;
            let calls = self.execute(&state, next.effects);
            (state.phase, calls)
        };

        for call in calls {
            match call {
                HostCall::Position(position, user_changed) => {
                    self.host.position_changed(position, user_changed)
                }
                HostCall::Present(view) => self.host.present(&view),
                HostCall::Media(command) => self.host.media(&command),
                HostCall::Closed => self.host.closed(self.session_id),
            }
        }
        phase
    }

    /// Runs timer effects in place and queues the rest for the host.
    fn execute(self: &Arc<Self>, state: &ViewerState, effects: Vec<Effect>) -> Vec<HostCall> {
        let mut calls = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartTimer { interval_ms } => {
                    self.spawn_ticker(interval_ms);
                    self.stats.attach();
                }
                Effect::CancelTimer => {
                    self.cancel_ticker();
                    self.stats.detach();
                }
                Effect::AttachVideo { .. } => {
                    self.stats.attach();
                    calls.push(HostCall::Media(effect));
                }
                Effect::DetachVideo => {
                    self.stats.detach();
                    calls.push(HostCall::Media(effect));
                }
                Effect::ReportPosition {
                    position,
                    user_changed,
                } => {
                    log_debug!(
                        "Session {} at user={} media={}",
                        self.session_id,
                        position.user_id,
                        position.media_index
                    );
                    calls.push(HostCall::Position(position, user_changed));
                }
                Effect::Present { .. } => {
                    if let Some(view) = snapshot(state, &self.timeline, Utc::now()) {
                        calls.push(HostCall::Present(view));
                    }
                }
                Effect::Close => {
                    // No ticker may outlive the session, whatever the effect list said.
                    self.cancel_ticker();
                    log_info!("Viewer session {} closed", self.session_id);
                    calls.push(HostCall::Closed);
                }
                Effect::PlayVideo
                | Effect::PauseVideo
                | Effect::SeekVideo { .. }
                | Effect::ApplyAudio { .. } => calls.push(HostCall::Media(effect)),
            }
        }
        calls
    }

    fn spawn_ticker(self: &Arc<Self>, interval_ms: u64) {
        let mut ticker_guard = lock(&self.ticker);
        if let Some(previous) = ticker_guard.take() {
            previous.cancel.cancel();
            previous.handle.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let handle = self.runtime.spawn(tick_loop(
            Arc::downgrade(self),
            generation,
            interval_ms,
            cancel.clone(),
        ));

        *ticker_guard = Some(Ticker {
            generation,
            handle,
            cancel,
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|ticker| ticker.generation == generation)
    }

    fn cancel_ticker(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
        }
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        let slot = match self.ticker.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(ticker) = slot.take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
        }
    }
}

impl DriverStats {
    fn attach(&self) {
        let attached = self.attached.fetch_add(1, Ordering::SeqCst) + 1;
        let active = attached.saturating_sub(self.detached.load(Ordering::SeqCst));
        self.peak_active.fetch_max(active, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

async fn tick_loop(
    inner: Weak<ControllerInner>,
    generation: u64,
    interval_ms: u64,
    cancel: CancellationToken,
) {
    let period = Duration::from_millis(interval_ms.max(1));
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let event = ViewerEvent::Tick { elapsed_ms: interval_ms };
                inner.dispatch(&event, Some(generation));
                if !inner.is_current(generation) {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
