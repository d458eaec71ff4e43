//! Story viewer finite-state machine.
//!
//! [`transition`] is the only way a [`ViewerState`] changes. It returns the
//! new state together with an ordered list of [`Effect`]s for the runtime to
//! carry out. Within one transition effects are always ordered as: driver
//! teardown, position report, present, driver attach. At most one driver (an
//! image timer or a set of video listeners) is ever attached.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{StoryPosition, TimelineEntry, DEFAULT_IMAGE_DURATION_MS};

pub const PROGRESS_TICK_MS: u64 = 50;
pub const DEFAULT_VOLUME: f32 = 0.05;
pub const WIDE_ASPECT_RATIO: f32 = 1.4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    PlayingImage,
    PlayingVideo,
    Paused,
    Seeking,
    Closed,
}

/// What is currently advancing the progress bar.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Driver {
    Timer,
    VideoListeners,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TapZone {
    Prev,
    Toggle,
    Next,
}

impl TapZone {
    /// Splits the media area into thirds.
    pub fn from_position(x: f32, width: f32) -> Self {
        if width <= 0.0 || !x.is_finite() {
            return TapZone::Toggle;
        }
        let third = width / 3.0;
        if x < third {
            TapZone::Prev
        } else if x >= width - third {
            TapZone::Next
        } else {
            TapZone::Toggle
        }
    }
}

/// Pointer position relative to the progress bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeekPointer {
    pub x: f32,
    pub bar_left: f32,
    pub bar_width: f32,
}

impl SeekPointer {
    pub fn fraction(&self) -> f32 {
        if self.bar_width <= 0.0 || !self.x.is_finite() {
            return 0.0;
        }
        ((self.x - self.bar_left) / self.bar_width).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerEvent {
    Start,
    Tick { elapsed_ms: u64 },
    ImageLoaded { width: u32, height: u32 },
    VideoMetadata { duration_ms: u64, width: u32, height: u32 },
    VideoTimeUpdate { position_ms: u64 },
    VideoEnded,
    PlaybackRejected,
    Next,
    Prev,
    TogglePause,
    Tap { x: f32, width: f32 },
    HoldStart,
    HoldEnd,
    ToggleMenu,
    DismissMenu,
    SeekStart { pointer: SeekPointer },
    SeekMove { pointer: SeekPointer },
    SeekEnd,
    Key { key: Key },
    ToggleMute,
    SetVolume { volume: f32 },
    ToggleLike,
    BackdropClick,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    StartTimer { interval_ms: u64 },
    CancelTimer,
    AttachVideo { url: String },
    DetachVideo,
    PlayVideo,
    PauseVideo,
    SeekVideo { position_ms: u64 },
    ApplyAudio { muted: bool, volume: f32 },
    ReportPosition { position: StoryPosition, user_changed: bool },
    Present { index: usize },
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    /// Wrap to the first entry instead of closing after the last one.
    pub loop_timeline: bool,
    pub default_image_duration_ms: u64,
    pub tick_ms: u64,
    pub initial_volume: f32,
    pub wide_aspect_ratio: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            loop_timeline: false,
            default_image_duration_ms: DEFAULT_IMAGE_DURATION_MS,
            tick_ms: PROGRESS_TICK_MS,
            initial_volume: DEFAULT_VOLUME,
            wide_aspect_ratio: WIDE_ASPECT_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub index: usize,
    pub phase: Phase,
    pub progress: f32,
    pub muted: bool,
    pub volume: f32,
    /// Paused by a center tap or by a rejected autoplay.
    pub user_paused: bool,
    pub menu_open: bool,
    pub holding: bool,
    pub seeking: bool,
    pub elapsed_ms: u64,
    pub video_position_ms: u64,
    pub video_duration_ms: Option<u64>,
    pub wide_media: bool,
    pub liked: BTreeSet<usize>,
    pub driver: Option<Driver>,
    pub options: ViewerOptions,
    video_playing: bool,
    last_reported: Option<StoryPosition>,
}

pub struct Transition {
    pub state: ViewerState,
    pub effects: Vec<Effect>,
}

pub fn transition(state: ViewerState, timeline: &[TimelineEntry], event: &ViewerEvent) -> Transition {
    let mut state = state;
    let mut effects = Vec::new();
    state.apply(timeline, event, &mut effects);
    Transition { state, effects }
}

impl ViewerState {
    pub fn new(start_index: usize, options: ViewerOptions) -> Self {
        Self {
            index: start_index,
            phase: Phase::Idle,
            progress: 0.0,
            muted: false,
            volume: options.initial_volume.clamp(0.0, 1.0),
            user_paused: false,
            menu_open: false,
            holding: false,
            seeking: false,
            elapsed_ms: 0,
            video_position_ms: 0,
            video_duration_ms: None,
            wide_media: false,
            liked: BTreeSet::new(),
            driver: None,
            options,
            video_playing: false,
            last_reported: None,
        }
    }

    pub fn paused(&self) -> bool {
        self.user_paused || self.menu_open || self.holding
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub fn is_liked(&self) -> bool {
        self.liked.contains(&self.index)
    }

    fn apply(&mut self, timeline: &[TimelineEntry], event: &ViewerEvent, effects: &mut Vec<Effect>) {
        match self.phase {
            Phase::Closed => return,
            Phase::Idle => {
                match event {
                    ViewerEvent::Start => {
                        if self.index < timeline.len() {
                            self.enter(self.index, timeline, true, effects);
                        } else {
                            self.close(effects);
                        }
                    }
                    ViewerEvent::Close | ViewerEvent::BackdropClick => self.close(effects),
                    _ => {}
                }
                return;
            }
            _ => {}
        }

        // The timeline shrank underneath us.
        let Some(entry) = timeline.get(self.index) else {
            self.close(effects);
            return;
        };
        let is_video = entry.media.is_video();

        match event {
            ViewerEvent::Start => {}
            ViewerEvent::Tick { elapsed_ms } => {
                if self.driver != Some(Driver::Timer) {
                    return;
                }
                let duration = self.image_duration(entry);
                self.elapsed_ms = self.elapsed_ms.saturating_add(*elapsed_ms).min(duration);
                self.progress = ratio(self.elapsed_ms, duration);
                if self.elapsed_ms >= duration {
                    self.advance(1, timeline, effects);
                }
            }
            ViewerEvent::ImageLoaded { width, height } => {
                if !is_video {
                    self.wide_media = self.is_wide(*width, *height);
                }
            }
            ViewerEvent::VideoMetadata {
                duration_ms,
                width,
                height,
            } => {
                if is_video {
                    self.video_duration_ms = Some(*duration_ms).filter(|ms| *ms > 0);
                    self.wide_media = self.is_wide(*width, *height);
                }
            }
            ViewerEvent::VideoTimeUpdate { position_ms } => {
                if self.driver != Some(Driver::VideoListeners) || self.seeking {
                    return;
                }
                self.video_position_ms = *position_ms;
                if let Some(duration) = self.video_duration_ms {
                    self.progress = ratio(*position_ms, duration);
                }
            }
            ViewerEvent::VideoEnded => {
                if self.driver == Some(Driver::VideoListeners) {
                    self.advance(1, timeline, effects);
                }
            }
            ViewerEvent::PlaybackRejected => {
                if is_video {
                    self.video_playing = false;
                    self.user_paused = true;
                    self.refresh(timeline, effects);
                }
            }
            ViewerEvent::Next => self.advance(1, timeline, effects),
            ViewerEvent::Prev => self.advance(-1, timeline, effects),
            ViewerEvent::TogglePause => {
                self.user_paused = !self.user_paused;
                self.refresh(timeline, effects);
            }
            ViewerEvent::Tap { x, width } => match TapZone::from_position(*x, *width) {
                TapZone::Prev => self.advance(-1, timeline, effects),
                TapZone::Next => self.advance(1, timeline, effects),
                TapZone::Toggle => {
                    self.user_paused = !self.user_paused;
                    self.refresh(timeline, effects);
                }
            },
            ViewerEvent::HoldStart => {
                self.holding = true;
                self.refresh(timeline, effects);
            }
            ViewerEvent::HoldEnd => {
                self.holding = false;
                self.refresh(timeline, effects);
            }
            ViewerEvent::ToggleMenu => {
                self.menu_open = !self.menu_open;
                self.refresh(timeline, effects);
            }
            ViewerEvent::DismissMenu => {
                if self.menu_open {
                    self.menu_open = false;
                    self.refresh(timeline, effects);
                }
            }
            ViewerEvent::SeekStart { pointer } => {
                self.seeking = true;
                self.refresh(timeline, effects);
                self.seek_to(pointer.fraction(), entry, effects);
            }
            ViewerEvent::SeekMove { pointer } => {
                if self.seeking {
                    self.seek_to(pointer.fraction(), entry, effects);
                }
            }
            ViewerEvent::SeekEnd => {
                if self.seeking {
                    self.seeking = false;
                    self.refresh(timeline, effects);
                }
            }
            ViewerEvent::Key { key } => match key {
                Key::ArrowLeft => self.advance(-1, timeline, effects),
                Key::ArrowRight => self.advance(1, timeline, effects),
                Key::Escape => self.close(effects),
            },
            ViewerEvent::ToggleMute => {
                self.muted = !self.muted;
                self.push_audio(effects);
            }
            ViewerEvent::SetVolume { volume } => {
                if !volume.is_finite() {
                    return;
                }
                self.volume = volume.clamp(0.0, 1.0);
                if self.volume > 0.0 && self.muted {
                    self.muted = false;
                }
                self.push_audio(effects);
            }
            ViewerEvent::ToggleLike => {
                if !self.liked.remove(&self.index) {
                    self.liked.insert(self.index);
                }
            }
            ViewerEvent::BackdropClick | ViewerEvent::Close => self.close(effects),
        }
    }

    /// Moves one step forward or back, closing or wrapping at the ends.
    fn advance(&mut self, step: i8, timeline: &[TimelineEntry], effects: &mut Vec<Effect>) {
        let len = timeline.len();
        if step > 0 {
            if self.index + 1 < len {
                self.enter(self.index + 1, timeline, true, effects);
            } else if self.options.loop_timeline && len > 0 {
                self.enter(0, timeline, true, effects);
            } else {
                self.close(effects);
            }
        } else if self.index > 0 {
            self.enter(self.index - 1, timeline, true, effects);
        } else if self.options.loop_timeline && len > 0 {
            self.enter(len - 1, timeline, true, effects);
        } else {
            // Already at the first entry: restart it.
            self.enter(self.index, timeline, false, effects);
        }
    }

    fn enter(&mut self, index: usize, timeline: &[TimelineEntry], report: bool, effects: &mut Vec<Effect>) {
        self.teardown(effects);

        self.index = index;
        self.progress = 0.0;
        self.elapsed_ms = 0;
        self.video_position_ms = 0;
        self.video_duration_ms = None;
        self.wide_media = false;
        self.seeking = false;

        let Some(entry) = timeline.get(index) else {
            self.close(effects);
            return;
        };

        if report {
            let position = StoryPosition::from(entry);
            let user_changed = self
                .last_reported
                .map_or(true, |previous| previous.user_id != position.user_id);
            self.last_reported = Some(position);
            effects.push(Effect::ReportPosition {
                position,
                user_changed,
            });
        }
        effects.push(Effect::Present { index });

        self.refresh(timeline, effects);
    }

    /// Re-derives the phase and brings the attached driver in line with it.
    fn refresh(&mut self, timeline: &[TimelineEntry], effects: &mut Vec<Effect>) {
        let Some(entry) = timeline.get(self.index) else {
            self.close(effects);
            return;
        };
        let is_video = entry.media.is_video();
        let halted = self.paused() || self.seeking;

        self.phase = if self.seeking {
            Phase::Seeking
        } else if self.paused() {
            Phase::Paused
        } else if is_video {
            Phase::PlayingVideo
        } else {
            Phase::PlayingImage
        };

        let desired = if is_video {
            Some(Driver::VideoListeners)
        } else if halted {
            None
        } else {
            Some(Driver::Timer)
        };

        if self.driver != desired {
            self.teardown(effects);
            match desired {
                Some(Driver::Timer) => effects.push(Effect::StartTimer {
                    interval_ms: self.options.tick_ms.max(1),
                }),
                Some(Driver::VideoListeners) => {
                    effects.push(Effect::AttachVideo {
                        url: entry.media.url.clone(),
                    });
                    effects.push(Effect::ApplyAudio {
                        muted: self.muted,
                        volume: self.volume,
                    });
                }
                None => {}
            }
            self.driver = desired;
        }

        if self.driver == Some(Driver::VideoListeners) && self.video_playing == halted {
            self.video_playing = !halted;
            effects.push(if halted {
                Effect::PauseVideo
            } else {
                Effect::PlayVideo
            });
        }
    }

    fn teardown(&mut self, effects: &mut Vec<Effect>) {
        match self.driver.take() {
            Some(Driver::Timer) => effects.push(Effect::CancelTimer),
            Some(Driver::VideoListeners) => effects.push(Effect::DetachVideo),
            None => {}
        }
        self.video_playing = false;
    }

    fn close(&mut self, effects: &mut Vec<Effect>) {
        self.teardown(effects);
        self.phase = Phase::Closed;
        self.seeking = false;
        effects.push(Effect::Close);
    }

    fn seek_to(&mut self, fraction: f32, entry: &TimelineEntry, effects: &mut Vec<Effect>) {
        if entry.media.is_video() {
            // No metadata yet: nothing to map the pointer onto.
            let Some(duration) = self.video_duration_ms else {
                return;
            };
            let position = scale(duration, fraction);
            self.video_position_ms = position;
            self.progress = ratio(position, duration);
            effects.push(Effect::SeekVideo {
                position_ms: position,
            });
        } else {
            let duration = self.image_duration(entry);
            self.elapsed_ms = scale(duration, fraction);
            self.progress = ratio(self.elapsed_ms, duration);
        }
    }

    fn push_audio(&self, effects: &mut Vec<Effect>) {
        if self.driver == Some(Driver::VideoListeners) {
            effects.push(Effect::ApplyAudio {
                muted: self.muted,
                volume: self.volume,
            });
        }
    }

    fn image_duration(&self, entry: &TimelineEntry) -> u64 {
        entry
            .media
            .image_duration_ms(self.options.default_image_duration_ms)
            .unwrap_or(self.options.default_image_duration_ms)
            .max(1)
    }

    fn is_wide(&self, width: u32, height: u32) -> bool {
        height > 0 && width as f32 / height as f32 > self.options.wide_aspect_ratio
    }
}

fn ratio(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        return 0.0;
    }
    (part as f32 / whole as f32).min(1.0)
}

fn scale(whole: u64, fraction: f32) -> u64 {
    (whole as f64 * fraction.clamp(0.0, 1.0) as f64).round() as u64
}

#[cfg(test)]
mod tests;
