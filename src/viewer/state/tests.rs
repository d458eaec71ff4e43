use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::{
    models::{MediaItem, StoryRecord, UserProfile},
    story_bar::flatten_timeline,
};

const A: u64 = 1;
const B: u64 = 2;

/// A: one default-length image (newest). B: an image then a video.
fn timeline() -> Vec<TimelineEntry> {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let users = vec![
        UserProfile {
            id: A,
            username: "a".into(),
            avatar: "/a.png".into(),
        },
        UserProfile {
            id: B,
            username: "b".into(),
            avatar: "/b.png".into(),
        },
    ];
    let records = vec![
        StoryRecord::new(
            B,
            now - Duration::hours(1),
            vec![MediaItem::image_for("/b/1.jpg", 1_000), MediaItem::video("/b/2.mp4")],
        ),
        StoryRecord::new(A, now, vec![MediaItem::image("/a/1.jpg")]),
    ];
    flatten_timeline(&users, &records)
}

struct Harness {
    state: ViewerState,
    timeline: Vec<TimelineEntry>,
    log: Vec<Effect>,
}

impl Harness {
    fn open(start: usize, options: ViewerOptions) -> Self {
        let mut harness = Self {
            state: ViewerState::new(start, options),
            timeline: timeline(),
            log: Vec::new(),
        };
        harness.send(ViewerEvent::Start);
        harness
    }

    fn send(&mut self, event: ViewerEvent) -> Vec<Effect> {
        let next = transition(self.state.clone(), &self.timeline, &event);
        self.state = next.state;
        self.log.extend(next.effects.iter().cloned());
        next.effects
    }

    fn tick_for(&mut self, ms: u64) -> Vec<Effect> {
        let step = self.state.options.tick_ms;
        let mut effects = Vec::new();
        for _ in 0..ms / step {
            effects.extend(self.send(ViewerEvent::Tick { elapsed_ms: step }));
        }
        effects
    }

    fn reports(&self) -> Vec<(u64, usize, bool)> {
        self.log
            .iter()
            .filter_map(|effect| match effect {
                Effect::ReportPosition {
                    position,
                    user_changed,
                } => Some((position.user_id, position.media_index, *user_changed)),
                _ => None,
            })
            .collect()
    }
}

fn pointer(x: f32) -> SeekPointer {
    SeekPointer {
        x,
        bar_left: 100.0,
        bar_width: 200.0,
    }
}

#[test]
fn start_reports_then_presents_then_arms_timer() {
    let harness = Harness::open(0, ViewerOptions::default());

    assert_eq!(
        harness.log,
        vec![
            Effect::ReportPosition {
                position: StoryPosition {
                    user_id: A,
                    media_index: 0
                },
                user_changed: true,
            },
            Effect::Present { index: 0 },
            Effect::StartTimer {
                interval_ms: PROGRESS_TICK_MS
            },
        ]
    );
    assert_eq!(harness.state.phase, Phase::PlayingImage);
}

#[test]
fn image_auto_advances_to_next_user_after_default_duration() {
    let mut harness = Harness::open(0, ViewerOptions::default());

    let effects = harness.tick_for(DEFAULT_IMAGE_DURATION_MS - PROGRESS_TICK_MS);
    assert!(effects.is_empty());
    assert_eq!(harness.state.index, 0);
    assert!(harness.state.progress > 0.98 && harness.state.progress < 1.0);

    let effects = harness.send(ViewerEvent::Tick {
        elapsed_ms: PROGRESS_TICK_MS,
    });
    assert_eq!(
        effects,
        vec![
            Effect::CancelTimer,
            Effect::ReportPosition {
                position: StoryPosition {
                    user_id: B,
                    media_index: 0
                },
                user_changed: true,
            },
            Effect::Present { index: 1 },
            Effect::StartTimer {
                interval_ms: PROGRESS_TICK_MS
            },
        ]
    );
    assert_eq!(harness.state.index, 1);
    assert_eq!(harness.state.progress, 0.0);
}

#[test]
fn explicit_duration_wins_and_same_user_is_not_a_user_change() {
    let mut harness = Harness::open(1, ViewerOptions::default());
    harness.tick_for(1_000);

    assert_eq!(harness.state.index, 2);
    assert_eq!(harness.state.phase, Phase::PlayingVideo);
    assert_eq!(harness.reports(), vec![(B, 0, true), (B, 1, false)]);
}

#[test]
fn pause_keeps_progress_and_stops_the_timer() {
    let mut harness = Harness::open(0, ViewerOptions::default());
    harness.tick_for(2_500);

    let effects = harness.send(ViewerEvent::TogglePause);
    assert_eq!(effects, vec![Effect::CancelTimer]);
    assert_eq!(harness.state.phase, Phase::Paused);
    assert!(harness.state.paused());

    assert!(harness.tick_for(10_000).is_empty());
    assert_eq!(harness.state.progress, 0.5);

    let effects = harness.send(ViewerEvent::Tap {
        x: 150.0,
        width: 300.0,
    });
    assert_eq!(
        effects,
        vec![Effect::StartTimer {
            interval_ms: PROGRESS_TICK_MS
        }]
    );
    harness.tick_for(2_500);
    assert_eq!(harness.state.index, 1);
}

#[test]
fn hold_and_menu_pause_independently() {
    let mut harness = Harness::open(0, ViewerOptions::default());

    harness.send(ViewerEvent::HoldStart);
    harness.send(ViewerEvent::ToggleMenu);
    assert_eq!(harness.state.phase, Phase::Paused);

    harness.send(ViewerEvent::HoldEnd);
    assert_eq!(harness.state.phase, Phase::Paused);
    assert!(harness.state.driver.is_none());

    let effects = harness.send(ViewerEvent::DismissMenu);
    assert_eq!(harness.state.phase, Phase::PlayingImage);
    assert_eq!(
        effects,
        vec![Effect::StartTimer {
            interval_ms: PROGRESS_TICK_MS
        }]
    );
    assert!(harness.send(ViewerEvent::DismissMenu).is_empty());
}

#[test]
fn video_progress_follows_playback_and_ended_advances() {
    let mut harness = Harness::open(2, ViewerOptions::default());
    assert_eq!(
        harness.log[2..],
        [
            Effect::AttachVideo {
                url: "/b/2.mp4".into()
            },
            Effect::ApplyAudio {
                muted: false,
                volume: DEFAULT_VOLUME
            },
            Effect::PlayVideo,
        ]
    );

    harness.send(ViewerEvent::VideoMetadata {
        duration_ms: 8_000,
        width: 1920,
        height: 1080,
    });
    assert!(harness.state.wide_media);

    harness.send(ViewerEvent::VideoTimeUpdate { position_ms: 2_000 });
    assert_eq!(harness.state.progress, 0.25);

    assert!(harness.tick_for(10_000).is_empty());
    assert_eq!(harness.state.progress, 0.25);

    let effects = harness.send(ViewerEvent::VideoEnded);
    assert_eq!(effects, vec![Effect::DetachVideo, Effect::Close]);
    assert!(harness.state.is_closed());
}

#[test]
fn rejected_autoplay_stays_paused_until_tapped() {
    let mut harness = Harness::open(2, ViewerOptions::default());

    let effects = harness.send(ViewerEvent::PlaybackRejected);
    assert!(effects.is_empty());
    assert_eq!(harness.state.phase, Phase::Paused);

    let effects = harness.send(ViewerEvent::Tap {
        x: 150.0,
        width: 300.0,
    });
    assert_eq!(effects, vec![Effect::PlayVideo]);
    assert_eq!(harness.state.phase, Phase::PlayingVideo);
}

#[test]
fn seeking_clamps_to_bar_and_keeps_index() {
    let mut harness = Harness::open(2, ViewerOptions::default());
    harness.send(ViewerEvent::VideoMetadata {
        duration_ms: 10_000,
        width: 720,
        height: 1280,
    });
    assert!(!harness.state.wide_media);

    let effects = harness.send(ViewerEvent::SeekStart {
        pointer: pointer(150.0),
    });
    assert_eq!(
        effects,
        vec![
            Effect::PauseVideo,
            Effect::SeekVideo { position_ms: 2_500 }
        ]
    );
    assert_eq!(harness.state.phase, Phase::Seeking);

    harness.send(ViewerEvent::SeekMove {
        pointer: pointer(900.0),
    });
    assert_eq!(harness.state.video_position_ms, 10_000);
    assert_eq!(harness.state.progress, 1.0);

    harness.send(ViewerEvent::SeekMove {
        pointer: pointer(-40.0),
    });
    assert_eq!(harness.state.video_position_ms, 0);

    let effects = harness.send(ViewerEvent::SeekEnd);
    assert_eq!(effects, vec![Effect::PlayVideo]);
    assert_eq!(harness.state.index, 2);
}

#[test]
fn video_seek_waits_for_metadata() {
    let mut harness = Harness::open(2, ViewerOptions::default());
    harness.send(ViewerEvent::VideoTimeUpdate { position_ms: 1_200 });

    let effects = harness.send(ViewerEvent::SeekStart {
        pointer: pointer(250.0),
    });
    assert_eq!(effects, vec![Effect::PauseVideo]);
    assert_eq!(harness.state.video_position_ms, 1_200);

    harness.send(ViewerEvent::SeekMove {
        pointer: pointer(120.0),
    });
    assert_eq!(harness.state.video_position_ms, 1_200);
    assert!(!harness
        .log
        .iter()
        .any(|effect| matches!(effect, Effect::SeekVideo { .. })));
}

#[test]
fn image_seek_resumes_from_scrubbed_position() {
    let mut harness = Harness::open(0, ViewerOptions::default());

    harness.send(ViewerEvent::SeekStart {
        pointer: pointer(250.0),
    });
    assert!(harness.state.driver.is_none());
    assert_eq!(harness.state.elapsed_ms, 3_750);

    harness.send(ViewerEvent::SeekEnd);
    assert_eq!(harness.state.driver, Some(Driver::Timer));
    harness.tick_for(1_250);
    assert_eq!(harness.state.index, 1);
}

#[test]
fn end_of_timeline_closes_or_wraps() {
    let mut harness = Harness::open(2, ViewerOptions::default());
    harness.send(ViewerEvent::Key {
        key: Key::ArrowRight,
    });
    assert!(harness.state.is_closed());
    assert!(harness.send(ViewerEvent::Next).is_empty());

    let options = ViewerOptions {
        loop_timeline: true,
        ..ViewerOptions::default()
    };
    let mut harness = Harness::open(2, options);
    harness.send(ViewerEvent::Next);
    assert_eq!(harness.state.index, 0);
    harness.send(ViewerEvent::Prev);
    assert_eq!(harness.state.index, 2);
}

#[test]
fn prev_at_start_restarts_without_reporting() {
    let mut harness = Harness::open(0, ViewerOptions::default());
    harness.tick_for(1_000);

    let effects = harness.send(ViewerEvent::Tap {
        x: 10.0,
        width: 300.0,
    });
    assert_eq!(
        effects,
        vec![
            Effect::CancelTimer,
            Effect::Present { index: 0 },
            Effect::StartTimer {
                interval_ms: PROGRESS_TICK_MS
            },
        ]
    );
    assert_eq!(harness.state.progress, 0.0);
    assert_eq!(harness.reports().len(), 1);
}

#[test]
fn volume_unmutes_and_audio_only_reaches_video() {
    let mut harness = Harness::open(0, ViewerOptions::default());
    assert!(harness.send(ViewerEvent::ToggleMute).is_empty());
    assert!(harness.state.muted);

    harness.send(ViewerEvent::Next);
    harness.send(ViewerEvent::Next);
    let effects = harness.send(ViewerEvent::SetVolume { volume: 0.7 });
    assert_eq!(
        effects,
        vec![Effect::ApplyAudio {
            muted: false,
            volume: 0.7
        }]
    );

    harness.send(ViewerEvent::SetVolume { volume: 4.0 });
    assert_eq!(harness.state.volume, 1.0);
    assert!(harness.send(ViewerEvent::SetVolume { volume: f32::NAN }).is_empty());
}

#[test]
fn likes_are_per_timeline_entry() {
    let mut harness = Harness::open(0, ViewerOptions::default());
    harness.send(ViewerEvent::ToggleLike);
    assert!(harness.state.is_liked());

    harness.send(ViewerEvent::Next);
    assert!(!harness.state.is_liked());

    harness.send(ViewerEvent::Prev);
    harness.send(ViewerEvent::ToggleLike);
    assert!(!harness.state.is_liked());
}

#[test]
fn escape_and_backdrop_close_and_detach() {
    let mut harness = Harness::open(2, ViewerOptions::default());
    let effects = harness.send(ViewerEvent::BackdropClick);
    assert_eq!(effects, vec![Effect::DetachVideo, Effect::Close]);

    let mut harness = Harness::open(0, ViewerOptions::default());
    let effects = harness.send(ViewerEvent::Key { key: Key::Escape });
    assert_eq!(effects, vec![Effect::CancelTimer, Effect::Close]);
}

#[test]
fn empty_or_out_of_range_start_closes_immediately() {
    let next = transition(
        ViewerState::new(0, ViewerOptions::default()),
        &[],
        &ViewerEvent::Start,
    );
    assert_eq!(next.effects, vec![Effect::Close]);
    assert!(next.state.is_closed());

    let harness = Harness::open(17, ViewerOptions::default());
    assert_eq!(harness.log, vec![Effect::Close]);
}

#[test]
fn events_before_start_are_ignored() {
    let state = ViewerState::new(0, ViewerOptions::default());
    let next = transition(state, &timeline(), &ViewerEvent::Next);
    assert!(next.effects.is_empty());
    assert_eq!(next.state.phase, Phase::Idle);
}

#[test]
fn tap_zones_split_into_thirds() {
    assert_eq!(TapZone::from_position(0.0, 300.0), TapZone::Prev);
    assert_eq!(TapZone::from_position(99.0, 300.0), TapZone::Prev);
    assert_eq!(TapZone::from_position(100.0, 300.0), TapZone::Toggle);
    assert_eq!(TapZone::from_position(199.0, 300.0), TapZone::Toggle);
    assert_eq!(TapZone::from_position(200.0, 300.0), TapZone::Next);
    assert_eq!(TapZone::from_position(50.0, 0.0), TapZone::Toggle);
}

/// Drives a long pseudo-random event sequence and checks that the effects
/// never leave more than one driver attached.
#[test]
fn at_most_one_driver_is_ever_attached() {
    let events = [
        ViewerEvent::Tick { elapsed_ms: 50 },
        ViewerEvent::Tick { elapsed_ms: 400 },
        ViewerEvent::Next,
        ViewerEvent::Prev,
        ViewerEvent::TogglePause,
        ViewerEvent::HoldStart,
        ViewerEvent::HoldEnd,
        ViewerEvent::ToggleMenu,
        ViewerEvent::DismissMenu,
        ViewerEvent::SeekStart {
            pointer: pointer(180.0),
        },
        ViewerEvent::SeekEnd,
        ViewerEvent::VideoEnded,
        ViewerEvent::PlaybackRejected,
        ViewerEvent::VideoTimeUpdate { position_ms: 300 },
        ViewerEvent::Tap {
            x: 250.0,
            width: 300.0,
        },
    ];
    let options = ViewerOptions {
        loop_timeline: true,
        ..ViewerOptions::default()
    };

    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut harness = Harness::open(0, options);
    let mut active: i64 = 1;

    for _ in 0..5_000 {
        seed = seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let event = events[(seed >> 33) as usize % events.len()].clone();

        for effect in harness.send(event) {
            match effect {
                Effect::StartTimer { .. } | Effect::AttachVideo { .. } => active += 1,
                Effect::CancelTimer | Effect::DetachVideo => active -= 1,
                _ => {}
            }
            assert!((0..=1).contains(&active), "active drivers: {active}");
        }
        assert_eq!(active, i64::from(harness.state.driver.is_some()));
    }
}
