use chrono::{DateTime, Duration, Utc};

use crate::models::{MediaItem, StoryRecord, UserId, UserProfile};

/// Static users and their stories, built once per session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub users: Vec<UserProfile>,
    pub records: Vec<StoryRecord>,
}

impl Catalog {
    pub fn new(users: Vec<UserProfile>, records: Vec<StoryRecord>) -> Self {
        Self { users, records }
    }

    /// The built-in demo data, with story times placed relative to `now`.
    pub fn demo(now: DateTime<Utc>) -> Self {
        let users = vec![
            profile(1, "friendlythug52ngg", "/avatars/friendly-thug-52-ngg.png"),
            profile(2, "babymelo", "/avatars/baby-melo.jpg"),
            profile(3, "kai4ngel", "/avatars/kai-angel.png"),
            profile(4, "pepelnahudi", "/avatars/pepel-nahudi.png"),
        ];

        let records = vec![
            StoryRecord::new(
                1,
                now - Duration::minutes(12),
                vec![
                    MediaItem::image("/stories/friendlythug/1.jpg"),
                    MediaItem::video("/stories/friendlythug/2.mp4"),
                ],
            ),
            StoryRecord::new(
                2,
                now - Duration::hours(2),
                vec![MediaItem::image_for("/stories/babymelo/1.jpg", 7_000)],
            ),
            StoryRecord::new(
                3,
                now - Duration::minutes(40),
                vec![
                    MediaItem::image("/stories/kai4ngel/1.jpg"),
                    MediaItem::image("/stories/kai4ngel/2.jpg"),
                    MediaItem::video("/stories/kai4ngel/3.mp4"),
                ],
            ),
            StoryRecord::new(
                4,
                now - Duration::hours(5),
                vec![MediaItem::video("/stories/pepelnahudi/1.mp4")],
            ),
        ];

        Self { users, records }
    }

    /// Resolves display fields, falling back to a placeholder for unknown users.
    pub fn profile(&self, user_id: UserId) -> UserProfile {
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .cloned()
            .unwrap_or_else(|| UserProfile::placeholder(user_id))
    }
}

fn profile(id: UserId, username: &str, avatar: &str) -> UserProfile {
    UserProfile {
        id,
        username: username.into(),
        avatar: avatar.into(),
    }
}
