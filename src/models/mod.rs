pub mod media;
pub mod story;
pub mod timeline;
pub mod view_state;

pub use media::{MediaItem, MediaKind, DEFAULT_IMAGE_DURATION_MS};
pub use story::{StoryRecord, UserId, UserProfile, FALLBACK_AVATAR, FALLBACK_USERNAME};
pub use timeline::{StoryPosition, TimelineEntry};
pub use view_state::{PersistedViewState, ViewState};
