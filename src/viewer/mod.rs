pub mod controller;
pub mod state;
pub mod view;

pub use controller::{DriverCounts, ViewerController, ViewerHost};
pub use state::{
    transition, Effect, Key, Phase, SeekPointer, TapZone, Transition, ViewerEvent, ViewerOptions,
    ViewerState,
};
pub use view::ViewerSnapshot;
