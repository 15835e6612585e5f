//! Cross-device playback state.

mod types;
mod watcher;

pub use types::{DeviceInfo, PlaybackState, RepeatMode};
pub use watcher::PlaybackWatcher;
