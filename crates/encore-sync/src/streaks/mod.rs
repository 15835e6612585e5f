//! Friend streaks: live updates, REST refresh and user-facing signals.

mod refresh;
mod tracker;
mod watcher;

pub use refresh::{HttpStreakSource, StreakDto, StreakSource, StreakSync};
pub use tracker::{StreakSignal, StreakStatus, StreakTracker, UpdateSource};
pub use watcher::{StreakPayload, StreakWatcher};
