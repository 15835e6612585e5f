pub mod errors;
pub mod events;
pub mod id;
pub mod subscription;
pub mod types;

pub use errors::{ConfigError, EncoreError};
pub use events::{
    AppEvents, BusPayload, ChatBubble, ChatTabOpened, StreakChange, StreakUpdate, TempNotification,
    Topic, Variant,
};
pub use id::{new_id, now_millis};
pub use subscription::Subscription;
pub use types::{CreatedAt, NotificationKind, NotificationRecord, StreakState, UserId};

pub type Result<T> = std::result::Result<T, EncoreError>;
