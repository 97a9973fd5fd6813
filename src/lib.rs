pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod rollover;
pub mod roster;
pub mod storage;
pub mod worker;

#[cfg(feature = "desktop")]
pub mod desktop;

pub use clock::{BusinessCalendar, Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{ConfigError, RolloverError, StoreError};
pub use keys::{Records, StorageKeys};
pub use rollover::{DailyRollover, RolloverOutcome, RolloverSummary};
pub use storage::{FileStore, KeyValueStore, MemoryStore, WriteBatch};
pub use worker::{BookingState, BookingStatus, Worker};
