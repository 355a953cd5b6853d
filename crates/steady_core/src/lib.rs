pub mod clock;
pub mod date_key;
pub mod engine;
pub mod error;
pub mod rollover;
pub mod rotation;
pub mod service;
pub mod state;
pub mod stats;
pub mod store;
pub mod task;

pub use crate::date_key::DateKey;
pub use crate::error::StoreError;
pub use crate::service::{TrackerService, TrackerServiceBuilder};
pub use crate::task::{Completion, Task, TaskId};
