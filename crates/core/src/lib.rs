#![forbid(unsafe_code)]

pub mod engine;
pub mod model;
pub mod time;

pub use engine::{EngineError, MergePolicy, ProgressUpdate};
pub use time::Clock;
