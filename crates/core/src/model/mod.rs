mod ids;
mod interval;
mod progress;

pub use ids::{IdError, ProgressKey, UserId, VideoId};
pub use interval::{Interval, IntervalError};
pub use progress::{ProgressRecord, ProgressRecordError};
