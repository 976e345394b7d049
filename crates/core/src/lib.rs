#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod progress;
pub mod time;

pub use error::Error;
pub use progress::{Percentage, ProgressReport, completion_percentage, count_as_u64};
pub use time::Clock;
