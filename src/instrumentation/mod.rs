pub mod logger;

pub use logger::{ReviewLog, ReviewLogger};
