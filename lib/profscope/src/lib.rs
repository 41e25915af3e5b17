//! On-demand profiling of the running process.
//!
//! A [CaptureController](capture::CaptureController) records CPU or heap profiles and stores them
//! in a [ProfileCache](cache::ProfileCache) under a name derived from the capture time. Cached
//! profiles are turned into reports with [make_report](report::make_report).
//!
//! ```
//! use profscope::cache::ProfileCache;
//! use profscope::model::ProfileBuilder;
//! use std::sync::Arc;
//!
//! let cache = ProfileCache::default();
//! cache.insert("2024-01-01T00:00:00-5Seconds-cpu", Arc::new(ProfileBuilder::new(vec![]).build()));
//! let (name, _) = cache.most_recent().unwrap();
//! assert_eq!(name, "2024-01-01T00:00:00-5Seconds-cpu");
//! ```

pub mod cache;
pub mod capture;
pub mod config;
mod duration;
pub mod error;
pub mod report;

pub use duration::parse_duration;

pub mod model {
    pub use profscope_model::*;
}

pub mod sampling {
    pub use profscope_capture::*;
}

pub mod reporting {
    pub use profscope_report::*;
}
