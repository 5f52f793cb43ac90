//! Survey response aggregation engine.
//!
//! Pure functions over a survey and its responses: nothing here performs
//! I/O or keeps state between calls.

pub mod aggregator;
pub mod metrics;
pub mod summary;

pub use aggregator::*;
pub use metrics::*;
pub use summary::*;
