//! Replays of a user-scoped placement log.
//!
//! Each analyzer has a pure form over an event iterator and a `*_in_log`
//! form over a file path. The path forms never fail: an unreadable log,
//! palette, template or canvas degrades that statistic to zero and is
//! logged at `warn`.

pub mod activity;
pub mod counter;
mod errors;
mod raster;
pub mod survival;
pub mod template;

pub use crate::errors::AnalysisError;
