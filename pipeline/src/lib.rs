//! Orchestration around the external filter and render tools.
//!
//! [`AttributionPipeline`] validates a request, filters the canvas log down to
//! one user, runs the analyzers on the blocking pool and renders a placemap,
//! all while holding a slot of a shared [`Gate`]. [`Scanner`] totals the
//! tracked goal over user logs already on disk.

mod attribution;
pub mod config;
mod errors;
mod gate;
mod keys;
pub mod scan;
pub mod standings;
pub mod tools;
pub mod validate;

pub use crate::attribution::AttributionPipeline;
pub use crate::config::{Config, ToolCommand};
pub use crate::errors::{FilterFailure, PipelineError};
pub use crate::gate::{Gate, GatePass};
pub use crate::keys::{KeyStore, MemoryKeyStore};
pub use crate::scan::{no_progress, Scanner};
pub use crate::standings::{ScoreStore, Standing};
