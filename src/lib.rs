// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! blockseq - coordination core for live-editable pattern blocks.
//!
//! Documents contain fenced pattern blocks. Each block can be played,
//! stopped, soloed and edited while it sounds; edits are written back to
//! the document once typing settles. Synthesis itself is delegated to a
//! [`PatternEngine`].

pub mod config;
pub mod engine;
pub mod error;
pub mod governor;
pub mod host;
pub mod livesync;
pub mod playback;
pub mod session;
pub mod timing;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use engine::{EvalContext, EvalError, Evaluation, Namespace, PatternEngine, PatternHandle, Value};
pub use error::{Error, Result};
pub use governor::{GovernorMetrics, ResourceGovernor};
pub use host::{BlockId, DocumentHost, DocumentId, FileHost, HostEvent, SourceRange};
pub use livesync::{FlushMode, FlushOutcome};
pub use playback::{BlockSnapshot, BlockStatus};
pub use session::{Notebook, NotebookRegistry};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
