// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pattern evaluation engine interface.
//!
//! Synthesis, sample loading and audio-context plumbing all belong to the
//! engine. The core only evaluates code, stops patterns and sets their
//! tempo, through the [`PatternEngine`] and [`PatternHandle`] traits.

pub mod error;
pub mod namespace;

pub use error::{EvalError, EvalErrorKind, SourceLocation};
pub use namespace::{Namespace, Value};

use std::fmt;

use async_trait::async_trait;

use crate::host::{BlockId, DocumentId};

/// Handle to a pattern started by the engine
pub trait PatternHandle: Send {
    /// Stop the pattern. Must be safe to call more than once.
    fn stop(&mut self);

    /// Set tempo in cycles per second
    fn set_tempo(&mut self, cps: f64);
}

/// Explicit context passed into every evaluation
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Document the block lives in
    pub document: DocumentId,
    /// Block being evaluated
    pub block: BlockId,
    /// Snapshot of the shared namespace
    pub namespace: Namespace,
    /// Tempo in cycles per second
    pub tempo_cps: f64,
}

impl EvalContext {
    /// Resolve a name from the shared namespace
    pub fn lookup(&self, name: &str) -> Result<&Value, EvalError> {
        self.namespace.lookup(name)
    }
}

/// Result of a successful evaluation
pub struct Evaluation {
    /// The started pattern
    pub pattern: Box<dyn PatternHandle>,
    /// Names bound by the evaluated code
    pub bindings: Namespace,
}

impl Evaluation {
    /// Create an evaluation that binds nothing
    pub fn new(pattern: Box<dyn PatternHandle>) -> Self {
        Self {
            pattern,
            bindings: Namespace::new(),
        }
    }

    /// Add a binding
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name, value);
        self
    }

    /// Replace all bindings
    pub fn with_bindings(mut self, bindings: Namespace) -> Self {
        self.bindings = bindings;
        self
    }
}

impl fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluation")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Trait for pattern evaluation engines.
///
/// `evaluate` may suspend for as long as it likes; the caller guards
/// against stale results itself.
#[async_trait]
pub trait PatternEngine: Send + Sync {
    /// Evaluate `code` and start the resulting pattern
    async fn evaluate(&self, code: &str, context: &EvalContext) -> Result<Evaluation, EvalError>;

    /// Resume the audio context before playback
    async fn resume_audio(&self) -> Result<(), EvalError> {
        Ok(())
    }
}
