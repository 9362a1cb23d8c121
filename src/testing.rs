// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Test doubles for the engine and host seams.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{EvalContext, EvalError, Evaluation, Namespace, PatternEngine, PatternHandle, Value};
use crate::host::{BlockId, DiscoveredBlock, DocumentHost, DocumentId, HostError, SourceRange};
use crate::lock;

/// Counters shared by an engine and the patterns it starts
#[derive(Debug, Default)]
pub(crate) struct PatternLog {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub evaluations: AtomicUsize,
}

impl PatternLog {
    /// Patterns started and not yet stopped
    pub fn live(&self) -> usize {
        self.started.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockPattern {
    log: Arc<PatternLog>,
    stopped: bool,
    pub tempo: Arc<Mutex<Option<f64>>>,
}

impl PatternHandle for MockPattern {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.log.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn set_tempo(&mut self, cps: f64) {
        *lock(&self.tempo) = Some(cps);
    }
}

/// Engine for a toy line language:
///
/// - `let name = value` binds a name
/// - `$name` anywhere reads a binding
/// - a line starting with `!` fails with the rest of the line as the engine message
pub(crate) struct MockEngine {
    pub log: Arc<PatternLog>,
    /// Last tempo set on any pattern
    pub tempo: Arc<Mutex<Option<f64>>>,
    delay: Mutex<Duration>,
    audio_error: Mutex<Option<EvalError>>,
    contexts: Mutex<Vec<EvalContext>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(PatternLog::default()),
            tempo: Arc::new(Mutex::new(None)),
            delay: Mutex::new(Duration::ZERO),
            audio_error: Mutex::new(None),
            contexts: Mutex::new(Vec::new()),
        })
    }

    /// Make every evaluation take `delay`
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// Make the next audio resume fail
    pub fn fail_audio(&self, error: EvalError) {
        *lock(&self.audio_error) = Some(error);
    }

    pub fn evaluations(&self) -> usize {
        self.log.evaluations.load(Ordering::SeqCst)
    }

    pub fn live_patterns(&self) -> usize {
        self.log.live()
    }

    pub fn last_context(&self) -> Option<EvalContext> {
        lock(&self.contexts).last().cloned()
    }
}

#[async_trait]
impl PatternEngine for MockEngine {
    async fn evaluate(&self, code: &str, context: &EvalContext) -> Result<Evaluation, EvalError> {
        self.log.evaluations.fetch_add(1, Ordering::SeqCst);
        lock(&self.contexts).push(context.clone());

        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut bindings = Namespace::new();
        for line in code.lines().map(str::trim) {
            if let Some(message) = line.strip_prefix('!') {
                return Err(EvalError::from_engine_message(message));
            }
            for word in line.split(|c: char| !(c.is_alphanumeric() || c == '$' || c == '_')) {
                if let Some(name) = word.strip_prefix('$') {
                    if !bindings.contains(name) {
                        context.lookup(name)?;
                    }
                }
            }
            if let Some((name, value)) = line.strip_prefix("let ").and_then(|rest| rest.split_once('=')) {
                let value = value.trim();
                let value = match value.parse::<i64>() {
                    Ok(n) => Value::Int(n),
                    Err(_) => Value::String(value.trim_matches('"').to_string()),
                };
                bindings.insert(name.trim(), value);
            }
        }

        self.log.started.fetch_add(1, Ordering::SeqCst);
        let pattern = MockPattern {
            log: Arc::clone(&self.log),
            stopped: false,
            tempo: Arc::clone(&self.tempo),
        };
        Ok(Evaluation::new(Box::new(pattern)).with_bindings(bindings))
    }

    async fn resume_audio(&self) -> Result<(), EvalError> {
        match lock(&self.audio_error).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A write observed by [`RecordingHost`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedWrite {
    pub document: DocumentId,
    pub block: BlockId,
    pub range: SourceRange,
    pub text: String,
}

struct HostBlock {
    document: DocumentId,
    id: BlockId,
    range: SourceRange,
    text: String,
}

/// In-memory host that records every write
#[derive(Default)]
pub(crate) struct RecordingHost {
    blocks: Mutex<Vec<HostBlock>>,
    writes: Mutex<Vec<RecordedWrite>>,
    rejecting: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block; each block gets its own four-line slot
    pub fn add_block(&self, document: &DocumentId, id: &str, text: &str) {
        let mut blocks = lock(&self.blocks);
        let start = blocks.len() * 4 + 1;
        blocks.push(HostBlock {
            document: document.clone(),
            id: BlockId::new(id),
            range: SourceRange::new(start, start + 1),
            text: text.to_string(),
        });
    }

    /// Make a block impossible to locate
    pub fn remove_block(&self, document: &DocumentId, id: &str) {
        lock(&self.blocks).retain(|b| !(&b.document == document && b.id.as_str() == id));
    }

    pub fn range_of(&self, document: &DocumentId, id: &str) -> Option<SourceRange> {
        lock(&self.blocks)
            .iter()
            .find(|b| &b.document == document && b.id.as_str() == id)
            .map(|b| b.range)
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        lock(&self.writes).clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.writes).len()
    }

    /// Writes that targeted one block
    pub fn writes_to(&self, id: &str) -> Vec<String> {
        lock(&self.writes)
            .iter()
            .filter(|w| w.block.as_str() == id)
            .map(|w| w.text.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentHost for RecordingHost {
    async fn discover_blocks(&self, document: &DocumentId) -> Result<Vec<DiscoveredBlock>, HostError> {
        Ok(lock(&self.blocks)
            .iter()
            .filter(|b| &b.document == document)
            .map(|b| DiscoveredBlock {
                id: b.id.clone(),
                text: b.text.clone(),
                range: b.range,
            })
            .collect())
    }

    async fn locate(&self, document: &DocumentId, block: &BlockId) -> Option<SourceRange> {
        lock(&self.blocks)
            .iter()
            .find(|b| &b.document == document && &b.id == block)
            .map(|b| b.range)
    }

    async fn replace_range(
        &self,
        document: &DocumentId,
        block: &BlockId,
        range: SourceRange,
        text: &str,
    ) -> Result<(), HostError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(HostError::Rejected("read-only document".to_string()));
        }

        {
            let mut blocks = lock(&self.blocks);
            let found = blocks
                .iter_mut()
                .find(|b| &b.document == document && &b.id == block && b.range == range);
            let Some(target) = found else {
                return Err(HostError::StaleRange {
                    document: document.clone(),
                    range,
                });
            };
            target.text = text.to_string();
        }
        lock(&self.writes).push(RecordedWrite {
            document: document.clone(),
            block: block.clone(),
            range,
            text: text.to_string(),
        });
        Ok(())
    }
}
