// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Named, cancellable delayed callbacks.
//!
//! Each timer is keyed by a [`TimerKind`]. Scheduling a kind that is
//! already pending replaces it, which is what turns a burst of edits into
//! a single debounced action.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::host::BlockId;
use crate::lock;

/// Purpose of a timer; at most one is pending per kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Clears the typing flag once edits go quiet
    TypingSettle(BlockId),
    /// Marks an edited block as having a write to propose
    ProposeWrite(BlockId),
    /// Debounced re-evaluation of a playing block
    AutoEvaluate(BlockId),
    /// Periodic resource cleanup
    CleanupInterval,
}

impl TimerKind {
    /// Block this timer belongs to, if any
    pub fn block(&self) -> Option<&BlockId> {
        match self {
            TimerKind::TypingSettle(id) | TimerKind::ProposeWrite(id) | TimerKind::AutoEvaluate(id) => Some(id),
            TimerKind::CleanupInterval => None,
        }
    }
}

struct PendingTimer {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// Timer registry backed by tokio tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Default)]
pub struct TimerService {
    pending: Arc<Mutex<HashMap<TimerKind, PendingTimer>>>,
    next_ticket: Arc<AtomicU64>,
}

impl TimerService {
    /// Create an empty timer service
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, replacing any pending timer of the same kind
    pub fn schedule<F>(&self, kind: TimerKind, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let key = kind.clone();

        // Hold the lock across spawn so the task cannot deregister before it is registered
        let mut timers = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut timers = lock(&pending);
                if timers.get(&key).map(|t| t.ticket) == Some(ticket) {
                    timers.remove(&key);
                    true
                } else {
                    false
                }
            };
            // Superseded or cancelled while waiting for the lock
            if current {
                task.await;
            }
        });

        if let Some(previous) = timers.insert(kind, PendingTimer { ticket, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel a pending timer. Returns true if one was pending.
    pub fn cancel(&self, kind: &TimerKind) -> bool {
        match lock(&self.pending).remove(kind) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer belonging to a block
    pub fn cancel_block(&self, block: &BlockId) {
        lock(&self.pending).retain(|kind, timer| {
            if kind.block() == Some(block) {
                timer.handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Cancel all pending timers
    pub fn cancel_all(&self) {
        for (_, timer) in lock(&self.pending).drain() {
            timer.handle.abort();
        }
    }

    /// Check whether a timer of this kind is pending
    pub fn is_pending(&self, kind: &TimerKind) -> bool {
        lock(&self.pending).contains_key(kind)
    }

    /// Number of pending timers
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}
