// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-document notebook of block controllers.
//!
//! A notebook owns the controllers of one document, their shared
//! namespace and their timers. All state sits behind one mutex that is
//! only held between suspension points, so arbitration and counter
//! updates are never observed half done.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, trace, warn};

use crate::config::Settings;
use crate::engine::{EvalContext, EvalError, Evaluation, Namespace, PatternEngine, PatternHandle};
use crate::error::{Error, Result};
use crate::governor::{ResourceGovernor, SessionFootprint};
use crate::host::{BlockId, DocumentHost, DocumentId};
use crate::livesync::{check_guard, FlushMode, FlushOutcome, SyncEngine, SyncError};
use crate::lock;
use crate::playback::{arbitrate, BlockController, BlockSnapshot, BlockStatus, Generation};
use crate::timing::{TimerKind, TimerService};

struct NotebookState {
    blocks: HashMap<BlockId, BlockController>,
    /// Display order
    order: Vec<BlockId>,
    namespace: Namespace,
    settings: Settings,
    tempo_cps: f64,
    /// Set once a tempo was chosen explicitly; settings reloads then leave it alone
    tempo_overridden: bool,
    /// Last token handed to any controller of this notebook
    generation: Generation,
    destroyed: bool,
}

impl NotebookState {
    /// Issue a token no controller of this notebook has seen before
    fn next_generation(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.generation
    }

    fn block(&self, document: &DocumentId, id: &BlockId) -> Result<&BlockController> {
        if self.destroyed {
            return Err(Error::SessionDestroyed(document.clone()));
        }
        self.blocks.get(id).ok_or_else(|| Error::UnknownBlock {
            document: document.clone(),
            block: id.clone(),
        })
    }

    fn block_mut(&mut self, document: &DocumentId, id: &BlockId) -> Result<&mut BlockController> {
        if self.destroyed {
            return Err(Error::SessionDestroyed(document.clone()));
        }
        self.blocks.get_mut(id).ok_or_else(|| Error::UnknownBlock {
            document: document.clone(),
            block: id.clone(),
        })
    }

    fn context(&self, document: &DocumentId, block: &BlockId) -> EvalContext {
        EvalContext {
            document: document.clone(),
            block: block.clone(),
            namespace: self.namespace.clone(),
            tempo_cps: self.tempo_cps,
        }
    }
}

/// Session for one live document
pub struct Notebook {
    document: DocumentId,
    state: Mutex<NotebookState>,
    engine: Arc<dyn PatternEngine>,
    sync: SyncEngine,
    governor: Arc<ResourceGovernor>,
    timers: TimerService,
    /// Handle given to timer tasks
    this: Weak<Notebook>,
}

impl Notebook {
    /// Create an empty notebook
    pub fn new(
        document: DocumentId,
        engine: Arc<dyn PatternEngine>,
        host: Arc<dyn DocumentHost>,
        governor: Arc<ResourceGovernor>,
        settings: Settings,
    ) -> Arc<Self> {
        let tempo_cps = settings.default_cps();
        Arc::new_cyclic(|this| Self {
            document,
            state: Mutex::new(NotebookState {
                blocks: HashMap::new(),
                order: Vec::new(),
                namespace: Namespace::new(),
                settings,
                tempo_cps,
                tempo_overridden: false,
                generation: Generation::default(),
                destroyed: false,
            }),
            engine,
            sync: SyncEngine::new(host),
            governor,
            timers: TimerService::new(),
            this: this.clone(),
        })
    }

    /// Get the document id
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Check whether the notebook has been destroyed
    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Register a block, leaving an existing controller untouched.
    ///
    /// Returns true if a controller was created.
    pub fn ensure_block(&self, id: BlockId, text: impl Into<String>) -> Result<bool> {
        let mut state = lock(&self.state);
        if state.destroyed {
            return Err(Error::SessionDestroyed(self.document.clone()));
        }
        if state.blocks.contains_key(&id) {
            return Ok(false);
        }

        debug!(document = %self.document, block = %id, "Registering block");
        state
            .blocks
            .insert(id.clone(), BlockController::new(self.document.clone(), id.clone(), text));
        state.order.push(id);
        Ok(true)
    }

    /// Tear down one block: stop it, cancel its timers and save unsynced text
    pub async fn remove_block(&self, id: &BlockId) -> Result<()> {
        let unsynced = {
            let mut state = lock(&self.state);
            state.block(&self.document, id)?;

            self.timers.cancel_block(id);
            state.order.retain(|b| b != id);
            let Some(mut block) = state.blocks.remove(id) else {
                return Ok(());
            };
            if block.stop() {
                self.governor.pattern_stopped();
            }
            debug!(document = %self.document, block = %id, "Removed block");
            check_guard(&block, FlushMode::Forced)
                .ok()
                .map(|_| block.text().to_string())
        };

        if let Some(text) = unsynced {
            self.write_detached(id, &text).await;
        }
        Ok(())
    }

    /// Start playing a block.
    ///
    /// Does nothing if the block is already loading or playing. Other
    /// blocks are preempted before the engine is called; evaluation
    /// failures are recorded on the block, not returned.
    pub async fn request_play(&self, id: &BlockId) -> Result<()> {
        let (generation, code, context) = {
            let mut state = lock(&self.state);
            if state.block(&self.document, id)?.is_engaged() {
                trace!(document = %self.document, block = %id, "Play ignored, already engaged");
                return Ok(());
            }

            self.preempt(&mut state, id);
            let generation = state.next_generation();
            let block = state.block_mut(&self.document, id)?;
            block.begin_loading(generation);
            let code = block.text().to_string();
            (generation, code, state.context(&self.document, id))
        };

        debug!(document = %self.document, block = %id, %generation, "Loading");
        let result = match self.engine.resume_audio().await {
            Ok(()) => self.engine.evaluate(&code, &context).await,
            Err(e) => Err(e),
        };
        self.complete_evaluation(id, generation, result);
        Ok(())
    }

    /// Stop a block, then try the write-back its playback may have held up.
    ///
    /// Stopping a block that is neither loading nor playing does nothing.
    pub async fn request_stop(&self, id: &BlockId) -> Result<()> {
        {
            let mut state = lock(&self.state);
            let block = state.block_mut(&self.document, id)?;
            if !block.is_engaged() {
                trace!(document = %self.document, block = %id, "Stop ignored, not engaged");
                return Ok(());
            }
            self.timers.cancel(&TimerKind::AutoEvaluate(id.clone()));
            if block.stop() {
                self.governor.pattern_stopped();
                info!(document = %self.document, block = %id, "Stopped");
            }
        }

        self.flush(id, FlushMode::Guarded).await?;
        Ok(())
    }

    /// Set the solo flag.
    ///
    /// Turning solo on for an engaged block stops every other block at
    /// once. Turning it off never stops the block itself.
    pub fn set_solo(&self, id: &BlockId, solo: bool) -> Result<()> {
        let mut state = lock(&self.state);
        let block = state.block_mut(&self.document, id)?;
        if !block.set_solo(solo) {
            return Ok(());
        }

        debug!(document = %self.document, block = %id, solo, "Solo changed");
        if solo && block.is_engaged() {
            self.preempt(&mut state, id);
        }
        Ok(())
    }

    /// Flip the solo flag and return the new value
    pub fn toggle_solo(&self, id: &BlockId) -> Result<bool> {
        let solo = !lock(&self.state).block(&self.document, id)?.is_solo();
        self.set_solo(id, solo)?;
        Ok(solo)
    }

    /// Record an edit.
    ///
    /// Restarts the typing-settle and propose-write timers and, for a
    /// playing block, the debounced re-evaluation.
    pub fn on_live_edit(&self, id: &BlockId, text: impl Into<String>) -> Result<()> {
        let (settings, reevaluate) = {
            let mut state = lock(&self.state);
            let block = state.block_mut(&self.document, id)?;
            block.set_text(text);
            block.set_typing(true);
            let playing = block.is_playing();
            let reevaluate = playing && state.settings.evaluation.auto_evaluate_enabled;
            (state.settings.clone(), reevaluate)
        };

        let this = self.this.clone();
        let block = id.clone();
        self.timers
            .schedule(TimerKind::TypingSettle(id.clone()), settings.typing_settle_delay(), async move {
                if let Some(notebook) = this.upgrade() {
                    notebook.typing_settled(&block).await;
                }
            });

        let this = self.this.clone();
        let block = id.clone();
        self.timers
            .schedule(TimerKind::ProposeWrite(id.clone()), settings.propose_write_delay(), async move {
                if let Some(notebook) = this.upgrade() {
                    notebook.propose_write(&block).await;
                }
            });

        if reevaluate {
            let this = self.this.clone();
            let block = id.clone();
            self.timers
                .schedule(TimerKind::AutoEvaluate(id.clone()), settings.auto_evaluate_delay(), async move {
                    if let Some(notebook) = this.upgrade() {
                        notebook.reevaluate(&block).await;
                    }
                });
        }
        Ok(())
    }

    /// Record focus entering or leaving a block. Losing focus forces a save.
    pub async fn focus_changed(&self, id: &BlockId, focused: bool) -> Result<Option<FlushOutcome>> {
        lock(&self.state).block_mut(&self.document, id)?.set_focused(focused);
        if focused {
            return Ok(None);
        }
        self.flush(id, FlushMode::Forced).await.map(Some)
    }

    /// Write a block's text back if the guard allows it
    pub async fn flush(&self, id: &BlockId, mode: FlushMode) -> Result<FlushOutcome> {
        let text = {
            let mut state = lock(&self.state);
            let block = state.block_mut(&self.document, id)?;
            if let Err(reason) = check_guard(block, mode) {
                trace!(document = %self.document, block = %id, %reason, "Flush blocked");
                return Ok(FlushOutcome::Blocked(reason));
            }
            block.set_write_in_flight(true);
            block.text().to_string()
        };

        let result = self.sync.write_back(&self.document, id, &text).await;

        let written = result.is_ok();
        {
            let mut state = lock(&self.state);
            if let Some(block) = state.blocks.get_mut(id) {
                block.set_write_in_flight(false);
                if written {
                    block.mark_synced(text);
                }
            }
        }

        match result {
            Ok(()) => {
                debug!(document = %self.document, block = %id, ?mode, "Block written back");
                Ok(FlushOutcome::Written)
            }
            Err(e) => {
                self.log_sync_error(&e);
                Ok(FlushOutcome::Abandoned)
            }
        }
    }

    /// Evaluate `code` against the shared namespace and merge its bindings.
    ///
    /// The caller owns the returned pattern. Block state is not touched.
    pub async fn evaluate_block(&self, id: &BlockId, code: &str) -> std::result::Result<Box<dyn PatternHandle>, EvalError> {
        let context = lock(&self.state).context(&self.document, id);
        let Evaluation { mut pattern, bindings } = self.engine.evaluate(code, &context).await?;

        let mut state = lock(&self.state);
        if state.destroyed {
            pattern.stop();
            return Err(EvalError::Unknown {
                message: format!("notebook for {} was destroyed during evaluation", self.document),
            });
        }
        self.merge_bindings(&mut state, id, bindings);
        Ok(pattern)
    }

    /// Stop every block without destroying the notebook.
    ///
    /// Returns the number of patterns stopped.
    pub fn stop_all(&self) -> usize {
        let mut state = lock(&self.state);
        let mut stopped = 0;
        for (id, block) in state.blocks.iter_mut() {
            self.timers.cancel(&TimerKind::AutoEvaluate(id.clone()));
            if block.stop() {
                self.governor.pattern_stopped();
                stopped += 1;
            }
        }
        if stopped > 0 {
            info!(document = %self.document, stopped, "Stopped all blocks");
        }
        stopped
    }

    /// Apply a tempo to every live pattern and to later starts.
    ///
    /// From then on a reloaded default tempo no longer applies.
    pub fn set_tempo(&self, cps: f64) {
        let mut state = lock(&self.state);
        state.tempo_overridden = true;
        Self::retune(&mut state, cps);
    }

    /// Get the current tempo in cycles per second
    pub fn tempo(&self) -> f64 {
        lock(&self.state).tempo_cps
    }

    /// Replace settings. Pending timers keep their original delays.
    ///
    /// The default tempo is followed until [`Notebook::set_tempo`] is called.
    pub fn apply_settings(&self, settings: &Settings) {
        let mut state = lock(&self.state);
        state.settings = settings.clone();
        if !state.tempo_overridden {
            Self::retune(&mut state, settings.default_cps());
        }
    }

    /// Stop everything, save unsynced text and drop all state. Idempotent.
    pub async fn destroy(&self) {
        let unsynced: Vec<(BlockId, String)> = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            self.timers.cancel_all();

            let mut unsynced = Vec::new();
            let order = std::mem::take(&mut state.order);
            for id in order {
                let Some(mut block) = state.blocks.remove(&id) else {
                    continue;
                };
                if block.stop() {
                    self.governor.pattern_stopped();
                }
                if check_guard(&block, FlushMode::Forced).is_ok() {
                    unsynced.push((id, block.text().to_string()));
                }
            }
            state.blocks.clear();
            state.namespace.clear();
            unsynced
        };

        info!(document = %self.document, unsynced = unsynced.len(), "Destroying notebook");
        for (id, text) in unsynced {
            self.write_detached(&id, &text).await;
        }
    }

    /// Get a block's lifecycle status
    pub fn status(&self, id: &BlockId) -> Result<BlockStatus> {
        Ok(lock(&self.state).block(&self.document, id)?.status())
    }

    /// Read-only view of one block
    pub fn snapshot(&self, id: &BlockId) -> Result<BlockSnapshot> {
        Ok(lock(&self.state).block(&self.document, id)?.snapshot())
    }

    /// Read-only views of all blocks in display order
    pub fn blocks(&self) -> Vec<BlockSnapshot> {
        let state = lock(&self.state);
        state
            .order
            .iter()
            .filter_map(|id| state.blocks.get(id))
            .map(BlockController::snapshot)
            .collect()
    }

    /// Get a block's current text
    pub fn text(&self, id: &BlockId) -> Result<String> {
        Ok(lock(&self.state).block(&self.document, id)?.text().to_string())
    }

    /// Snapshot of the shared namespace
    pub fn namespace(&self) -> Namespace {
        lock(&self.state).namespace.clone()
    }

    /// Number of blocks holding a live pattern
    pub fn playing_count(&self) -> usize {
        lock(&self.state).blocks.values().filter(|b| b.is_playing()).count()
    }

    /// What this notebook contributes to the governor estimate
    pub fn footprint(&self) -> SessionFootprint {
        let state = lock(&self.state);
        SessionFootprint {
            document: self.document.clone(),
            playing: state.blocks.values().filter(|b| b.is_playing()).count(),
            bindings: state.namespace.len(),
        }
    }

    /// Check that no engaged soloist shares the stage
    pub fn exclusivity_holds(&self) -> bool {
        crate::playback::exclusivity_holds(lock(&self.state).blocks.values())
    }

    fn retune(state: &mut NotebookState, cps: f64) {
        state.tempo_cps = cps;
        for block in state.blocks.values_mut() {
            block.set_tempo(cps);
        }
    }

    /// Merge an evaluation's bindings; later completions overwrite earlier ones
    fn merge_bindings(&self, state: &mut NotebookState, id: &BlockId, bindings: Namespace) -> usize {
        let changed = state.namespace.merge(bindings);
        trace!(document = %self.document, block = %id, ?changed, "Merged bindings");
        changed.len()
    }

    /// Stop whatever the arbitration says must make way for `id`
    fn preempt(&self, state: &mut NotebookState, id: &BlockId) {
        let Some(requester) = state.blocks.get(id) else {
            return;
        };
        let decision = arbitrate(requester, state.blocks.values());
        if !decision.preempts() {
            return;
        }

        info!(document = %self.document, block = %id, ?decision, "Preempting");
        for target in decision.targets() {
            self.timers.cancel(&TimerKind::AutoEvaluate(target.clone()));
            if let Some(block) = state.blocks.get_mut(target) {
                if block.stop() {
                    self.governor.pattern_stopped();
                }
            }
        }
    }

    /// Apply an engine result unless a later request superseded it
    fn complete_evaluation(&self, id: &BlockId, generation: Generation, result: std::result::Result<Evaluation, EvalError>) {
        let mut state = lock(&self.state);
        let current = !state.destroyed && state.blocks.get(id).is_some_and(|b| b.is_current(generation));
        if !current {
            if let Ok(mut evaluation) = result {
                evaluation.pattern.stop();
            }
            debug!(document = %self.document, block = %id, %generation, "Discarded stale evaluation");
            return;
        }

        match result {
            Ok(evaluation) => {
                // Solo may have changed while loading
                self.preempt(&mut state, id);

                let bound = self.merge_bindings(&mut state, id, evaluation.bindings);
                if let Some(block) = state.blocks.get_mut(id) {
                    if block.install(evaluation.pattern) {
                        self.governor.pattern_started();
                    }
                }
                info!(document = %self.document, block = %id, %generation, bound, "Playing");
            }
            Err(error) => {
                if let Some(block) = state.blocks.get_mut(id) {
                    let kept = block.is_playing();
                    block.fail(error.clone());
                    warn!(
                        document = %self.document,
                        block = %id,
                        kind = error.kind().label(),
                        kept_previous = kept,
                        "Evaluation failed: {}",
                        error
                    );
                }
            }
        }
    }

    /// Debounced re-evaluation of a playing block with its current text
    async fn reevaluate(&self, id: &BlockId) {
        let (generation, code, context) = {
            let mut state = lock(&self.state);
            match state.blocks.get(id) {
                Some(block) if !state.destroyed && block.is_playing() => {}
                _ => return,
            }

            self.preempt(&mut state, id);
            let generation = state.next_generation();
            let Some(block) = state.blocks.get_mut(id) else {
                return;
            };
            block.begin_loading(generation);
            let code = block.text().to_string();
            (generation, code, state.context(&self.document, id))
        };

        debug!(document = %self.document, block = %id, %generation, "Re-evaluating after edit");
        let result = self.engine.evaluate(&code, &context).await;
        self.complete_evaluation(id, generation, result);
    }

    /// Propose-write timer: mark the edit as pending a write
    async fn propose_write(&self, id: &BlockId) {
        let typing = {
            let mut state = lock(&self.state);
            let Some(block) = state.blocks.get_mut(id) else {
                return;
            };
            if !block.is_dirty() {
                return;
            }
            block.set_pending_write(true);
            block.is_typing()
        };

        // Settle already fired, nothing else will flush this edit
        if !typing {
            let _ = self.flush(id, FlushMode::Guarded).await;
        }
    }

    /// Typing-settle timer: edits went quiet, try the pending write
    async fn typing_settled(&self, id: &BlockId) {
        let pending = {
            let mut state = lock(&self.state);
            let Some(block) = state.blocks.get_mut(id) else {
                return;
            };
            block.set_typing(false);
            block.has_pending_write()
        };

        if pending {
            let _ = self.flush(id, FlushMode::Guarded).await;
        }
    }

    /// Last-chance write for a controller that no longer exists
    async fn write_detached(&self, id: &BlockId, text: &str) {
        match self.sync.write_back(&self.document, id, text).await {
            Ok(()) => debug!(document = %self.document, block = %id, "Saved block on teardown"),
            Err(e) => self.log_sync_error(&e),
        }
    }

    fn log_sync_error(&self, error: &SyncError) {
        match error {
            SyncError::InvalidLocator(block) => {
                debug!(document = %self.document, block = %block, "Write-back abandoned, block moved");
            }
            SyncError::Host { block, .. } => {
                warn!(document = %self.document, block = %block, "Write-back abandoned: {}", error);
            }
        }
    }
}

impl std::fmt::Debug for Notebook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notebook")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
