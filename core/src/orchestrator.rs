//! The run loop: timer ticks, watcher triggers and process liveness decide
//! when a sync pass runs and when the agent stops.

use std::future::Future;
use std::sync::Arc;

use fowsync_watcher::{SaveWatcher, SyncTrigger, TriggerReceiver};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use crate::config::SyncContext;
use crate::engine::{SyncReport, Synchronizer};
use crate::error::{Result, SyncError};
use crate::process::ProcessGate;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Validating the save root and installing the watcher.
    Starting,

    /// Serving triggers.
    Running,

    /// Tearing down the watcher and running the final pass.
    Stopping,

    /// Done.
    Terminated,
}

/// Why the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The game process is no longer running.
    ProcessExited,

    /// The shutdown signal fired.
    Interrupted,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Passes completed, including the final one.
    pub passes: usize,

    /// Why the loop ended.
    pub reason: StopReason,

    /// Report of the final pass.
    pub final_report: Option<SyncReport>,
}

/// Owns the run loop and the mandatory final pass.
pub struct Orchestrator {
    ctx: Arc<SyncContext>,
    gate: Arc<dyn ProcessGate>,
    state: RunState,
    passes: usize,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(ctx: Arc<SyncContext>, gate: Arc<dyn ProcessGate>) -> Self {
        Self {
            ctx,
            gate,
            state: RunState::Starting,
            passes: 0,
        }
    }

    /// Run until the game exits or `shutdown` completes, then run one final
    /// pass.
    ///
    /// Only a missing save root is an error; everything that goes wrong
    /// inside a pass is logged and retried on the next trigger.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        self.transition(RunState::Starting);

        let save_root = dunce::canonicalize(&self.ctx.save_root)
            .ok()
            .filter(|root| root.is_dir())
            .ok_or_else(|| {
                SyncError::SaveRootNotFound(self.ctx.save_root.display().to_string())
            })?;
        let ctx = Arc::new((*self.ctx).clone().with_save_root(save_root));
        let synchronizer = Arc::new(Synchronizer::new(Arc::clone(&ctx)));

        let (mut watcher, mut triggers) = SaveWatcher::new(ctx.watch_config());
        if let Err(e) = watcher.start() {
            warn!(
                "Failed to watch {}: {e}; continuing with periodic sync only",
                ctx.save_root.display()
            );
        }

        info!("FOW Sync active, monitoring: {}", ctx.save_root.display());
        self.transition(RunState::Running);
        let reason = self.run_loop(&ctx, &synchronizer, &mut triggers, shutdown).await;

        self.transition(RunState::Stopping);
        watcher.stop();
        drop(watcher);
        drain(&mut triggers, &ctx).await;

        info!("Performing final sync...");
        let final_report = match self.sync(&synchronizer).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("{e}");
                None
            }
        };

        self.transition(RunState::Terminated);
        info!("Sync complete ({} pass(es))", self.passes);

        Ok(RunSummary {
            passes: self.passes,
            reason,
            final_report,
        })
    }

    async fn run_loop<F>(
        &mut self,
        ctx: &SyncContext,
        synchronizer: &Arc<Synchronizer>,
        triggers: &mut TriggerReceiver,
        shutdown: F,
    ) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if !self.target_running().await {
            info!("{} is not running", ctx.process_name);
            return StopReason::ProcessExited;
        }

        let mut ticker = interval_at(Instant::now() + ctx.interval, ctx.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut settle_at: Option<Instant> = None;
        let mut events_open = true;

        loop {
            let deadline = settle_at;

            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Interrupt received, stopping");
                    return StopReason::Interrupted;
                }

                _ = ticker.tick() => {
                    if !self.target_running().await {
                        info!("{} is no longer running", ctx.process_name);
                        return StopReason::ProcessExited;
                    }
                    debug!("Periodic sync");
                    self.sync_logged(synchronizer).await;
                }

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    settle_at = None;
                    self.sync_logged(synchronizer).await;
                }

                trigger = triggers.recv(), if events_open => match trigger {
                    Some(SyncTrigger::PlayerModified { path }) => {
                        info!("Player data modified ({}), triggering sync", path.display());
                        self.sync_logged(synchronizer).await;
                    }
                    Some(SyncTrigger::NewCharacter { path }) => {
                        info!(
                            "New character detected: {}",
                            path.file_name().unwrap_or(path.as_os_str()).to_string_lossy()
                        );
                        // Each new folder restarts the settle window.
                        settle_at = Some(Instant::now() + ctx.settle_delay);
                    }
                    None => {
                        warn!("Event source closed, continuing with periodic sync only");
                        events_open = false;
                    }
                },
            }
        }
    }

    /// Query the gate on the blocking pool; a process table refresh can take
    /// a while.
    async fn target_running(&self) -> bool {
        let gate = Arc::clone(&self.gate);
        match tokio::task::spawn_blocking(move || gate.is_target_running()).await {
            Ok(running) => running,
            Err(e) => {
                error!("Process check failed: {e}");
                false
            }
        }
    }

    /// Run one pass on the blocking pool and wait for it.
    async fn sync(&mut self, synchronizer: &Arc<Synchronizer>) -> Result<SyncReport> {
        let synchronizer = Arc::clone(synchronizer);
        let report = tokio::task::spawn_blocking(move || synchronizer.run_pass())
            .await
            .map_err(|e| SyncError::PassFailed(e.to_string()))?;

        self.passes += 1;
        Ok(report)
    }

    async fn sync_logged(&mut self, synchronizer: &Arc<Synchronizer>) {
        if let Err(e) = self.sync(synchronizer).await {
            error!("{e}");
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!("Orchestrator {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Wait, bounded by the stop grace, for the watcher's event thread to let go
/// of its sender. Triggers still queued are discarded; the final pass covers
/// whatever they asked for.
async fn drain(triggers: &mut TriggerReceiver, ctx: &SyncContext) {
    let drained = timeout(ctx.stop_grace, async {
        let mut count = 0usize;
        while triggers.recv().await.is_some() {
            count += 1;
        }
        count
    })
    .await;

    match drained {
        Ok(count) => debug!("Drained {count} pending trigger(s)"),
        Err(_) => warn!("Timed out waiting for pending file events"),
    }
}
