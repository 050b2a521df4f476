//! # Fog-of-War Sync Core
//!
//! Keeps one Grim Dawn exploration-state file (`map.fow`) identical across
//! every character and every difficulty tier.
//!
//! - **Source selection**: the largest `.fow` file under the save root wins
//! - **Fan-out**: it is copied into `levels_world001.map/<tier>/map.fow` of
//!   every character folder
//! - **Scheduling**: periodic ticks, save-file events and the game's process
//!   lifetime decide when a pass runs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  SaveWatcher ──► SyncTrigger ─┐                                 │
//! │  interval tick ───────────────┼──► Synchronizer::run_pass       │
//! │  ProcessGate ──► stop         │       │                         │
//! │                               │       ▼                         │
//! │                               │  SourceLocator ──► SyncEngine   │
//! │                               │                       │         │
//! │                               │                       ▼         │
//! │                               │               TargetEnumerator  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fowsync_core::{FowSyncConfig, Orchestrator, SyncContext, SystemProcessGate};
//!
//! let config = FowSyncConfig::load("gdfowsync.toml")?;
//! let ctx = Arc::new(SyncContext::from_config(&config)?);
//! let gate = Arc::new(SystemProcessGate::new(&ctx.process_name));
//!
//! let summary = Orchestrator::new(ctx, gate)
//!     .run(async { let _ = tokio::signal::ctrl_c().await; })
//!     .await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod locator;
pub mod orchestrator;
pub mod process;
pub mod targets;

pub use config::{FowSyncConfig, PathConfig, SyncContext, SyncPolicy, SyncSettings};
pub use engine::{FailureStage, SyncEngine, SyncReport, Synchronizer, TargetFailure};
pub use error::{ConfigError, Result, SyncError};
pub use locator::{AuthoritativeFile, SourceLocator};
pub use orchestrator::{Orchestrator, RunState, RunSummary, StopReason};
pub use process::{ProcessGate, SystemProcessGate};
pub use targets::{CharacterFolder, DifficultyTier, SyncTarget, TargetEnumerator};
