//! Fan-out of the authoritative file to every character and tier.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{SyncContext, SyncPolicy};
use crate::locator::{AuthoritativeFile, SourceLocator};
use crate::targets::{SyncTarget, TargetEnumerator};

/// Outcome of one locate-then-sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Source file used, if one was found.
    pub source: Option<PathBuf>,

    /// Size of the source at scan time.
    pub source_size: Option<u64>,

    /// Number of character folders found.
    pub characters: usize,

    /// Targets overwritten.
    pub written: usize,

    /// Targets left untouched by the policy.
    pub skipped: usize,

    /// Targets that could not be written.
    pub failures: Vec<TargetFailure>,

    /// When the pass started.
    pub started_at: DateTime<Utc>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            source: None,
            source_size: None,
            characters: 0,
            written: 0,
            skipped: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }

    /// Whether the pass had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.source.is_none() || self.characters == 0
    }

    /// Whether any target failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// A target that could not be brought up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFailure {
    /// Path that failed.
    pub path: PathBuf,

    /// Step that failed.
    pub stage: FailureStage,

    /// Error message.
    pub error: String,
}

/// Step of a target update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Reading the source file.
    Source,

    /// Creating the tier directory.
    CreateDir,

    /// Writing the destination file.
    Copy,
}

enum TargetOutcome {
    Written,
    Skipped,
}

/// Source bytes and timestamp, read once per pass so every target receives
/// the same content.
struct SourceSnapshot {
    bytes: Vec<u8>,
    modified: Option<SystemTime>,
}

impl SourceSnapshot {
    fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        Ok(Self { bytes, modified })
    }
}

/// Copies the authoritative file into every target slot.
pub struct SyncEngine {
    ctx: Arc<SyncContext>,
    targets: TargetEnumerator,
}

impl SyncEngine {
    /// Create an engine for the context's save root.
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            ctx,
            targets: TargetEnumerator::new(),
        }
    }

    /// Copy `source` to every tier of every character folder.
    ///
    /// Failures are isolated per target and collected in the report.
    pub fn sync_all(&self, source: Option<&AuthoritativeFile>) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport::new();

        let Some(source) = source else {
            info!("No valid .fow file found to sync");
            return report.finish(started);
        };
        report.source = Some(source.path.clone());
        report.source_size = Some(source.size);

        let snapshot = match SourceSnapshot::read(&source.path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Invalid source .fow file {}: {e}", source.path.display());
                report.failures.push(TargetFailure {
                    path: source.path.clone(),
                    stage: FailureStage::Source,
                    error: e.to_string(),
                });
                return report.finish(started);
            }
        };

        let characters = self.targets.enumerate(&self.ctx.save_root);
        if characters.is_empty() {
            info!(
                "No character folders found in {}",
                self.ctx.save_root.display()
            );
        }
        report.characters = characters.len();

        for character in &characters {
            for target in character.targets() {
                match self.sync_target(&snapshot, &target) {
                    Ok(TargetOutcome::Written) => {
                        debug!("Synced: {} ({})", character.name(), target.tier);
                        report.written += 1;
                    }
                    Ok(TargetOutcome::Skipped) => report.skipped += 1,
                    Err(failure) => {
                        warn!(
                            "Sync failed for {}: {}",
                            failure.path.display(),
                            failure.error
                        );
                        report.failures.push(failure);
                    }
                }
            }
        }

        info!(
            "Synced {} to {} target(s) across {} character(s) ({} skipped, {} failed)",
            source.path.display(),
            report.written,
            report.characters,
            report.skipped,
            report.failures.len()
        );

        report.finish(started)
    }

    fn sync_target(
        &self,
        snapshot: &SourceSnapshot,
        target: &SyncTarget,
    ) -> std::result::Result<TargetOutcome, TargetFailure> {
        let dir = target.dir();
        fs::create_dir_all(&dir).map_err(|e| TargetFailure {
            path: dir.clone(),
            stage: FailureStage::CreateDir,
            error: e.to_string(),
        })?;

        let file = target.file();
        if !self.should_sync(snapshot, &file) {
            return Ok(TargetOutcome::Skipped);
        }

        write_replacing(&dir, &file, snapshot).map_err(|e| TargetFailure {
            path: file.clone(),
            stage: FailureStage::Copy,
            error: e.to_string(),
        })?;

        Ok(TargetOutcome::Written)
    }

    fn should_sync(&self, snapshot: &SourceSnapshot, file: &Path) -> bool {
        match self.ctx.policy {
            SyncPolicy::Always => true,
            SyncPolicy::SkipIdentical => !has_same_content(file, &snapshot.bytes),
        }
    }
}

fn has_same_content(file: &Path, bytes: &[u8]) -> bool {
    match fs::metadata(file) {
        Ok(metadata) if metadata.len() == bytes.len() as u64 => {
            fs::read(file).is_ok_and(|existing| existing == bytes)
        }
        _ => false,
    }
}

/// Write into a temporary file beside the destination, then rename it over
/// the destination so readers only ever see a complete file.
fn write_replacing(dir: &Path, file: &Path, snapshot: &SourceSnapshot) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&snapshot.bytes)?;
    if let Some(modified) = snapshot.modified {
        tmp.as_file().set_modified(modified)?;
    }
    tmp.persist(file).map_err(|e| e.error)?;
    Ok(())
}

/// Runs locate-then-sync passes one at a time.
///
/// Every pass, whatever triggered it, goes through [`Synchronizer::run_pass`],
/// which holds the pass lock across the source scan and all target writes.
pub struct Synchronizer {
    ctx: Arc<SyncContext>,
    locator: SourceLocator,
    engine: SyncEngine,
    pass_lock: Mutex<()>,
}

impl Synchronizer {
    /// Create a synchronizer for a context.
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        let locator = if ctx.follow_symlinks {
            SourceLocator::new().follow_symlinks()
        } else {
            SourceLocator::new()
        };

        Self {
            locator,
            engine: SyncEngine::new(Arc::clone(&ctx)),
            ctx,
            pass_lock: Mutex::new(()),
        }
    }

    /// Locate the authoritative file and fan it out.
    pub fn run_pass(&self) -> SyncReport {
        let _guard = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let source = self.locator.locate(&self.ctx.save_root);
        self.engine.sync_all(source.as_ref())
    }

    /// The context this synchronizer runs against.
    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }
}
