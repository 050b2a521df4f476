//! Save directory watcher implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};
use crate::event::{FileEvent, SyncTrigger, classify_event};

/// Watches a save directory and forwards sync triggers over a channel.
///
/// The notify callback runs on the backend's own thread; the only thing it
/// shares with the consumer is the channel.
pub struct SaveWatcher {
    /// Watch configuration.
    config: WatchConfig,

    /// Internal notify watcher, present while running.
    watcher: Option<RecommendedWatcher>,

    /// Trigger sender.
    trigger_tx: mpsc::Sender<SyncTrigger>,

    /// Triggers parked while the channel is full.
    overflow: Arc<Overflow>,
}

impl SaveWatcher {
    /// Create a new save watcher and the receiver its triggers arrive on.
    pub fn new(config: WatchConfig) -> (Self, TriggerReceiver) {
        let (trigger_tx, overflow, trigger_rx) = trigger_channel(config.channel_capacity);

        let watcher = Self {
            config,
            watcher: None,
            trigger_tx,
            overflow,
        };

        (watcher, trigger_rx)
    }

    /// Start watching the save root recursively.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let root = &self.config.save_root;
        if !root.exists() {
            return Err(WatcherError::SaveRootNotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()));
        }

        let trigger_tx = self.trigger_tx.clone();
        let overflow = Arc::clone(&self.overflow);
        let config = self.config.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for path in &event.paths {
                        let file_event = FileEvent::from_notify(&event.kind, path);
                        if let Some(trigger) = classify_event(&config, &file_event) {
                            forward(&trigger_tx, &overflow, trigger);
                        }
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                }
            },
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);
        info!("Watching save directory: {}", root.display());

        Ok(())
    }

    /// Stop watching. Dropping the notify watcher joins its event thread.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.config.save_root) {
                warn!("Failed to unwatch {}: {e}", self.config.save_root.display());
            }
            drop(watcher);
            info!("Save watcher stopped");
        }
    }

    /// Check if the watcher is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Get the watch configuration.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }
}

impl Drop for SaveWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receiving half of a [`SaveWatcher`].
///
/// A trigger that finds the channel full is parked in a slot for its kind,
/// replacing an older one of the same kind, and handed out once the channel
/// has drained. A burst therefore never loses a new character to a pending
/// player write or the other way round.
pub struct TriggerReceiver {
    rx: mpsc::Receiver<SyncTrigger>,
    overflow: Arc<Overflow>,
}

impl TriggerReceiver {
    /// Wait for the next trigger. Returns `None` once every sender is gone
    /// and nothing is parked.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<SyncTrigger> {
        match self.try_recv() {
            Some(trigger) => Some(trigger),
            None => self.rx.recv().await,
        }
    }

    /// Take the next trigger without waiting.
    pub fn try_recv(&mut self) -> Option<SyncTrigger> {
        self.rx.try_recv().ok().or_else(|| self.overflow.take())
    }
}

#[derive(Debug, Default)]
struct Overflow {
    player_modified: Mutex<Option<SyncTrigger>>,
    new_character: Mutex<Option<SyncTrigger>>,
}

impl Overflow {
    fn park(&self, trigger: SyncTrigger) {
        let slot = match trigger {
            SyncTrigger::PlayerModified { .. } => &self.player_modified,
            SyncTrigger::NewCharacter { .. } => &self.new_character,
        };
        *lock(slot) = Some(trigger);
    }

    fn take(&self) -> Option<SyncTrigger> {
        lock(&self.new_character)
            .take()
            .or_else(|| lock(&self.player_modified).take())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn trigger_channel(
    capacity: usize,
) -> (mpsc::Sender<SyncTrigger>, Arc<Overflow>, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let overflow = Arc::new(Overflow::default());
    let receiver = TriggerReceiver {
        rx,
        overflow: Arc::clone(&overflow),
    };
    (tx, overflow, receiver)
}

/// Send a trigger without blocking the notify thread.
fn forward(tx: &mpsc::Sender<SyncTrigger>, overflow: &Overflow, trigger: SyncTrigger) {
    match tx.try_send(trigger) {
        Ok(()) => {}
        Err(TrySendError::Full(trigger)) => {
            debug!("Trigger channel full, parking {}", trigger.path().display());
            overflow.park(trigger);
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Trigger receiver closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_creation() {
        let watcher = SaveWatcher::new(WatchConfig::new("/saves")).0;
        assert!(!watcher.is_running());
        assert_eq!(watcher.config().save_root, PathBuf::from("/saves"));
    }

    #[test]
    fn test_start_nonexistent_root() {
        let (mut watcher, _rx) = SaveWatcher::new(WatchConfig::new("/nonexistent/path/12345"));

        let result = watcher.start();
        assert!(matches!(result, Err(WatcherError::SaveRootNotFound(_))));
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_start_on_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let (mut watcher, _rx) = SaveWatcher::new(WatchConfig::new(&file));
        assert!(matches!(watcher.start(), Err(WatcherError::NotADirectory(_))));
    }

    fn player(name: &str) -> SyncTrigger {
        SyncTrigger::PlayerModified {
            path: PathBuf::from(format!("/saves/main/{name}/player.gdc")),
        }
    }

    #[test]
    fn test_full_channel_keeps_one_trigger_per_kind() {
        let (tx, overflow, mut rx) = trigger_channel(1);
        let hero = SyncTrigger::NewCharacter {
            path: PathBuf::from("/saves/main/_Hero"),
        };

        forward(&tx, &overflow, player("_A"));
        forward(&tx, &overflow, hero.clone());
        forward(&tx, &overflow, player("_B"));
        forward(&tx, &overflow, player("_C"));

        assert_eq!(rx.try_recv(), Some(player("_A")));
        assert_eq!(rx.try_recv(), Some(hero));
        assert_eq!(rx.try_recv(), Some(player("_C")));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn test_parked_trigger_survives_closed_channel() {
        let (tx, overflow, mut rx) = trigger_channel(1);
        let hero = SyncTrigger::NewCharacter {
            path: PathBuf::from("/saves/main/_Hero"),
        };

        forward(&tx, &overflow, player("_A"));
        forward(&tx, &overflow, hero.clone());
        drop(tx);

        assert_eq!(rx.recv().await, Some(player("_A")));
        assert_eq!(rx.recv().await, Some(hero));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_new_character_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        let (mut watcher, mut rx) = SaveWatcher::new(WatchConfig::new(&root));
        watcher.start().unwrap();
        assert!(watcher.is_running());

        let slot = root.join("_NewHero");
        std::fs::create_dir(&slot).unwrap();

        let trigger = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger, SyncTrigger::NewCharacter { path: slot });

        watcher.stop();
        assert!(!watcher.is_running());
    }
}
