//! # Save Watcher
//!
//! This crate watches a Grim Dawn save directory and turns raw file system
//! notifications into the two trigger kinds the fog-of-war sync cares about.
//!
//! ## Triggers
//!
//! - **Player modified**: a character's `player.gdc` was written
//! - **New character**: a directory appeared directly under the save root or
//!   under its `main` grouping directory
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Save Watcher                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  notify ──► FileEvent ──► classify_event ──► SyncTrigger       │
//! │                                  │                │             │
//! │                                  ▼                ▼             │
//! │                            WatchConfig    TriggerReceiver       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod watcher;

pub use config::WatchConfig;
pub use error::{Result, WatcherError};
pub use event::{FileEvent, FileEventKind, SyncTrigger, classify_event};
pub use watcher::{SaveWatcher, TriggerReceiver};
