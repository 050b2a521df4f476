//! File events and the sync triggers derived from them.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RenameMode};

use crate::config::WatchConfig;

/// A file system event, reduced to what trigger classification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: FileEventKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// Whether the path is a directory.
    pub is_directory: bool,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind,
            path: path.into(),
            is_directory,
        }
    }

    /// Build an event from a notify event kind and one of its paths.
    ///
    /// Backends that do not report folder creation explicitly fall back to
    /// checking the path on disk.
    pub fn from_notify(kind: &notify::EventKind, path: &Path) -> Self {
        let is_directory = matches!(kind, notify::EventKind::Create(CreateKind::Folder))
            || path.is_dir();

        Self::new(FileEventKind::from(*kind), path, is_directory)
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File or directory was created.
    Created,

    /// File contents were modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// File was renamed (old path).
    RenamedFrom,

    /// File was renamed (new path).
    RenamedTo,

    /// File metadata changed.
    MetadataChanged,

    /// Access time changed.
    Accessed,

    /// Unknown event type.
    Unknown,
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                ModifyKind::Name(RenameMode::From) => Self::RenamedFrom,
                ModifyKind::Name(RenameMode::To) => Self::RenamedTo,
                ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}

/// A request to synchronize, raised by the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The game wrote player progress for some character.
    PlayerModified { path: PathBuf },

    /// A new character slot appeared. Consumers should let it settle before
    /// syncing so the game can finish populating it.
    NewCharacter { path: PathBuf },
}

impl SyncTrigger {
    /// Path that caused the trigger.
    pub fn path(&self) -> &Path {
        match self {
            Self::PlayerModified { path } | Self::NewCharacter { path } => path,
        }
    }
}

/// Map a file event to a sync trigger, if it is one.
///
/// Writes to the player file count whether they land in place or through a
/// rename onto the final name.
pub fn classify_event(config: &WatchConfig, event: &FileEvent) -> Option<SyncTrigger> {
    match event.kind {
        FileEventKind::Modified | FileEventKind::RenamedTo
            if !event.is_directory && config.is_player_file(&event.path) =>
        {
            Some(SyncTrigger::PlayerModified {
                path: event.path.clone(),
            })
        }
        FileEventKind::Created
            if event.is_directory && config.is_character_slot(&event.path) =>
        {
            Some(SyncTrigger::NewCharacter {
                path: event.path.clone(),
            })
        }
        _ => None,
    }
}
