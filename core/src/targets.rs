//! Character folders and the destination slots under them.

use std::fmt;
use std::path::{Path, PathBuf};

use fowsync_watcher::config::CHARACTER_GROUP_DIR;
use tracing::{debug, warn};

/// Directory under each character that holds per-tier map state.
pub const LEVELS_DIR: &str = "levels_world001.map";

/// File name of the exploration state inside a tier directory.
pub const TARGET_FILE_NAME: &str = "map.fow";

/// Game difficulty tier. Each keeps its own exploration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DifficultyTier {
    Normal,
    Elite,
    Ultimate,
}

impl DifficultyTier {
    /// All tiers, in game order.
    pub const ALL: [Self; 3] = [Self::Normal, Self::Elite, Self::Ultimate];

    /// Directory name the game uses for this tier.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Elite => "Elite",
            Self::Ultimate => "Ultimate",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One character save slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CharacterFolder {
    /// Path to the character directory.
    pub path: PathBuf,
}

impl CharacterFolder {
    /// Create a character folder.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Folder name, for logging.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// The three destination slots of this character.
    pub fn targets(&self) -> impl Iterator<Item = SyncTarget> + '_ {
        DifficultyTier::ALL
            .into_iter()
            .map(|tier| SyncTarget::new(&self.path, tier))
    }
}

/// A single destination `map.fow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// Character directory.
    pub character: PathBuf,

    /// Difficulty tier.
    pub tier: DifficultyTier,
}

impl SyncTarget {
    /// Create a target.
    pub fn new(character: impl Into<PathBuf>, tier: DifficultyTier) -> Self {
        Self {
            character: character.into(),
            tier,
        }
    }

    /// Directory holding the destination file.
    pub fn dir(&self) -> PathBuf {
        self.character.join(LEVELS_DIR).join(self.tier.dir_name())
    }

    /// Destination file path.
    pub fn file(&self) -> PathBuf {
        self.dir().join(TARGET_FILE_NAME)
    }
}

/// Discovers character folders under a save root.
#[derive(Debug, Clone)]
pub struct TargetEnumerator {
    character_group: String,
}

impl TargetEnumerator {
    /// Create an enumerator using the `main` grouping directory.
    pub fn new() -> Self {
        Self {
            character_group: CHARACTER_GROUP_DIR.to_string(),
        }
    }

    /// List character folders, sorted by path.
    ///
    /// When `root/main` exists its subdirectories are the characters,
    /// otherwise the subdirectories of `root` itself are.
    pub fn enumerate(&self, root: &Path) -> Vec<CharacterFolder> {
        let group = root.join(&self.character_group);
        let base = if group.is_dir() { group } else { root.to_path_buf() };

        let entries = match std::fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list character folders in {}: {e}", base.display());
                return Vec::new();
            }
        };

        let mut folders: Vec<CharacterFolder> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .map(CharacterFolder::new)
            .collect();
        folders.sort();

        debug!("Found {} character folder(s) in {}", folders.len(), base.display());
        folders
    }
}

impl Default for TargetEnumerator {
    fn default() -> Self {
        Self::new()
    }
}
