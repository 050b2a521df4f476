//! Configuration for watching a save directory.

use std::path::{Path, PathBuf};

/// Name of the per-character binary state file the game rewrites on save.
pub const PLAYER_FILE_NAME: &str = "player.gdc";

/// Name of the optional grouping directory that holds character folders.
pub const CHARACTER_GROUP_DIR: &str = "main";

/// Default capacity of the trigger channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a watched save directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Root of the save directory. Compared verbatim against event paths, so
    /// callers should pass a canonical path.
    pub save_root: PathBuf,

    /// File name whose modification signals new player progress.
    pub player_file: String,

    /// Grouping directory under the root that may hold character folders.
    pub character_group: String,

    /// Capacity of the trigger channel.
    pub channel_capacity: usize,
}

impl WatchConfig {
    /// Create a new watch config for a save root.
    pub fn new(save_root: impl Into<PathBuf>) -> Self {
        Self {
            save_root: save_root.into(),
            player_file: PLAYER_FILE_NAME.to_string(),
            character_group: CHARACTER_GROUP_DIR.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the trigger channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Directories whose direct children are character slots.
    pub fn character_parents(&self) -> [PathBuf; 2] {
        [
            self.save_root.clone(),
            self.save_root.join(&self.character_group),
        ]
    }

    /// Check if a directory is a direct child of a character parent.
    pub fn is_character_slot(&self, dir: &Path) -> bool {
        match dir.parent() {
            Some(parent) => self.character_parents().iter().any(|p| p == parent),
            None => false,
        }
    }

    /// Check if a path names the player state file.
    pub fn is_player_file(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name == self.player_file.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::new("/saves");

        assert_eq!(config.save_root, Path::new("/saves"));
        assert_eq!(config.player_file, "player.gdc");
        assert_eq!(config.character_group, "main");
        assert_eq!(config.with_channel_capacity(0).channel_capacity, 1);
    }

    #[test]
    fn test_character_slot_detection() {
        let config = WatchConfig::new("/saves");

        assert!(config.is_character_slot(Path::new("/saves/_Hero")));
        assert!(config.is_character_slot(Path::new("/saves/main/_Hero")));
        assert!(!config.is_character_slot(Path::new("/saves/main/_Hero/levels")));
        assert!(!config.is_character_slot(Path::new("/elsewhere/_Hero")));
        assert!(!config.is_character_slot(Path::new("/")));
    }

    #[test]
    fn test_player_file_detection() {
        let config = WatchConfig::new("/saves");

        assert!(config.is_player_file(Path::new("/saves/main/_Hero/player.gdc")));
        assert!(!config.is_player_file(Path::new("/saves/main/_Hero/player.gdc.bak")));
        assert!(!config.is_player_file(Path::new("/saves/main/_Hero/oldplayer.gdc")));
    }
}
