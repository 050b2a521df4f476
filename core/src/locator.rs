//! Selection of the authoritative fog-of-war file.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension of exploration-state files.
pub const FOW_EXTENSION: &str = "fow";

/// The candidate chosen as the source of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeFile {
    /// Full path to the file.
    pub path: PathBuf,

    /// Size in bytes at scan time.
    pub size: u64,
}

/// Finds the largest `.fow` file under a save root.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    extension: String,
    follow_symlinks: bool,
}

impl SourceLocator {
    /// Create a locator for `.fow` files.
    pub fn new() -> Self {
        Self {
            extension: FOW_EXTENSION.to_string(),
            follow_symlinks: false,
        }
    }

    /// Enable following symbolic links.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// Scan `root` and return the largest candidate.
    ///
    /// Only a strictly greater size replaces the current best, so among equal
    /// sizes the first one in walk order wins. Walk order is whatever the
    /// file system yields. Entries that cannot be read are skipped.
    pub fn locate(&self, root: &Path) -> Option<AuthoritativeFile> {
        let mut best: Option<AuthoritativeFile> = None;
        let mut best_size = 0;
        let mut candidates = 0usize;

        for entry in WalkDir::new(root).follow_links(self.follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error scanning {}: {e}", root.display());
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.is_candidate(entry.path()) {
                continue;
            }
            candidates += 1;

            match entry.metadata() {
                Ok(metadata) if metadata.len() > best_size => {
                    best_size = metadata.len();
                    best = Some(AuthoritativeFile {
                        path: entry.into_path(),
                        size: best_size,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!("Error processing {}: {e}", entry.path().display()),
            }
        }

        debug!(
            "Scanned {} candidate(s) under {}, selected {:?}",
            candidates,
            root.display(),
            best.as_ref().map(|b| &b.path)
        );

        best
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }
}

impl Default for SourceLocator {
    fn default() -> Self {
        Self::new()
    }
}
