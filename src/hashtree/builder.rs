use std::fs::{self, ReadDir};
use std::path::Path;

use log::{debug, warn};

use crate::error::FilesystemError;
use crate::ledger::{self, Records, is_ledger_file};

use super::hasher::file_hash;

/// Result of hashing one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHashTree {
    /// Wrapping sum of the hashes of the direct children.
    pub aggregate: u64,
    /// Every file and directory of the subtree, keyed by `/`-separated path
    /// relative to the hashed directory. The directory itself has the key `""`.
    pub entries: Records,
}

impl DirectoryHashTree {
    pub fn get(&self, relative_path: &str) -> Option<u64> {
        self.entries.get(relative_path).copied()
    }
}

/// Hashes `dir` recursively, saving the merged ledger of every subdirectory
/// on the way. The ledger of `dir` itself is left to the caller.
pub fn compute_directory(dir: &Path) -> Result<DirectoryHashTree, FilesystemError> {
    if !dir.is_dir() {
        return Err(FilesystemError::DirectoryMissing(dir.to_path_buf()));
    }
    let read_dir = fs::read_dir(dir).map_err(|e| FilesystemError::io(dir, e))?;
    walk(dir, read_dir)
}

/// [`compute_directory`] followed by a ledger update for `dir` itself.
pub fn compute_and_record(dir: &Path) -> Result<DirectoryHashTree, FilesystemError> {
    let tree = compute_directory(dir)?;
    ledger::update(dir, &tree.entries)?;
    Ok(tree)
}

fn walk(dir: &Path, read_dir: ReadDir) -> Result<DirectoryHashTree, FilesystemError> {
    let mut aggregate = 0u64;
    let mut entries = Records::new();

    for entry in read_dir {
        let entry = entry.map_err(|e| FilesystemError::io(dir, e))?;
        let name = entry.file_name();
        if is_ledger_file(&name) {
            continue;
        }

        let key = name.to_string_lossy().into_owned();
        let path = entry.path();
        if key.contains(['\t', '\n', '\r']) {
            warn!("Skipping {:?}: its name cannot be stored in a ledger", path);
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|e| FilesystemError::io(&path, e))?;

        if file_type.is_dir() {
            let child = match fs::read_dir(&path) {
                Ok(child_read_dir) => {
                    let child = walk(&path, child_read_dir)?;
                    ledger::update(&path, &child.entries)?;
                    child
                }
                Err(e) => {
                    warn!("Cannot read directory {:?}: {}, recording hash 0", path, e);
                    DirectoryHashTree {
                        aggregate: 0,
                        entries: Records::new(),
                    }
                }
            };

            for (child_key, hash) in &child.entries {
                if !child_key.is_empty() {
                    entries.insert(format!("{key}/{child_key}"), *hash);
                }
            }
            entries.insert(key, child.aggregate);
            aggregate = aggregate.wrapping_add(child.aggregate);
        } else if file_type.is_file() || file_type.is_symlink() {
            // Symlinked directories are not followed.
            if file_type.is_symlink() && path.is_dir() {
                debug!("Skipping symlinked directory {:?}", path);
                continue;
            }
            let hash = file_hash(&path).unwrap_or_else(|e| {
                warn!("Cannot read file {:?}: {}, recording hash 0", path, e);
                0
            });
            entries.insert(key, hash);
            aggregate = aggregate.wrapping_add(hash);
        } else {
            debug!("Skipping special file {:?}", path);
        }
    }

    entries.insert(String::new(), aggregate);
    Ok(DirectoryHashTree { aggregate, entries })
}
