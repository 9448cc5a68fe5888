use std::ffi::OsStr;
use std::path::PathBuf;

use thiserror::Error;

use crate::ledger::is_ledger_file;
use crate::registry::SessionId;

/// Prefix of the files that receive uploads still in progress.
pub const PARTIAL_UPLOAD_PREFIX: &str = ".partial-";

pub fn is_partial_upload(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.starts_with(PARTIAL_UPLOAD_PREFIX))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejected {
    #[error("empty file name")]
    Empty,
    #[error("file name contains a path separator")]
    PathSeparator,
    #[error("file name refers to a directory entry")]
    Relative,
    #[error("file name is reserved by the server")]
    Reserved,
    #[error("a directory with that name already exists")]
    IsDirectory,
}

/// Maps client-supplied upload names to paths inside the files directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    files_dir: PathBuf,
}

impl PathResolver {
    pub fn new(files_dir: PathBuf) -> Self {
        Self { files_dir }
    }

    pub fn resolve_upload(&self, name: &str) -> Result<PathBuf, UploadRejected> {
        if name.is_empty() {
            return Err(UploadRejected::Empty);
        }
        if name.contains(['/', '\\', '\0']) {
            return Err(UploadRejected::PathSeparator);
        }
        if name == "." || name == ".." {
            return Err(UploadRejected::Relative);
        }
        if is_ledger_file(OsStr::new(name)) || is_partial_upload(OsStr::new(name)) {
            return Err(UploadRejected::Reserved);
        }

        let resolved = self.files_dir.join(name);
        // Il file deve restare direttamente dentro files_dir
        if resolved.parent() != Some(self.files_dir.as_path()) {
            return Err(UploadRejected::PathSeparator);
        }
        if resolved.is_dir() {
            return Err(UploadRejected::IsDirectory);
        }
        Ok(resolved)
    }

    /// File that receives the chunks of `name` for session `id`.
    pub fn partial_path(&self, id: SessionId, name: &str) -> PathBuf {
        self.files_dir
            .join(format!("{PARTIAL_UPLOAD_PREFIX}{id}-{name}"))
    }
}
