use std::path::{Path, PathBuf};

use log::info;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::FilesystemError;

use super::store::LEDGER_FILE_NAME;

pub const APPEND_LOG_HEADER: &str = "Merkel File";

/// The server's flat record of received uploads, one `<name>:<hash>` line each.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    // Serializes appends from concurrent sessions.
    write_lock: Mutex<()>,
}

impl AppendLog {
    /// Opens the log in `dir`, writing the header line if it does not exist yet.
    pub async fn open(dir: &Path) -> Result<Self, FilesystemError> {
        let path = dir.join(LEDGER_FILE_NAME);

        let exists = fs::try_exists(&path)
            .await
            .map_err(|e| FilesystemError::io(&path, e))?;
        if !exists {
            fs::write(&path, format!("{APPEND_LOG_HEADER}\n"))
                .await
                .map_err(|e| FilesystemError::io(&path, e))?;
            info!("Created upload ledger at {:?}", path);
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, name: &str, hash: u64) -> Result<(), FilesystemError> {
        let line = format!("{name}:{hash}\n");

        let _guard = self.write_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|e| FilesystemError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FilesystemError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| FilesystemError::io(&self.path, e))
    }

    /// Records after the header, in append order.
    pub async fn records(&self) -> Result<Vec<(String, u64)>, FilesystemError> {
        let contents = fs::read_to_string(&self.path)
            .await
            .map_err(|e| FilesystemError::io(&self.path, e))?;

        contents
            .lines()
            .enumerate()
            .skip(1)
            .map(|(index, line)| {
                line.rsplit_once(':')
                    .and_then(|(name, hash)| Some((name.to_string(), hash.parse::<u64>().ok()?)))
                    .ok_or_else(|| FilesystemError::MalformedLedger {
                        path: self.path.clone(),
                        line: index + 1,
                        reason: format!("expected <name>:<hash>, found {line:?}"),
                    })
            })
            .collect()
    }
}
