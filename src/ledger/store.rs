use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::FilesystemError;

/// Hidden sidecar holding a directory's ledger.
pub const LEDGER_FILE_NAME: &str = ".merkel";
pub const LEDGER_TEMP_FILE_NAME: &str = ".merkel.tmp";

/// Relative path to hash.
pub type Records = BTreeMap<String, u64>;

pub fn ledger_path(dir: &Path) -> PathBuf {
    dir.join(LEDGER_FILE_NAME)
}

/// True for the sidecar and its temporary sibling, which are never hashed.
pub fn is_ledger_file(name: &OsStr) -> bool {
    name == LEDGER_FILE_NAME || name == LEDGER_TEMP_FILE_NAME
}

/// Reads a ledger. A missing file is an empty ledger; a malformed line is an error.
pub fn load(path: &Path) -> Result<Records, FilesystemError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
        Err(e) => return Err(FilesystemError::io(path, e)),
    };

    let mut records = Records::new();
    for (index, line) in contents.lines().enumerate() {
        let malformed = |reason: String| FilesystemError::MalformedLedger {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        };

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != 2 {
            return Err(malformed(format!(
                "expected 2 tab-separated columns, found {}",
                columns.len()
            )));
        }
        let hash = columns[1]
            .parse::<u64>()
            .map_err(|_| malformed(format!("hash {:?} is not an unsigned integer", columns[1])))?;
        records.insert(columns[0].to_string(), hash);
    }

    Ok(records)
}

/// Fresh values win; keys only present in `existing` become tombstones.
pub fn merge(existing: Records, fresh: &Records) -> Records {
    let mut merged: Records = existing.into_keys().map(|key| (key, 0)).collect();
    merged.extend(fresh.iter().map(|(key, hash)| (key.clone(), *hash)));
    merged
}

/// Rewrites the ledger from scratch through a temporary file and a rename.
pub fn save(path: &Path, records: &Records) -> Result<(), FilesystemError> {
    let mut contents = String::new();
    for (key, hash) in records {
        if key.contains(['\t', '\n', '\r']) {
            return Err(FilesystemError::InvalidLedgerKey(key.clone()));
        }
        contents.push_str(&format!("{key}\t{hash}\n"));
    }

    let temp_path = path.with_file_name(LEDGER_TEMP_FILE_NAME);
    let mut file = fs::File::create(&temp_path).map_err(|e| FilesystemError::io(&temp_path, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| FilesystemError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| FilesystemError::io(path, e))?;

    debug!("Saved {} ledger records to {:?}", records.len(), path);
    Ok(())
}

/// Merges `fresh` into the ledger of `dir` and persists the result.
pub fn update(dir: &Path, fresh: &Records) -> Result<Records, FilesystemError> {
    let path = ledger_path(dir);
    let merged = merge(load(&path)?, fresh);
    save(&path, &merged)?;
    Ok(merged)
}
