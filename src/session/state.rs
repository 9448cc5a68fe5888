use std::path::PathBuf;

use tokio::fs::File;

/// Where an accepted upload is being written.
#[derive(Debug)]
pub struct UploadTarget {
    /// Final location, replaced only once the payload is complete.
    pub path: PathBuf,
    /// Per-session file receiving the chunks.
    pub partial_path: PathBuf,
    pub file: File,
}

#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    AwaitFrame,
    /// Payload chunks of `name` are arriving. `target` is `None` when the
    /// upload was refused and its bytes are being discarded.
    Receiving {
        name: String,
        target: Option<UploadTarget>,
        received: u64,
    },
    /// Payload complete, waiting for the `CRC64:` acknowledgement.
    AwaitHash { name: String, stored: bool },
}
