use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncReadExt};

const SAMPLE_SIZE: usize = 512;

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "dat", "db", "sqlite", "jpg", "jpeg", "png", "gif",
    "bmp", "webp", "ico", "mp3", "wav", "ogg", "flac", "mp4", "avi", "mkv", "mov", "pdf", "doc",
    "docx", "xls", "xlsx", "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "iso",
];

/// What the change observer needs to know before echoing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub len: u64,
    pub is_binary: bool,
}

impl FileInfo {
    pub async fn inspect(path: &Path) -> Result<Self, std::io::Error> {
        let metadata = fs::metadata(path).await?;
        let is_binary = has_binary_extension(path) || Self::sample_is_binary(path).await?;

        Ok(Self {
            path: path.to_path_buf(),
            len: metadata.len(),
            is_binary,
        })
    }

    async fn sample_is_binary(path: &Path) -> Result<bool, std::io::Error> {
        let mut file = fs::File::open(path).await?;
        let mut buffer = [0u8; SAMPLE_SIZE];
        let bytes_read = file.read(&mut buffer).await?;
        Ok(looks_binary(&buffer[..bytes_read]))
    }
}

fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// NUL bytes, or more than 30% of bytes outside ASCII.
fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let non_ascii = sample.iter().filter(|&&b| b > 127).count();
    non_ascii * 100 > sample.len() * 30
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn sample_classification() {
        assert!(!looks_binary(b""));
        assert!(!looks_binary(b"plain text\n"));
        assert!(!looks_binary("caffè e cornetto".as_bytes()));
        assert!(looks_binary(b"ab\0cd"));
        assert!(looks_binary(&[0xff; 16]));
    }

    #[tokio::test]
    async fn inspect_uses_extension_and_content() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("notes.txt");
        let image = dir.path().join("photo.PNG");
        let blob = dir.path().join("blob");
        std::fs::write(&text, "hello").unwrap();
        std::fs::write(&image, "not really a png").unwrap();
        std::fs::write(&blob, [1u8, 0, 2]).unwrap();

        let info = FileInfo::inspect(&text).await.unwrap();
        assert_eq!(info.len, 5);
        assert!(!info.is_binary);
        assert!(FileInfo::inspect(&image).await.unwrap().is_binary);
        assert!(FileInfo::inspect(&blob).await.unwrap().is_binary);
        assert!(FileInfo::inspect(&dir.path().join("absent")).await.is_err());
    }
}
