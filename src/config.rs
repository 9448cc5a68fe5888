use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::args::ServeArgs;
use crate::error::ConfigurationError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_FILES_DIR: &str = "files";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub files_dir: PathBuf,
    pub read_timeout: Option<Duration>,
    pub max_frame_length: usize,
    pub max_upload_size: u64,
    pub watch: bool,
}

/// `appSettings.json` layout.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SettingsFile {
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServerSection {
    #[serde(rename = "IPAddress")]
    ip_address: Option<String>,
    port: Option<PortSetting>,
    files_directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortSetting {
    Number(u16),
    Text(String),
}

impl ServerConfig {
    /// Command line wins over the settings file, which wins over defaults.
    /// The files directory is created when missing and canonicalized.
    pub fn resolve(args: &ServeArgs) -> Result<Self, ConfigurationError> {
        let settings = match &args.config {
            Some(path) => read_settings(path)?,
            None => SettingsFile::default(),
        };
        let section = settings.server;

        let host = args
            .host
            .clone()
            .or(section.ip_address)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigurationError::InvalidAddress(host.clone()))?;

        let port = match (args.port, section.port) {
            (Some(port), _) => port,
            (None, Some(PortSetting::Number(port))) => port,
            (None, Some(PortSetting::Text(text))) => text
                .trim()
                .parse()
                .map_err(|_| ConfigurationError::InvalidPort(text))?,
            (None, None) => DEFAULT_PORT,
        };

        let files_dir = args
            .files_dir
            .clone()
            .or(section.files_directory)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILES_DIR));

        Ok(Self {
            listen_addr: SocketAddr::new(ip, port),
            files_dir: prepare_files_dir(&files_dir)?,
            read_timeout: (args.read_timeout > 0).then(|| Duration::from_secs(args.read_timeout)),
            max_frame_length: args.max_frame_length,
            max_upload_size: args.max_upload_size,
            watch: !args.no_watch,
        })
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile, ConfigurationError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigurationError::SettingsUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&contents).map_err(|source| ConfigurationError::SettingsInvalid {
        path: path.to_path_buf(),
        source,
    })
}

fn prepare_files_dir(path: &Path) -> Result<PathBuf, ConfigurationError> {
    let unusable = |reason: String| ConfigurationError::FilesDirectory {
        path: path.to_path_buf(),
        reason,
    };

    if path.exists() && !path.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }
    std::fs::create_dir_all(path).map_err(|e| unusable(e.to_string()))?;
    path.canonicalize().map_err(|e| unusable(e.to_string()))
}
