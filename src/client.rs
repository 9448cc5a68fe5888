use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use log::{error, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::hashtree::compute_and_record;
use crate::protocol::message::TERMINATOR;
use crate::protocol::{Message, write_message, write_payload};

/// Interactive side of a connection: chat lines, uploads and `exit`.
pub struct Client<S> {
    name: String,
    stream: S,
}

impl Client<TcpStream> {
    pub async fn connect<A: ToSocketAddrs>(addr: A, name: String) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context("Failed to connect to the server")?;
        info!("Connected to the server at {}", stream.peer_addr()?);
        Ok(Self::new(name, stream))
    }
}

impl<S> Client<S>
where
    S: AsyncWrite + Unpin,
{
    pub fn new(name: String, stream: S) -> Self {
        Self { name, stream }
    }

    /// Reads commands from `input` until `exit` or end of input, then closes
    /// the connection. Prompts and notices go to `output`.
    pub async fn run<I, O>(mut self, input: I, mut output: O) -> anyhow::Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        loop {
            prompt(&mut output, &format!("{}: ", self.name)).await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line.contains(char::from(TERMINATOR)) {
                prompt(&mut output, "Lines containing NUL bytes cannot be sent.\n").await?;
                continue;
            }
            if line.eq_ignore_ascii_case("exit") {
                break;
            }
            if line.eq_ignore_ascii_case("file") {
                prompt(&mut output, "Enter the path of the file to send: ").await?;
                let Some(path) = lines.next_line().await? else {
                    break;
                };
                let path = PathBuf::from(path.trim());

                if !path.is_file() {
                    prompt(&mut output, "File not found.\n").await?;
                    continue;
                }
                match self.upload(&path).await {
                    Ok(_) => {
                        let notice = format!("File '{}' sent successfully.\n", path.display());
                        prompt(&mut output, &notice).await?;
                    }
                    Err(e) => {
                        error!("Upload of {:?} failed: {:#}", path, e);
                        prompt(&mut output, &format!("Error: {e:#}\n")).await?;
                    }
                }
                continue;
            }

            let chat = Message::Chat(format!("{}: {}", self.name, line));
            write_message(&mut self.stream, &chat).await?;
        }

        self.stream.shutdown().await?;
        Ok(())
    }

    /// Sends `path`, refreshes the hash tree of its directory and acknowledges
    /// the upload with the file's hash. Returns that hash.
    pub async fn upload(&mut self, path: &Path) -> anyhow::Result<u64> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("{:?} has no usable file name", path))?
            .to_string();

        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {path:?}"))?;
        let len = file.metadata().await?.len();

        write_message(&mut self.stream, &Message::File(file_name.clone())).await?;
        write_payload(&mut self.stream, file, len).await?;
        info!("File '{}' sent ({} bytes)", file_name, len);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tree = tokio::task::spawn_blocking(move || compute_and_record(&dir)).await?;

        // Il server attende comunque la conferma: in caso di errore invia 0
        let hash = match &tree {
            Ok(tree) => tree.get(&file_name).unwrap_or(0),
            Err(_) => 0,
        };
        write_message(&mut self.stream, &Message::crc64(hash)).await?;

        tree.context("Failed to update the hash tree")?;
        Ok(hash)
    }
}

async fn prompt<O>(output: &mut O, text: &str) -> std::io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await
}
