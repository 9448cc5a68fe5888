//! Server side of one client connection.

pub mod path_resolver;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::codec::FramedRead;

use crate::error::{ConnectionError, FilesystemError, FramingError};
use crate::protocol::{Frame, FrameCodec, Message, parse_crc64, split_chat};
use crate::registry::SessionId;
use crate::server::{ChatLine, ServerContext};

pub use path_resolver::{PathResolver, UploadRejected, is_partial_upload};
pub use state::{SessionState, UploadTarget};

/// Runs one connection to completion and unregisters it exactly once.
pub async fn handle_connection<S>(context: Arc<ServerContext>, stream: S, peer: SocketAddr)
where
    S: AsyncRead + Unpin,
{
    let id = context.registry.register(peer).await;
    let active = context.registry.len().await;
    info!("Accepted connection from client {} ({} active)", peer, active);

    let mut session = Session::new(id, peer, context.clone(), stream);
    match session.run().await {
        Ok(()) | Err(ConnectionError::Closed) => info!("Client {} disconnected.", peer),
        Err(e) => error!("Error handling client {}: {}", peer, e),
    }
    session.discard_partial_upload().await;

    context.registry.unregister(id).await;
    // Chiude lo stream
    drop(session);
}

pub struct Session<S> {
    id: SessionId,
    peer: SocketAddr,
    context: Arc<ServerContext>,
    frames: FramedRead<S, FrameCodec>,
    resolver: PathResolver,
    state: SessionState,
    display_name: Option<String>,
}

impl<S> Session<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(id: SessionId, peer: SocketAddr, context: Arc<ServerContext>, stream: S) -> Self {
        let codec = FrameCodec::new(
            context.config.max_frame_length,
            context.config.max_upload_size,
        );
        Self {
            id,
            peer,
            resolver: PathResolver::new(context.config.files_dir.clone()),
            frames: FramedRead::new(stream, codec),
            context,
            state: SessionState::AwaitFrame,
            display_name: None,
        }
    }

    /// Processes frames in arrival order until the stream ends or fails.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        loop {
            let frame = self.next_frame().await?.ok_or(ConnectionError::Closed)?;
            match frame {
                Frame::Message(message) => self.handle_message(message).await?,
                Frame::Chunk(chunk) => self.write_chunk(&chunk).await?,
                Frame::PayloadEnd => self.finish_upload().await?,
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        let next = match self.context.config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.frames.next())
                .await
                .map_err(|_| ConnectionError::ReadTimeout(limit.as_secs()))?,
            None => self.frames.next().await,
        };
        Ok(next.transpose()?)
    }

    async fn handle_message(&mut self, message: Message) -> Result<(), ConnectionError> {
        debug!("Data from client {}: {}", self.peer, message.to_text());

        // Dopo un upload il messaggio successivo è sempre la conferma dell'hash
        match std::mem::take(&mut self.state) {
            SessionState::AwaitHash { name, stored } => {
                return self.record_hash(name, stored, message).await;
            }
            other => self.state = other,
        }

        match message {
            Message::File(name) => self.begin_upload(name).await,
            Message::Crc64(value) => {
                warn!(
                    "Ignoring hash acknowledgement {:?} from {} without a preceding upload",
                    value, self.peer
                );
                Ok(())
            }
            Message::Chat(text) => {
                self.handle_chat(text).await;
                Ok(())
            }
        }
    }

    async fn handle_chat(&mut self, text: String) {
        match split_chat(&text) {
            Some((name, body)) => {
                if self.display_name.as_deref() != Some(name) {
                    self.context.registry.set_display_name(self.id, name).await;
                    self.display_name = Some(name.to_string());
                }
                info!("[{}] {}: {}", self.peer, name, body);
            }
            None => info!("[{}] {}", self.peer, text),
        }

        self.context.publish_chat(ChatLine {
            peer: self.peer,
            text,
        });
    }

    async fn begin_upload(&mut self, name: String) -> Result<(), ConnectionError> {
        let target = match self.resolver.resolve_upload(&name) {
            Ok(path) => {
                let partial_path = self.resolver.partial_path(self.id, &name);
                match fs::File::create(&partial_path).await {
                    Ok(file) => Some(UploadTarget {
                        path,
                        partial_path,
                        file,
                    }),
                    Err(e) => {
                        error!(
                            "Cannot create {:?} for client {}: {}",
                            partial_path, self.peer, e
                        );
                        None
                    }
                }
            }
            Err(reason) => {
                warn!(
                    "Rejecting upload {:?} from {}: {}, discarding payload",
                    name, self.peer, reason
                );
                None
            }
        };

        self.state = SessionState::Receiving {
            name,
            target,
            received: 0,
        };
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ConnectionError> {
        if let SessionState::Receiving {
            target, received, ..
        } = &mut self.state
        {
            if let Some(UploadTarget {
                partial_path, file, ..
            }) = target
            {
                file.write_all(chunk)
                    .await
                    .map_err(|e| FilesystemError::io(partial_path.as_path(), e))?;
            }
            *received += chunk.len() as u64;
        }
        Ok(())
    }

    async fn finish_upload(&mut self) -> Result<(), ConnectionError> {
        let SessionState::Receiving {
            name,
            target,
            received,
        } = std::mem::take(&mut self.state)
        else {
            return Ok(());
        };

        let stored = match target {
            Some(UploadTarget {
                path,
                partial_path,
                mut file,
            }) => {
                file.flush()
                    .await
                    .map_err(|e| FilesystemError::io(partial_path.as_path(), e))?;
                drop(file);
                match fs::rename(&partial_path, &path).await {
                    Ok(()) => {
                        info!(
                            "File received and saved at: {:?} ({} bytes from {})",
                            path, received, self.peer
                        );
                        true
                    }
                    Err(e) => {
                        error!("Cannot move {:?} to {:?}: {}", partial_path, path, e);
                        remove_partial(&partial_path).await;
                        false
                    }
                }
            }
            None => false,
        };

        self.state = SessionState::AwaitHash { name, stored };
        Ok(())
    }

    async fn record_hash(
        &mut self,
        name: String,
        stored: bool,
        message: Message,
    ) -> Result<(), ConnectionError> {
        let parsed = match &message {
            Message::Crc64(value) => parse_crc64(value),
            other => Err(FramingError::InvalidHash(other.to_text())),
        };
        let hash = parsed.unwrap_or_else(|e| {
            error!("Error extracting CRC64 hash from client {}: {}", self.peer, e);
            0
        });
        info!(
            "CRC64 message is {:?} and CRC64 hash is {}",
            message.to_text(),
            hash
        );

        if !stored {
            warn!("Upload {:?} was not stored, skipping ledger record", name);
            return Ok(());
        }
        if let Err(e) = self.context.ledger.append(&name, hash).await {
            error!("Error appending to upload ledger: {}", e);
        }
        Ok(())
    }

    /// Removes the file of an upload cut short by the end of the session.
    pub async fn discard_partial_upload(&mut self) {
        if let SessionState::Receiving {
            name,
            target: Some(UploadTarget {
                partial_path, file, ..
            }),
            received,
        } = std::mem::take(&mut self.state)
        {
            drop(file);
            warn!(
                "Upload {:?} from {} interrupted after {} bytes, removing {:?}",
                name, self.peer, received, partial_path
            );
            remove_partial(&partial_path).await;
        }
    }
}

async fn remove_partial(partial_path: &std::path::Path) {
    if let Err(e) = fs::remove_file(partial_path).await {
        warn!("Cannot remove partial upload {:?}: {}", partial_path, e);
    }
}
