use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::error::FilesystemError;
use crate::ledger::AppendLog;
use crate::registry::ConnectionRegistry;
use crate::session::handle_connection;
use crate::watcher;

const CHAT_FEED_CAPACITY: usize = 1024;

/// A chat line as received by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub peer: SocketAddr,
    pub text: String,
}

/// State shared by the accept loop and every session task.
#[derive(Debug)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub registry: ConnectionRegistry,
    pub ledger: AppendLog,
    chat_feed: broadcast::Sender<ChatLine>,
}

impl ServerContext {
    pub async fn new(config: ServerConfig) -> Result<Self, FilesystemError> {
        let ledger = AppendLog::open(&config.files_dir).await?;
        let (chat_feed, _) = broadcast::channel(CHAT_FEED_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            registry: ConnectionRegistry::new(),
            ledger,
            chat_feed,
        })
    }

    /// Chat lines from every session, in per-session arrival order.
    pub fn subscribe_chat(&self) -> broadcast::Receiver<ChatLine> {
        self.chat_feed.subscribe()
    }

    pub(crate) fn publish_chat(&self, line: ChatLine) {
        // Nessun iscritto: la riga viene solo registrata nel log
        let _ = self.chat_feed.send(line);
    }
}

pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let addr = config.listen_addr;
        let context = ServerContext::new(config)
            .await
            .context("Failed to prepare the upload ledger")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to listen on {addr}"))?;

        Ok(Self {
            listener,
            context: Arc::new(context),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        self.context.clone()
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self) -> anyhow::Result<()> {
        let _observer = if self.context.config.watch {
            watcher::spawn_observer(self.context.config.files_dir.clone())
        } else {
            None
        };

        info!("*********** Server Started *********");
        info!(
            "Listening on {}, files directory {:?}",
            self.local_addr()?,
            self.context.config.files_dir
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    tokio::spawn(handle_connection(self.context.clone(), stream, peer));
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    // Evita un ciclo stretto se i descrittori sono esauriti
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}
