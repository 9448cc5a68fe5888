#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ledgerchat::{Server, ServerConfig, ServerContext};

pub fn test_config(files_dir: &Path) -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        files_dir: files_dir.canonicalize().unwrap(),
        read_timeout: Some(Duration::from_secs(10)),
        max_frame_length: 64 * 1024,
        max_upload_size: 1024 * 1024,
        watch: false,
    }
}

pub async fn start_server(files_dir: &Path) -> (SocketAddr, Arc<ServerContext>) {
    let server = Server::bind(test_config(files_dir)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let context = server.context();
    tokio::spawn(server.run());
    (addr, context)
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
