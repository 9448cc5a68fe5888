use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

pub type SessionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: SessionId,
    pub peer: SocketAddr,
    /// Self-declared by the client through its chat lines, never verified.
    pub display_name: Option<String>,
}

/// Active connections, shared by every session task.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<SessionId, ConnectionInfo>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, peer: SocketAddr) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut connections = self.connections.lock().await;
        connections.insert(
            id,
            ConnectionInfo {
                id,
                peer,
                display_name: None,
            },
        );
        id
    }

    /// Returns `false` when `id` was not registered (or already removed).
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut connections = self.connections.lock().await;
        connections.remove(&id).is_some()
    }

    pub async fn set_display_name(&self, id: SessionId, name: &str) {
        let mut connections = self.connections.lock().await;
        if let Some(info) = connections.get_mut(&id) {
            info.display_name = Some(name.to_string());
        }
    }

    pub async fn snapshot(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.lock().await;
        let mut infos: Vec<ConnectionInfo> = connections.values().cloned().collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn register_and_unregister_once() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(peer(1000)).await;
        let second = registry.register(peer(1001)).await;
        assert_ne!(first, second);
        assert_eq!(registry.len().await, 2);

        assert!(registry.unregister(first).await);
        assert!(!registry.unregister(first).await);
        assert_eq!(registry.snapshot().await[0].peer, peer(1001));
    }

    #[tokio::test]
    async fn display_name_is_recorded() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(peer(2000)).await;
        registry.set_display_name(id, "alice").await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot[0].display_name.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn concurrent_registration() {
        let registry = ConnectionRegistry::new();
        let mut tasks = Vec::new();
        for port in 0..50u16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let id = registry.register(peer(3000 + port)).await;
                if port % 2 == 0 {
                    registry.unregister(id).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len().await, 25);
    }
}
