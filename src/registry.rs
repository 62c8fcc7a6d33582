//! Connection registry: id allocation and id -> connection dispatch.

use crate::connection::{Connection, OpenSignal};
use crate::error::{ApiError, ApiResult};
use crate::port::{PortError, TransportFactory};
use crate::types::{ConnectionId, OpenInfo, OpenOptions};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// An allocated connection whose transport may still be opening.
#[derive(Debug)]
pub struct PendingOpen {
    id: ConnectionId,
    port_name: String,
    signal: OpenSignal,
}

impl PendingOpen {
    /// The id, usable before the transport has opened.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Wait for the transport's open event.
    pub async fn opened(self) -> Result<OpenInfo, PortError> {
        match self.signal.await {
            Ok(Ok(())) => Ok(OpenInfo {
                connection_id: self.id,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PortError::Closed),
        }
    }
}

/// Owns every live [`Connection`], keyed by id.
///
/// Ids start at 1 and are never reused, so a stale id from a closed
/// connection can't alias a new one. Once `u32::MAX` has been issued,
/// allocation fails with [`ApiError::IdsExhausted`]. Dropping the registry
/// drops every connection, which stops its pump and releases its transport.
pub struct ConnectionRegistry {
    factory: Arc<dyn TransportFactory>,
    next_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            next_id: AtomicU64::new(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection and start opening its transport.
    ///
    /// Must be called within a Tokio runtime.
    pub fn allocate(&self, port_name: &str, options: &OpenOptions) -> ApiResult<PendingOpen> {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = u32::try_from(raw)
            .map(ConnectionId::new)
            .map_err(|_| ApiError::IdsExhausted)?;

        let mut connections = self.connections.write();
        let Entry::Vacant(slot) = connections.entry(id) else {
            return Err(ApiError::IdsExhausted);
        };
        let opened = self.factory.open(port_name, options);
        let (connection, signal) = Connection::start(id, port_name, opened);
        slot.insert(Arc::new(connection));
        drop(connections);

        debug!(connection = %id, port = port_name, "allocated");
        Ok(PendingOpen {
            id,
            port_name: port_name.to_string(),
            signal,
        })
    }

    /// Look up a registered connection.
    pub fn resolve(&self, id: ConnectionId) -> ApiResult<Arc<Connection>> {
        self.connections
            .read()
            .get(&id)
            .cloned()
            .ok_or(ApiError::UnknownConnection(id))
    }

    /// Remove a connection from the registry and hand it back.
    ///
    /// Releasing the same id twice fails the second time.
    pub fn release(&self, id: ConnectionId) -> ApiResult<Arc<Connection>> {
        self.connections
            .write()
            .remove(&id)
            .ok_or(ApiError::UnknownConnection(id))
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Close and remove every connection.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.connections.write().drain().map(|(_, c)| c).collect();
        futures::future::join_all(drained.iter().map(|c| c.close())).await;
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("connections", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialHost;

    fn registry(host: &MockSerialHost) -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(host.clone()))
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let host = MockSerialHost::new();
        let registry = registry(&host);

        let first = registry.allocate("A", &OpenOptions::default()).unwrap();
        let second = registry.allocate("B", &OpenOptions::default()).unwrap();
        assert_eq!(first.id(), ConnectionId::new(1));
        assert_eq!(second.id(), ConnectionId::new(2));
        assert_eq!(registry.ids(), vec![first.id(), second.id()]);
    }

    #[tokio::test]
    async fn test_pending_open_resolves_to_open_info() {
        let host = MockSerialHost::new();
        let registry = registry(&host);

        let pending = registry
            .allocate("COM1", &OpenOptions::with_bitrate(9600))
            .unwrap();
        assert_eq!(pending.port_name(), "COM1");
        let info = pending.opened().await.unwrap();
        assert_eq!(info.connection_id, ConnectionId::new(1));
    }

    #[tokio::test]
    async fn test_resolve_unknown() {
        let host = MockSerialHost::new();
        let registry = registry(&host);
        assert!(matches!(
            registry.resolve(ConnectionId::new(42)),
            Err(ApiError::UnknownConnection(id)) if id.get() == 42
        ));
    }

    #[tokio::test]
    async fn test_release_twice() {
        let host = MockSerialHost::new();
        let registry = registry(&host);
        let id = registry.allocate("A", &OpenOptions::default()).unwrap().id();

        assert!(registry.release(id).is_ok());
        assert!(matches!(
            registry.release(id),
            Err(ApiError::UnknownConnection(_))
        ));
        assert!(registry.resolve(id).is_err());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_release() {
        let host = MockSerialHost::new();
        let registry = registry(&host);
        let first = registry.allocate("A", &OpenOptions::default()).unwrap().id();
        registry.release(first).unwrap();

        let second = registry.allocate("A", &OpenOptions::default()).unwrap().id();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let host = MockSerialHost::new();
        let registry = registry(&host);
        registry.allocate("A", &OpenOptions::default()).unwrap();
        registry.allocate("B", &OpenOptions::default()).unwrap();

        registry.close_all().await;
        assert!(registry.is_empty());
        assert!(host.opened().iter().all(|p| p.is_closed()));
    }

    #[tokio::test]
    async fn test_exhausted_ids_never_wrap_onto_live_connections() {
        let host = MockSerialHost::new();
        let registry = registry(&host);
        let live = registry.allocate("A", &OpenOptions::default()).unwrap().id();

        registry.next_id.store(u64::from(u32::MAX), Ordering::Relaxed);
        let last = registry.allocate("B", &OpenOptions::default()).unwrap().id();
        assert_eq!(last, ConnectionId::new(u32::MAX));

        assert!(matches!(
            registry.allocate("C", &OpenOptions::default()),
            Err(ApiError::IdsExhausted)
        ));
        assert!(matches!(
            registry.allocate("D", &OpenOptions::default()),
            Err(ApiError::IdsExhausted)
        ));

        assert_eq!(registry.ids(), vec![live, last]);
        assert_eq!(registry.resolve(live).unwrap().port_name(), "A");
        assert_eq!(host.opened().len(), 2);
    }
}
