//! Public API facade.
//!
//! [`SerialApi`] is the stable entry point callers use. It owns the
//! connection registry and the port enumerator and dispatches each call onto
//! them; beyond its serial settings it keeps no other state.
//!
//! # Architecture
//!
//! ```text
//! JSON bridge ─┐
//! Rust caller ─┴──> SerialApi ──> ConnectionRegistry ──> Connection ──> SerialTransport
//!                       └──────> PortEnumerator ──> HostEnumeration
//! ```
//!
//! Every operation is an `async fn`; its awaited value is the completion and
//! is produced exactly once. Transport failures come back as sentinels
//! (`-1`, `false`); only unknown ids and failed opens are `Err`.

use crate::config::SerialConfig;
use crate::enumerator::PortEnumerator;
use crate::error::{ApiError, ApiResult};
use crate::port::{HostEnumeration, SystemSerial, TransportFactory, TransportSettings};
use crate::registry::{ConnectionRegistry, PendingOpen};
use crate::types::{
    ConnectionId, ControlSignalOptions, OpenInfo, OpenOptions, ReadInfo, WriteInfo,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Connection-handle based serial API.
#[derive(Debug)]
pub struct SerialApi {
    registry: ConnectionRegistry,
    enumerator: PortEnumerator,
    config: SerialConfig,
}

impl SerialApi {
    /// Create an API over the given transport and enumeration collaborators.
    pub fn new(factory: Arc<dyn TransportFactory>, host: Arc<dyn HostEnumeration>) -> Self {
        Self {
            registry: ConnectionRegistry::new(factory),
            enumerator: PortEnumerator::new(host),
            config: SerialConfig::default(),
        }
    }

    /// Create an API over the host's real serial ports.
    pub fn system(config: &SerialConfig) -> Self {
        let backend = Arc::new(SystemSerial::new(TransportSettings::from(config)));
        Self::new(backend.clone(), backend).with_config(config.clone())
    }

    /// Serial settings; `open` resolves port names through its aliases.
    pub fn with_config(mut self, config: SerialConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// The registry, for callers that feed or inspect connections directly.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Available port names, in reverse host order.
    pub async fn get_ports(&self) -> Vec<String> {
        self.enumerator.list_ports().await
    }

    /// Open `port_name` and wait for the transport to report it open.
    ///
    /// If the transport fails instead, the id it was given is released and
    /// never handed out again.
    pub async fn open(&self, port_name: &str, options: OpenOptions) -> ApiResult<OpenInfo> {
        let pending = self.begin_open(port_name, &options)?;
        self.finish_open(pending).await
    }

    /// First half of [`open`](Self::open): resolve the alias, register the
    /// connection and start the transport. Does not wait.
    pub fn begin_open(&self, port_name: &str, options: &OpenOptions) -> ApiResult<PendingOpen> {
        let port = self.config.resolve_port(port_name);
        self.registry.allocate(&port, options)
    }

    /// Second half of [`open`](Self::open): wait for the transport's outcome.
    pub async fn finish_open(&self, pending: PendingOpen) -> ApiResult<OpenInfo> {
        let id = pending.id();
        let port = pending.port_name().to_string();
        match pending.opened().await {
            Ok(info) => Ok(info),
            Err(source) => {
                let _ = self.registry.release(id);
                Err(ApiError::TransportOpen { port, source })
            }
        }
    }

    /// Close a connection. Always `true` for a registered id, even when the
    /// transport fails to close.
    pub async fn close(&self, id: ConnectionId) -> ApiResult<bool> {
        let connection = self.registry.release(id)?;
        connection.close().await;
        Ok(true)
    }

    /// Take up to `bytes_to_read` buffered bytes.
    pub async fn read(&self, id: ConnectionId, bytes_to_read: usize) -> ApiResult<ReadInfo> {
        Ok(self.registry.resolve(id)?.read(bytes_to_read))
    }

    /// Write `data`; `bytes_written` is `-1` if the transport failed.
    pub async fn write(&self, id: ConnectionId, data: &[u8]) -> ApiResult<WriteInfo> {
        let connection = self.registry.resolve(id)?;
        Ok(connection.write(data).await)
    }

    /// Discard pending device buffers; `false` if the transport failed.
    pub async fn flush(&self, id: ConnectionId) -> ApiResult<bool> {
        let connection = self.registry.resolve(id)?;
        Ok(connection.flush().await)
    }

    /// Control lines are not read from hardware; always the defaults.
    pub async fn get_control_signals(&self, id: ConnectionId) -> ApiResult<ControlSignalOptions> {
        self.registry.resolve(id)?;
        warn!(connection = %id, "NOT IMPLEMENTED: getControlSignals");
        Ok(ControlSignalOptions::default())
    }

    /// Control lines are not driven; accepted and ignored.
    pub async fn set_control_signals(
        &self,
        id: ConnectionId,
        options: ControlSignalOptions,
    ) -> ApiResult<bool> {
        self.registry.resolve(id)?;
        warn!(connection = %id, ?options, "NOT IMPLEMENTED: setControlSignals");
        Ok(true)
    }

    /// Close every open connection.
    pub async fn shutdown(&self) {
        let open = self.registry.len();
        self.registry.close_all().await;
        info!(closed = open, "serial API shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialHost;
    use std::collections::HashMap;

    fn create_test_api(host: &MockSerialHost) -> SerialApi {
        SerialApi::new(Arc::new(host.clone()), Arc::new(host.clone()))
    }

    #[tokio::test]
    async fn test_open_uses_alias() {
        let host = MockSerialHost::new();
        let mut aliases = HashMap::new();
        aliases.insert("gps".to_string(), "/dev/ttyUSB3".to_string());
        let api = create_test_api(&host).with_config(SerialConfig {
            port_aliases: aliases,
            ..SerialConfig::default()
        });

        api.open("gps", OpenOptions::default()).await.unwrap();
        assert_eq!(host.last_opened().unwrap().name(), "/dev/ttyUSB3");

        api.open("COM2", OpenOptions::default()).await.unwrap();
        assert_eq!(host.last_opened().unwrap().name(), "COM2");
    }

    #[tokio::test]
    async fn test_begin_open_registers_before_transport_opens() {
        let host = MockSerialHost::new();
        host.set_auto_open(false);
        let api = create_test_api(&host);

        let pending = api.begin_open("SLOW", &OpenOptions::default()).unwrap();
        let id = pending.id();
        assert_eq!(api.registry().ids(), vec![id]);
        assert_eq!(api.read(id, 4).await.unwrap(), ReadInfo::empty());

        host.last_opened().unwrap().signal_open();
        let info = api.finish_open(pending).await.unwrap();
        assert_eq!(info.connection_id, id);
    }

    #[tokio::test]
    async fn test_open_failure_releases_id() {
        let host = MockSerialHost::new();
        host.fail_open("COM9");
        let api = create_test_api(&host);

        let err = api.open("COM9", OpenOptions::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::TransportOpen { ref port, .. } if port == "COM9"));
        assert!(api.registry().is_empty());

        let info = api.open("COM1", OpenOptions::default()).await.unwrap();
        assert_eq!(info.connection_id, ConnectionId::new(2));
    }

    #[tokio::test]
    async fn test_operations_on_unknown_id() {
        let host = MockSerialHost::new();
        let api = create_test_api(&host);
        let id = ConnectionId::new(7);

        assert!(matches!(api.read(id, 1).await, Err(ApiError::UnknownConnection(_))));
        assert!(matches!(api.write(id, b"x").await, Err(ApiError::UnknownConnection(_))));
        assert!(matches!(api.flush(id).await, Err(ApiError::UnknownConnection(_))));
        assert!(matches!(api.close(id).await, Err(ApiError::UnknownConnection(_))));
        assert!(matches!(
            api.get_control_signals(id).await,
            Err(ApiError::UnknownConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let host = MockSerialHost::new();
        let api = create_test_api(&host);
        api.open("A", OpenOptions::default()).await.unwrap();
        api.open("B", OpenOptions::default()).await.unwrap();

        api.shutdown().await;
        assert!(api.registry().is_empty());
        assert!(host.opened().iter().all(|p| p.is_closed()));
    }
}
