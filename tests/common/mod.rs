//! Shared test utilities for the serial handle API tests.

#![allow(dead_code)]

use serial_handle_api::{ConnectionId, MockSerialHost, SerialApi};
use std::sync::Arc;
use std::time::Duration;

/// Create an API over a mock host enumerating `ports` in this order.
pub fn create_mock_api(ports: &[&str]) -> (SerialApi, MockSerialHost) {
    let host = MockSerialHost::with_ports(ports.iter().copied());
    let api = SerialApi::new(Arc::new(host.clone()), Arc::new(host.clone()));
    (api, host)
}

/// Wait until the connection has buffered at least `len` bytes.
///
/// Inbound data travels through the connection's pump task, so a test that
/// pushes bytes into a mock port has to let that task run before reading.
pub async fn wait_for_buffered(api: &SerialApi, id: ConnectionId, len: usize) {
    for _ in 0..200 {
        let connection = api
            .registry()
            .resolve(id)
            .unwrap_or_else(|e| panic!("connection {} vanished: {}", id, e));
        if connection.buffered_len() >= len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("connection {} never buffered {} bytes", id, len);
}
