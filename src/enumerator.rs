//! Port enumeration.

use crate::port::HostEnumeration;
use std::sync::Arc;
use tracing::{debug, error};

/// Lists host ports in reverse host order.
#[derive(Clone)]
pub struct PortEnumerator {
    host: Arc<dyn HostEnumeration>,
}

impl PortEnumerator {
    pub fn new(host: Arc<dyn HostEnumeration>) -> Self {
        Self { host }
    }

    /// Port names, last-enumerated first.
    ///
    /// An enumeration failure is logged and yields an empty list.
    pub async fn list_ports(&self) -> Vec<String> {
        debug!("Getting list of ports");
        match self.host.available_ports().await {
            Ok(mut ports) => {
                ports.reverse();
                for port in &ports {
                    debug!(port = %port, "found port");
                }
                ports
            }
            Err(e) => {
                error!("Failed to enumerate ports: {}", e);
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for PortEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortEnumerator").finish_non_exhaustive()
    }
}
