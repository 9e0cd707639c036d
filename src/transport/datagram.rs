//! Datagram transport - the wireless-node transport.
//!
//! Each command is one JSON datagram to the node's address on the well-known
//! wireless command port. Fire-and-forget by design: no acknowledgement is
//! read back, failed sends are logged with the target and dropped, and no
//! retry is attempted. Operators notice problems through logs or through
//! fixtures visibly not responding, never through a rejected call.

use crate::command::Command;
use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Sends command records to wireless nodes over UDP.
pub struct DatagramSender {
    socket: UdpSocket,
    port: u16,
}

impl DatagramSender {
    /// Bind the outbound socket to an ephemeral local port. `port` is the
    /// destination port every wireless node listens on.
    pub async fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .context("binding outbound datagram socket")?;
        Ok(Self { socket, port })
    }

    /// Destination port for wireless nodes.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send one command to `address`. Errors are logged, never returned.
    pub async fn send(&self, address: &str, command: &Command) {
        let payload = match serde_json::to_vec(command) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize command for datagram");
                return;
            }
        };

        match self.socket.send_to(&payload, (address, self.port)).await {
            Ok(bytes) => debug!(address, port = self.port, bytes, "datagram sent"),
            Err(e) => warn!(address, port = self.port, error = %e, "datagram send failed"),
        }
    }
}
