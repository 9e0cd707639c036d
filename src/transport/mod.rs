//! Outbound transports - how commands reach physical nodes.
//!
//! Wired nodes are driven through a long-lived local helper process
//! ([`helper`]); wireless nodes receive UDP datagrams ([`datagram`]). Both
//! are best-effort: failures are logged where they happen and never surface
//! to the caller that issued the command.

pub mod datagram;
pub mod helper;

pub use datagram::DatagramSender;
pub use helper::{BridgeState, HelperBridge};

use crate::command::Command;
use async_trait::async_trait;
use std::sync::Arc;

/// Seam between the dispatcher and the physical transports. The dispatcher
/// picks the method per node record; tests substitute a recording double.
#[async_trait]
pub trait NodeTransports: Send + Sync {
    /// Deliver a command line to the helper process (wired nodes).
    async fn send_wired(&self, command: &Command);

    /// Deliver a command datagram to a wireless node's address.
    async fn send_wireless(&self, address: &str, command: &Command);

    /// Lifecycle state of the wired transport, for health reporting.
    fn wired_state(&self) -> BridgeState;
}

/// The real transport pair: helper process bridge + UDP sender.
pub struct Transports {
    pub helper: Arc<HelperBridge>,
    pub datagram: DatagramSender,
}

#[async_trait]
impl NodeTransports for Transports {
    async fn send_wired(&self, command: &Command) {
        self.helper.send(command).await;
    }

    async fn send_wireless(&self, address: &str, command: &Command) {
        self.datagram.send(address, command).await;
    }

    fn wired_state(&self) -> BridgeState {
        self.helper.state()
    }
}
