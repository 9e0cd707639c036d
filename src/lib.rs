//! DMX Bridge - universe channel router and dual-transport device dispatcher.
//!
//! This library owns an in-memory model of one lighting-control universe
//! (512 8-bit channels), resolves which physical controller ("node") is
//! responsible for any given channel, and delivers commands to that
//! controller over one of two transports:
//! - a persistent local helper process for wired controllers
//! - fire-and-forget UDP datagrams for wireless controllers
//!
//! The channel buffer is the source of truth for "what should be playing";
//! physical delivery is best effort. A registry, transport, or helper-process
//! failure never rejects a caller's write.

// Deny truly dangerous patterns (these will fail the build)
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod bus;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod registry;
pub mod transport;
pub mod universe;

pub use bus::{create_bus, BusEvent, SharedBus};
pub use command::{Command, EffectParams};
pub use dispatcher::{Dispatcher, DispatcherStatus};
pub use registry::{NodeRecord, NodeRegistry, NodeType, RegistryError, RegistryLoader};
pub use transport::{BridgeState, DatagramSender, HelperBridge, NodeTransports, Transports};
pub use universe::{ChannelBuffer, UNIVERSE_CHANNELS};
