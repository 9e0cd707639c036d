//! Dispatcher - routes channel writes and broadcasts to physical nodes.
//!
//! Every operation commits to the channel buffer first, synchronously, before
//! any I/O: the buffer is the source of truth for "what should be playing"
//! and physical delivery is best effort on top of it. The registry is loaded
//! fresh from disk for every dispatch, so registry edits take effect on the
//! next command.
//!
//! All physical delivery flows through a single worker task consuming an
//! ordered job queue. The original design issued an independent registry load
//! per call, which could reorder deliveries to the same node under rapid
//! writes; the serialized worker delivers in issue order instead (see
//! DESIGN.md).

use crate::bus::{BusEvent, SharedBus};
use crate::command::{Command, EffectParams};
use crate::registry::{NodeRecord, RegistryLoader};
use crate::transport::{BridgeState, NodeTransports};
use crate::universe::{ChannelBuffer, UNIVERSE_CHANNELS};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum JobKind {
    /// Resolve the owning node for one global channel and send `set`.
    Single { channel: u16, value: u8 },
    /// Send the same command to every registered node.
    Broadcast(Command),
}

struct Job {
    kind: JobKind,
    done: oneshot::Sender<()>,
}

/// Cheap health snapshot for operator logging.
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatus {
    pub helper: BridgeState,
    pub registered_nodes: usize,
}

/// Owns the channel buffer and fans commands out to node transports.
pub struct Dispatcher {
    buffer: RwLock<ChannelBuffer>,
    loader: Arc<RegistryLoader>,
    transports: Arc<dyn NodeTransports>,
    bus: SharedBus,
    jobs: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its dispatch worker.
    pub fn new(
        loader: RegistryLoader,
        transports: Arc<dyn NodeTransports>,
        bus: SharedBus,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let loader = Arc::new(loader);
        let (jobs, rx) = mpsc::unbounded_channel();

        {
            let loader = loader.clone();
            let transports = transports.clone();
            tokio::spawn(async move {
                run_worker(rx, loader, transports, shutdown).await;
            });
        }

        Arc::new(Self {
            buffer: RwLock::new(ChannelBuffer::new()),
            loader,
            transports,
            bus,
            jobs,
        })
    }

    /// Write `value` at global `channel`, dispatch to the owning node if one
    /// is registered, and announce the change on the bus.
    pub async fn set_channel(&self, channel: u16, value: u8) {
        self.write_channel(channel, value, true).await;
    }

    /// Same as [`set_channel`](Self::set_channel) without the bus event, for
    /// high-frequency bulk writes that would flood observers.
    pub async fn set_channel_quiet(&self, channel: u16, value: u8) {
        self.write_channel(channel, value, false).await;
    }

    async fn write_channel(&self, channel: u16, value: u8, notify: bool) {
        if channel < 1 || channel as usize > UNIVERSE_CHANNELS {
            warn!(channel, "channel outside universe, write ignored");
            return;
        }

        // Commit before any I/O: buffer state always reflects the most
        // recently issued write in program order.
        self.lock_buffer_mut().set(channel, value);

        if notify {
            self.bus.publish(BusEvent::ChannelChanged { channel, value });
        }

        self.enqueue(JobKind::Single { channel, value }).await;
    }

    /// Send `blackout` to every registered node, then zero the buffer.
    /// Zeroing is unconditional: it happens even if every delivery failed.
    pub async fn blackout(&self) {
        info!("blackout requested");
        self.enqueue(JobKind::Broadcast(Command::Blackout)).await;

        self.lock_buffer_mut().clear();
        self.bus.publish(BusEvent::BufferChanged {
            buffer: self.buffer().to_vec(),
        });
    }

    /// Broadcast an effect to every registered node. The channel and count
    /// parameters are payload for each controller, not a targeting filter;
    /// nodes receive the effect regardless of which channels they own.
    pub async fn effect(&self, name: &str, params: EffectParams) {
        let command = Command::Effect {
            name: name.to_string(),
            channel: params.start_channel.unwrap_or(EffectParams::DEFAULT_CHANNEL),
            count: params.count.unwrap_or(EffectParams::DEFAULT_COUNT),
            speed: params.speed.unwrap_or(EffectParams::DEFAULT_SPEED),
        };
        self.enqueue(JobKind::Broadcast(command)).await;
    }

    /// Independent copy of the current buffer.
    pub fn buffer(&self) -> [u8; UNIVERSE_CHANNELS] {
        self.buffer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .snapshot()
    }

    /// Health snapshot: helper bridge state plus the current node count.
    pub async fn status(&self) -> DispatcherStatus {
        let registry = self.loader.load().await;
        DispatcherStatus {
            helper: self.transports.wired_state(),
            registered_nodes: registry.len(),
        }
    }

    fn lock_buffer_mut(&self) -> std::sync::RwLockWriteGuard<'_, ChannelBuffer> {
        self.buffer
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a dispatch job and wait for the worker to complete it. A dead
    /// worker (shutdown) means physical delivery is skipped; buffer state has
    /// already been committed by the caller.
    async fn enqueue(&self, kind: JobKind) {
        let (done, done_rx) = oneshot::channel();
        if self.jobs.send(Job { kind, done }).is_err() {
            warn!("dispatch worker stopped, physical delivery skipped");
            return;
        }
        let _ = done_rx.await;
    }
}

/// Single serialized dispatch worker: jobs are completed strictly in queue
/// order, so commands addressed to the same node arrive in issue order.
async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Job>,
    loader: Arc<RegistryLoader>,
    transports: Arc<dyn NodeTransports>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("dispatch worker shutting down");
                break;
            }
            job = rx.recv() => {
                let Some(job) = job else { break };

                let registry = loader.load().await;
                match job.kind {
                    JobKind::Single { channel, value } => {
                        match registry.resolve(channel) {
                            Some((node_id, record, local)) => {
                                let command = Command::Set {
                                    channel: local,
                                    value,
                                };
                                deliver(transports.as_ref(), node_id, record, &command).await;
                            }
                            None => {
                                debug!(channel, "no node owns channel, dispatch skipped");
                            }
                        }
                    }
                    JobKind::Broadcast(command) => {
                        for (node_id, record) in registry.iter() {
                            deliver(transports.as_ref(), node_id, record, &command).await;
                        }
                    }
                }

                let _ = job.done.send(());
            }
        }
    }
}

async fn deliver(
    transports: &dyn NodeTransports,
    node_id: &str,
    record: &NodeRecord,
    command: &Command,
) {
    if record.is_wired() {
        debug!(node_id, "dispatching via helper process");
        transports.send_wired(command).await;
    } else if let Some(address) = record.address.as_deref() {
        debug!(node_id, address, "dispatching via datagram");
        transports.send_wireless(address, command).await;
    } else {
        warn!(node_id, "wireless node has no address, dropping command");
    }
}
