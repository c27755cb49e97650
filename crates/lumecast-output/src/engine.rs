//! The output engine: write path, routing table and transmit loop in one
//! place.
//!
//! Collaborators (API layers, admin tooling) talk to [`OutputEngine`] and
//! nothing else: mutations go through it, state queries come from it, and
//! it owns the lifecycle of the background transmit task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lumecast_core::{
    ChangeEvent, ChannelChange, CreatePolicy, StageError, UniverseId, UniverseManager,
    DMX_CHANNELS,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{OutputError, Result};
use crate::nodes::{NodeConfig, NodeRegistry};
use crate::scheduler::{TransmitLoop, TransmitStats};

/// Highest refresh rate the engine accepts, in Hz.
///
/// DMX512 itself tops out around 44 full frames per second, so higher rates
/// would only burn bandwidth without changing what fixtures can show.
pub const MAX_REFRESH_RATE: u32 = 44;

/// Default refresh rate in Hz.
pub const DEFAULT_REFRESH_RATE: u32 = 40;

/// Output engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Local address the transmit socket binds to.
    pub bind_address: SocketAddr,
    /// Transmit refresh rate in Hz (1-44).
    pub refresh_rate: u32,
    /// Per-node send timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Send one final all-zero frame to every node during shutdown.
    pub blackout_on_shutdown: bool,
    /// Whether writes may create universes implicitly.
    pub create_policy: CreatePolicy,
    /// Capacity of the change event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 0)),
            refresh_rate: DEFAULT_REFRESH_RATE,
            send_timeout_ms: 5,
            blackout_on_shutdown: false,
            create_policy: CreatePolicy::default(),
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Creates a config with the given refresh rate and defaults elsewhere.
    pub fn new(refresh_rate: u32) -> Self {
        Self {
            refresh_rate,
            ..Self::default()
        }
    }

    /// Sets the local bind address.
    pub fn with_bind_address(mut self, bind_address: SocketAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    /// Sets the per-node send timeout in milliseconds.
    pub fn with_send_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.send_timeout_ms = timeout_ms;
        self
    }

    /// Enables or disables the final shutdown blackout frame.
    pub fn with_blackout_on_shutdown(mut self, enabled: bool) -> Self {
        self.blackout_on_shutdown = enabled;
        self
    }

    /// Sets the universe creation policy.
    pub fn with_create_policy(mut self, policy: CreatePolicy) -> Self {
        self.create_policy = policy;
        self
    }

    /// Sets the change event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Duration of one transmit tick.
    ///
    /// Clamps a zero rate to 1 Hz: the fields are public, so a config that
    /// skipped [`validate`](Self::validate) must not panic here.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate.max(1) as f64)
    }

    /// Per-node send timeout.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Validates rate and capacity bounds.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_rate == 0 || self.refresh_rate > MAX_REFRESH_RATE {
            return Err(OutputError::InvalidRefreshRate(self.refresh_rate));
        }
        if self.event_capacity == 0 {
            return Err(OutputError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The Art-Net output engine.
///
/// Mutations are synchronous, in-memory and safe to call from any thread;
/// transmission happens on its own fixed cadence in a background task, so a
/// burst of writes never produces a burst of packets.
#[derive(Debug)]
pub struct OutputEngine {
    config: EngineConfig,
    manager: Arc<UniverseManager>,
    registry: Arc<NodeRegistry>,
    stats: Arc<RwLock<TransmitStats>>,
    events: broadcast::Sender<ChangeEvent>,
    socket: Option<Arc<UdpSocket>>,
    loop_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl OutputEngine {
    /// Creates a stopped engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            manager: Arc::new(UniverseManager::new(config.create_policy)),
            registry: Arc::new(NodeRegistry::new()),
            stats: Arc::new(RwLock::new(TransmitStats::default())),
            events,
            socket: None,
            loop_handle: None,
            shutdown_tx: None,
            config,
        })
    }

    /// Binds the transmit socket and starts the transmit loop. Idempotent.
    pub async fn start(&mut self) -> Result<()> {
        if self.loop_handle.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind(self.config.bind_address).await?;
        socket.set_broadcast(true)?;
        let socket = Arc::new(socket);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transmit = TransmitLoop::new(
            Arc::clone(&socket),
            Arc::clone(&self.manager),
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
            &self.config,
        );
        self.loop_handle = Some(tokio::spawn(transmit.run(shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        self.socket = Some(socket);

        info!(
            rate_hz = self.config.refresh_rate,
            local_addr = ?self.local_addr(),
            "output engine started"
        );
        Ok(())
    }

    /// Signals the transmit loop, waits for it to finish (including the
    /// optional final blackout frame) and releases the socket. Idempotent.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.loop_handle.take() else {
            return;
        };
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Err(e) = handle.await {
            warn!(error = %e, "transmit loop ended abnormally");
        }
        self.socket = None;
        info!("output engine stopped");
    }

    /// Whether the transmit loop is active.
    pub fn is_running(&self) -> bool {
        self.loop_handle.is_some()
    }

    /// Local address of the bound transmit socket, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    // --- Mutations ---

    /// Sets one channel and notifies change subscribers.
    pub fn set_channel(&self, universe: UniverseId, channel: u16, value: u8) -> Result<()> {
        let change = self.manager.set_channel(universe, channel, value)?;
        self.publish(universe, vec![change]);
        Ok(())
    }

    /// Applies an atomic batch of writes and notifies change subscribers.
    pub fn set_channels(&self, universe: UniverseId, writes: &[(u16, u8)]) -> Result<()> {
        let changes = self.manager.set_channels(universe, writes)?;
        if !changes.is_empty() {
            self.publish(universe, changes);
        }
        Ok(())
    }

    /// Zeroes all channels of a universe and notifies change subscribers.
    pub fn blackout(&self, universe: UniverseId) -> Result<()> {
        let changes = self.manager.blackout(universe)?;
        self.publish(universe, changes);
        Ok(())
    }

    fn publish(&self, universe: UniverseId, changes: Vec<ChannelChange>) {
        // Best-effort: an error only means nobody is subscribed right now.
        let _ = self.events.send(ChangeEvent::new(universe, changes));
    }

    // --- Queries ---

    /// Reads one channel's current value.
    pub fn channel(&self, universe: UniverseId, channel: u16) -> Result<u8> {
        Ok(self.manager.channel(universe, channel)?)
    }

    /// Takes an atomic snapshot of a universe's 512 channels.
    pub fn snapshot(&self, universe: UniverseId) -> Result<[u8; DMX_CHANNELS]> {
        Ok(self.manager.snapshot(universe)?)
    }

    // --- Universe management ---

    /// Creates a universe up front. Returns false if it already existed.
    pub fn create_universe(&self, universe: UniverseId) -> bool {
        self.manager.create_universe(universe)
    }

    /// Removes a universe and its retained state.
    pub fn remove_universe(&self, universe: UniverseId) -> bool {
        self.manager.remove_universe(universe)
    }

    /// All existing universes, sorted.
    pub fn universe_ids(&self) -> Vec<UniverseId> {
        self.manager.universe_ids()
    }

    // --- Node management ---

    /// Subscribes a node endpoint to a universe.
    ///
    /// Under the implicit creation policy the universe is created on first
    /// registration, so the node starts receiving dark frames right away.
    /// Under the explicit policy the universe must already exist.
    pub fn register_node(&self, universe: UniverseId, endpoint: SocketAddr) -> Result<bool> {
        if !self.manager.contains(universe) {
            match self.manager.policy() {
                CreatePolicy::Implicit => {
                    self.manager.create_universe(universe);
                }
                CreatePolicy::Explicit => {
                    return Err(OutputError::Stage(StageError::UnknownUniverse { universe }));
                }
            }
        }
        let added = self.registry.register(universe, endpoint);
        if added {
            info!(%universe, %endpoint, "node subscribed");
        }
        Ok(added)
    }

    /// Removes a node's subscription to a universe.
    pub fn unregister_node(&self, universe: UniverseId, endpoint: SocketAddr) -> bool {
        self.registry.unregister(universe, endpoint)
    }

    /// Endpoints currently subscribed to a universe.
    pub fn nodes_for(&self, universe: UniverseId) -> Vec<SocketAddr> {
        self.registry.nodes_for(universe)
    }

    /// Applies one declarative node entry, subscribing the node to each of
    /// its universes. Returns how many subscriptions were newly added.
    pub fn apply_node_config(&self, node: &NodeConfig) -> Result<usize> {
        let endpoint = node.socket_addr()?;
        let mut added = 0;
        for &raw in &node.universes {
            let universe = UniverseId::new(raw)?;
            if self.register_node(universe, endpoint)? {
                added += 1;
            }
        }
        Ok(added)
    }

    // --- Observation ---

    /// Subscribes to committed-change events.
    ///
    /// Delivery is best-effort: a consumer that falls more than the channel
    /// capacity behind loses the oldest events, never the newest.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Copies the current transmit counters.
    pub fn stats(&self) -> TransmitStats {
        *self.stats.read()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
