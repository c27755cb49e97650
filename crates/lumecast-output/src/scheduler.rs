//! Fixed-rate Art-Net transmit loop.
//!
//! DMX receivers expect a continuous refresh signal: silence longer than a
//! receiver-defined timeout (commonly around one second) can blackout
//! fixtures or revert them to defaults. The loop here transmits every tick
//! whether or not any channel changed, and keeps its cadence anchored so a
//! slow tick never shifts the schedule.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lumecast_core::{UniverseId, UniverseManager, DMX_CHANNELS};
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use crate::artnet::ArtDmx;
use crate::engine::EngineConfig;
use crate::nodes::NodeRegistry;

/// Counters describing transmit behavior since engine start.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmitStats {
    /// Completed scheduler ticks.
    pub ticks: u64,
    /// Datagrams handed to the socket successfully.
    pub frames_sent: u64,
    /// Per-node send failures and timeouts.
    pub send_errors: u64,
    /// Ticks whose work exceeded the tick period.
    pub overruns: u64,
}

/// Transmit loop state, owned by the spawned scheduler task.
pub(crate) struct TransmitLoop {
    socket: Arc<UdpSocket>,
    manager: Arc<UniverseManager>,
    registry: Arc<NodeRegistry>,
    stats: Arc<RwLock<TransmitStats>>,
    period: Duration,
    send_timeout: Duration,
    blackout_on_shutdown: bool,
}

impl TransmitLoop {
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        manager: Arc<UniverseManager>,
        registry: Arc<NodeRegistry>,
        stats: Arc<RwLock<TransmitStats>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            socket,
            manager,
            registry,
            stats,
            period: config.tick_period(),
            send_timeout: config.send_timeout(),
            blackout_on_shutdown: config.blackout_on_shutdown,
        }
    }

    /// Runs until the shutdown signal flips to true or its sender is dropped.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.period);
        // A late tick must not shift the cadence anchor; missed ticks
        // surface as a lower effective refresh rate instead.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.tick().await;
                    let busy = started.elapsed();
                    {
                        let mut stats = self.stats.write();
                        stats.ticks += 1;
                        if busy > self.period {
                            stats.overruns += 1;
                        }
                    }
                    if busy > self.period {
                        warn!(
                            busy_ms = busy.as_millis() as u64,
                            period_ms = self.period.as_millis() as u64,
                            "transmit tick overran its period, refresh rate degraded"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if self.blackout_on_shutdown {
            self.send_blackout().await;
        }
    }

    /// Sends one frame per routed universe to every subscribed node.
    async fn tick(&self) {
        let mut sends = Vec::new();
        for universe in self.registry.universes() {
            let endpoints = self.registry.nodes_for(universe);
            if endpoints.is_empty() {
                continue;
            }
            let Some((sequence, channels)) = self.manager.next_frame(universe) else {
                trace!(%universe, "universe has subscribed nodes but no state, skipping");
                continue;
            };
            let payload = Arc::new(ArtDmx::new(universe, sequence, channels).encode());
            for endpoint in endpoints {
                sends.push(self.send_frame(universe, Arc::clone(&payload), endpoint));
            }
        }
        join_all(sends).await;
    }

    /// One datagram to one node, bounded by the per-send timeout so a stuck
    /// node cannot hold up the rest of the tick.
    async fn send_frame(&self, universe: UniverseId, payload: Arc<Vec<u8>>, endpoint: SocketAddr) {
        match time::timeout(self.send_timeout, self.socket.send_to(&payload, endpoint)).await {
            Ok(Ok(_)) => {
                self.stats.write().frames_sent += 1;
                trace!(%universe, %endpoint, "sent ArtDmx frame");
            }
            Ok(Err(e)) => {
                self.stats.write().send_errors += 1;
                warn!(%universe, %endpoint, error = %e, "node send failed, retrying next tick");
            }
            Err(_) => {
                self.stats.write().send_errors += 1;
                warn!(%universe, %endpoint, "node send timed out, retrying next tick");
            }
        }
    }

    /// Final dark frame to every subscribed node before the loop returns.
    async fn send_blackout(&self) {
        let mut sends = Vec::new();
        for universe in self.registry.universes() {
            let endpoints = self.registry.nodes_for(universe);
            if endpoints.is_empty() {
                continue;
            }
            let Some((sequence, _)) = self.manager.next_frame(universe) else {
                continue;
            };
            let payload = Arc::new(ArtDmx::new(universe, sequence, [0u8; DMX_CHANNELS]).encode());
            for endpoint in endpoints {
                sends.push(self.send_frame(universe, Arc::clone(&payload), endpoint));
            }
        }
        join_all(sends).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_loop(socket: Arc<UdpSocket>) -> TransmitLoop {
        TransmitLoop {
            socket,
            manager: Arc::new(UniverseManager::default()),
            registry: Arc::new(NodeRegistry::new()),
            stats: Arc::new(RwLock::new(TransmitStats::default())),
            period: Duration::from_millis(25),
            send_timeout: Duration::from_millis(5),
            blackout_on_shutdown: false,
        }
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown_signal() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(idle_loop(socket).run(rx));

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("transmit loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_loop_stops_when_shutdown_sender_drops() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(idle_loop(socket).run(rx));

        drop(tx);
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("transmit loop did not stop")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_overrun_is_counted_without_stopping_the_loop() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        // Even an idle tick's bookkeeping outlasts a nanosecond period, so
        // every tick overruns.
        let transmit = TransmitLoop {
            period: Duration::from_nanos(1),
            ..idle_loop(socket)
        };
        let stats = Arc::clone(&transmit.stats);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(transmit.run(rx));

        time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("transmit loop did not stop")
            .unwrap();

        let stats = *stats.read();
        assert!(stats.ticks >= 2, "loop stalled after {} ticks", stats.ticks);
        assert!(stats.overruns >= 1, "no overrun recorded");
    }

    #[test]
    fn test_stats_start_at_zero() {
        let stats = TransmitStats::default();
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.frames_sent, 0);
        assert_eq!(stats.send_errors, 0);
        assert_eq!(stats.overruns, 0);
    }
}
