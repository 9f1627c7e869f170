//! Network simulation for deterministic testing.
//!
//! Real networks drop, corrupt, delay, and duplicate datagrams.  To exercise
//! the reliability mechanisms without depending on actual network conditions,
//! this module provides:
//!
//! - [`MemoryChannel`] — an in-process, lossless datagram link between two
//!   endpoints (see [`MemoryChannel::pair`]).
//! - [`LossyChannel`] — a wrapper around any [`DatagramChannel`] that applies
//!   a configurable fault model to outbound datagrams:
//!
//! | Fault       | Description                                         |
//! |-------------|-----------------------------------------------------|
//! | Loss        | Drop a datagram with probability `loss_rate`.       |
//! | Corruption  | Flip one random bit with probability `corrupt_rate`.|
//! | Duplication | Deliver a datagram twice.                           |
//! | Delay       | Hold a datagram back for `delay` before sending.    |
//!
//! Randomness comes from a seeded [`StdRng`] so failures are reproducible.
//! A [`FaultRule`] can override the dice per datagram for scripted scenarios.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::channel::DatagramChannel;

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

type Datagram = (Vec<u8>, SocketAddr);

/// One end of an in-process datagram link.
///
/// Datagrams sent to the peer's address arrive in order and intact; datagrams
/// sent anywhere else vanish, as they would on a real network.
#[derive(Debug)]
pub struct MemoryChannel {
    local: SocketAddr,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl MemoryChannel {
    /// Create two linked endpoints with distinct loopback addresses.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let a_addr = SocketAddr::from(([127, 0, 0, 1], 40_001));
        let b_addr = SocketAddr::from(([127, 0, 0, 1], 40_002));
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryChannel {
                local: a_addr,
                peer: b_addr,
                tx: a_tx,
                rx: tokio::sync::Mutex::new(a_rx),
            },
            MemoryChannel {
                local: b_addr,
                peer: a_addr,
                tx: b_tx,
                rx: tokio::sync::Mutex::new(b_rx),
            },
        )
    }
}

impl DatagramChannel for MemoryChannel {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<()> {
        if dest != self.peer {
            log::trace!("[sim] datagram to unknown {dest} discarded");
            return Ok(());
        }
        // A vanished peer behaves like an unreachable host: the send succeeds.
        let _ = self.tx.send((buf.to_vec(), self.local));
        Ok(())
    }

    async fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "memory link closed"))
    }
}

// ---------------------------------------------------------------------------
// LossyChannel
// ---------------------------------------------------------------------------

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that one bit of a datagram is flipped.
    pub corrupt_rate: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Fixed delay before every datagram is handed to the inner channel.
    pub delay: Duration,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            delay: Duration::ZERO,
            seed: 0x6762_6e00,
        }
    }
}

/// What happens to one outbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Deliver,
    Drop,
    /// Flip one randomly chosen bit.
    Corrupt,
    /// Send these bytes instead of the original.
    Replace(Vec<u8>),
    Duplicate,
}

/// Scripted per-datagram override; `None` falls back to the random model.
pub type FaultRule = Box<dyn FnMut(&[u8], SocketAddr) -> Option<Fault> + Send>;

/// Counters for what the simulator did.
#[derive(Debug, Default)]
pub struct SimulatorStats {
    pub sent: AtomicU64,
    pub dropped: AtomicU64,
    pub corrupted: AtomicU64,
    pub duplicated: AtomicU64,
}

/// A fault-injecting wrapper around another channel.
pub struct LossyChannel<C> {
    inner: Arc<C>,
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
    rule: Mutex<Option<FaultRule>>,
    stats: SimulatorStats,
}

impl<C: DatagramChannel> LossyChannel<C> {
    pub fn new(inner: C, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner: Arc::new(inner),
            config,
            rng: Mutex::new(rng),
            rule: Mutex::new(None),
            stats: SimulatorStats::default(),
        }
    }

    /// Install a scripted rule consulted before the random model.
    pub fn with_rule(self, rule: FaultRule) -> Self {
        *self.rule.lock().unwrap_or_else(PoisonError::into_inner) = Some(rule);
        self
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    /// Decide the fate of `buf` and, for corruption, produce the damaged copy.
    fn judge(&self, buf: &[u8], dest: SocketAddr) -> (Fault, Vec<u8>) {
        let scripted = self
            .rule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .and_then(|rule| rule(buf, dest));

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let fault = scripted.unwrap_or_else(|| {
            if rng.random_bool(self.config.loss_rate) {
                Fault::Drop
            } else if rng.random_bool(self.config.corrupt_rate) {
                Fault::Corrupt
            } else if rng.random_bool(self.config.duplicate_rate) {
                Fault::Duplicate
            } else {
                Fault::Deliver
            }
        });

        let bytes = match &fault {
            Fault::Corrupt if !buf.is_empty() => {
                let mut damaged = buf.to_vec();
                let i = rng.random_range(0..damaged.len());
                damaged[i] ^= 1 << rng.random_range(0..8u8);
                damaged
            }
            Fault::Replace(bytes) => bytes.clone(),
            _ => buf.to_vec(),
        };
        (fault, bytes)
    }

    async fn transmit(&self, bytes: Vec<u8>, dest: SocketAddr) -> io::Result<()> {
        if self.config.delay.is_zero() {
            return self.inner.send_to(&bytes, dest).await;
        }
        let inner = Arc::clone(&self.inner);
        let delay = self.config.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = inner.send_to(&bytes, dest).await {
                log::debug!("[sim] delayed send to {dest} failed: {e}");
            }
        });
        Ok(())
    }
}

impl<C: DatagramChannel> DatagramChannel for LossyChannel<C> {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        let (fault, bytes) = self.judge(buf, dest);
        match fault {
            Fault::Drop => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] drop {} bytes to {dest}", buf.len());
                Ok(())
            }
            Fault::Duplicate => {
                self.stats.duplicated.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] duplicate {} bytes to {dest}", buf.len());
                self.transmit(bytes.clone(), dest).await?;
                self.transmit(bytes, dest).await
            }
            Fault::Corrupt | Fault::Replace(_) => {
                self.stats.corrupted.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] corrupt {} bytes to {dest}", buf.len());
                self.transmit(bytes, dest).await
            }
            Fault::Deliver => self.transmit(bytes, dest).await,
        }
    }

    async fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        self.inner.recv_from().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pair_delivers_in_order() {
        let (a, b) = MemoryChannel::pair();
        let b_addr = b.local_addr().unwrap();
        a.send_to(b"one", b_addr).await.unwrap();
        a.send_to(b"two", b_addr).await.unwrap();

        let (first, from) = b.recv_from().await.unwrap();
        let (second, _) = b.recv_from().await.unwrap();
        assert_eq!(first, b"one");
        assert_eq!(second, b"two");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn memory_send_to_unknown_address_vanishes() {
        let (a, b) = MemoryChannel::pair();
        a.send_to(b"lost", "10.9.9.9:1".parse().unwrap()).await.unwrap();
        a.send_to(b"kept", b.local_addr().unwrap()).await.unwrap();
        let (bytes, _) = b.recv_from().await.unwrap();
        assert_eq!(bytes, b"kept");
    }

    #[tokio::test]
    async fn memory_recv_after_peer_dropped_fails() {
        let (a, b) = MemoryChannel::pair();
        drop(a);
        let err = b.recv_from().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn default_config_is_transparent() {
        let (a, b) = MemoryChannel::pair();
        let b_addr = b.local_addr().unwrap();
        let lossy = LossyChannel::new(a, SimulatorConfig::default());
        for i in 0..50u8 {
            lossy.send_to(&[i], b_addr).await.unwrap();
        }
        for i in 0..50u8 {
            assert_eq!(b.recv_from().await.unwrap().0, vec![i]);
        }
        assert_eq!(lossy.stats().sent.load(Ordering::Relaxed), 50);
        assert_eq!(lossy.stats().dropped.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn full_loss_drops_everything() {
        let (a, _b) = MemoryChannel::pair();
        let config = SimulatorConfig {
            loss_rate: 1.0,
            ..SimulatorConfig::default()
        };
        let lossy = LossyChannel::new(a, config);
        for _ in 0..10 {
            lossy.send_to(b"x", "127.0.0.1:40002".parse().unwrap()).await.unwrap();
        }
        assert_eq!(lossy.stats().dropped.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn corruption_changes_exactly_one_bit() {
        let (a, b) = MemoryChannel::pair();
        let config = SimulatorConfig {
            corrupt_rate: 1.0,
            ..SimulatorConfig::default()
        };
        let lossy = LossyChannel::new(a, config);
        let original = b"some frame bytes".to_vec();
        lossy.send_to(&original, b.local_addr().unwrap()).await.unwrap();

        let (damaged, _) = b.recv_from().await.unwrap();
        let flipped: u32 = original
            .iter()
            .zip(&damaged)
            .map(|(x, y)| (x ^ y).count_ones())
            .sum();
        assert_eq!(flipped, 1);
    }

    #[tokio::test]
    async fn duplicate_delivers_twice() {
        let (a, b) = MemoryChannel::pair();
        let config = SimulatorConfig {
            duplicate_rate: 1.0,
            ..SimulatorConfig::default()
        };
        let lossy = LossyChannel::new(a, config);
        lossy.send_to(b"twice", b.local_addr().unwrap()).await.unwrap();
        assert_eq!(b.recv_from().await.unwrap().0, b"twice");
        assert_eq!(b.recv_from().await.unwrap().0, b"twice");
    }

    #[tokio::test]
    async fn rule_overrides_random_model() {
        let (a, b) = MemoryChannel::pair();
        let lossy = LossyChannel::new(a, SimulatorConfig::default()).with_rule(Box::new(
            |buf: &[u8], _: SocketAddr| (buf == b"drop me").then_some(Fault::Drop),
        ));
        let b_addr = b.local_addr().unwrap();
        lossy.send_to(b"drop me", b_addr).await.unwrap();
        lossy.send_to(b"keep me", b_addr).await.unwrap();
        assert_eq!(b.recv_from().await.unwrap().0, b"keep me");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_holds_datagram_back() {
        let (a, b) = MemoryChannel::pair();
        let config = SimulatorConfig {
            delay: Duration::from_millis(200),
            ..SimulatorConfig::default()
        };
        let lossy = LossyChannel::new(a, config);
        let start = tokio::time::Instant::now();
        lossy.send_to(b"late", b.local_addr().unwrap()).await.unwrap();
        let (bytes, _) = b.recv_from().await.unwrap();
        assert_eq!(bytes, b"late");
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
