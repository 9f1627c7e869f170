//! Go-Back-N session: the socket-like surface of the transport.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │ send(payload)                 receive()
//!      ▼                                  ▲
//!  ┌───────────────────────────┐   ┌──────┴──────────┐
//!  │ SendState (one Mutex)     │   │ ReceiverState   │
//!  │  ├── SendWindow           │   │ (expected,      │
//!  │  ├── RetransmitTimer ─────┼─┐ │  last_accepted) │
//!  │  └── ack monitor handle   │ │ └──────┬──────────┘
//!  └──────────▲────────────────┘ │        │ DATA in / ACK out
//!             │ on_ack           │ resend │
//!      ack monitor task ◀────────┼────────┤
//!             │                  ▼        │
//!  ┌──────────┴───────────────────────────┴──┐
//!  │            DatagramChannel              │
//!  └─────────────────────────────────────────┘
//! ```
//!
//! A session is half-duplex at any moment: while frames of this session are
//! awaiting acknowledgement the ack monitor owns the inbound side of the
//! channel, so `receive()` belongs on the peer.  One channel, one window.
//!
//! # Usage
//!
//! ```ignore
//! let session = Session::bind(local, TransportConfig::default()).await?;
//! session.connect(peer).await;
//! session.send_all(b"hello").await?;
//! session.finish().await?;
//! session.close().await?;
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::ack_monitor::{monitor_acks, AckProgress};
use crate::channel::{DatagramChannel, UdpChannel};
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::frame::{Frame, Tag, MAX_PAYLOAD};
use crate::receiver::ReceiverState;
use crate::seq::SeqNum;
use crate::timer::RetransmitTimer;
use crate::window::SendWindow;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Send-side state touched by the caller, the ack monitor, and the timer.
#[derive(Debug)]
pub(crate) struct SendState {
    pub(crate) window: SendWindow,
    pub(crate) timer: RetransmitTimer,
    pub(crate) monitor: Option<JoinHandle<()>>,
    pub(crate) peer: Option<SocketAddr>,
}

/// How far the send window has drained, as seen by `flush()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Drain {
    /// Frames are awaiting acknowledgement.
    Busy,
    Idle,
    /// The channel failed under the ack monitor; nothing will drain.
    Failed(io::ErrorKind, String),
}

impl Drain {
    fn error(&self) -> Option<TransportError> {
        match self {
            Drain::Failed(kind, msg) => Some(TransportError::Io(io::Error::new(*kind, msg.clone()))),
            _ => None,
        }
    }
}

/// Everything a session shares with its background tasks.
#[derive(Debug)]
pub(crate) struct Shared<C> {
    pub(crate) channel: C,
    pub(crate) config: TransportConfig,
    /// Guards every access to the window, the timer handle, and the peer.
    pub(crate) state: Mutex<SendState>,
    /// Wakes `send()` callers when an ack frees window space.
    pub(crate) space: Notify,
    /// Window drain progress; `Failed` is sticky.
    pub(crate) drain: watch::Sender<Drain>,
    /// Flipped to `true` once; background tasks exit on it.
    pub(crate) shutdown: watch::Sender<bool>,
    /// Taken for the whole of `receive()` so inbound frames are judged in
    /// arrival order.  Lock order: `receiver` before `state`.
    pub(crate) receiver: Mutex<ReceiverState>,
}

impl<C: DatagramChannel> Shared<C> {
    /// Apply a cumulative acknowledgement; `acked_up_to` is the peer's next
    /// expected sequence number.
    pub(crate) fn on_ack(self: &Arc<Self>, state: &mut SendState, acked_up_to: SeqNum) -> AckProgress {
        let acked = state.window.on_ack(acked_up_to);
        if acked == 0 {
            log::debug!(
                "[gbn] ← ACK next={acked_up_to} duplicate (base={})",
                state.window.base()
            );
            return AckProgress::Pending;
        }

        log::debug!(
            "[gbn] ← ACK next={acked_up_to} slid={acked} in_flight={}",
            state.window.in_flight()
        );
        self.space.notify_waiters();

        if state.window.is_empty() {
            state.timer.cancel();
            // The monitor calling us is about to return; forget its handle so
            // the next send starts a fresh one.
            state.monitor = None;
            self.drain.send_replace(Drain::Idle);
            AckProgress::Drained
        } else {
            state.timer.restart(self);
            AckProgress::Pending
        }
    }

    /// Record a fatal channel error seen by the ack monitor and wake every
    /// caller waiting on the window.
    pub(crate) fn fail(&self, state: &mut SendState, err: &io::Error) {
        state.timer.cancel();
        // Called from the monitor itself, which returns right after.
        state.monitor = None;
        self.drain.send_replace(Drain::Failed(err.kind(), err.to_string()));
        self.space.notify_waiters();
    }

    /// The sticky channel failure, if any.
    pub(crate) fn failure(&self) -> Option<TransportError> {
        self.drain.borrow().error()
    }

    fn stop_tasks(&self, state: &mut SendState) {
        state.timer.cancel();
        if let Some(monitor) = state.monitor.take() {
            monitor.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A reliable, in-order datagram session over an unreliable channel.
///
/// Obtain one via [`Session::bind`] (UDP) or [`Session::with_channel`].
/// Dropping a session stops its background tasks without waiting for
/// outstanding frames; use [`Session::close`] for an orderly shutdown.
pub struct Session<C: DatagramChannel> {
    shared: Arc<Shared<C>>,
}

impl Session<UdpChannel> {
    /// Bind a UDP channel to `local_addr` and wrap it in a session.
    pub async fn bind(local_addr: SocketAddr, config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let channel = UdpChannel::bind(local_addr)
            .await
            .map_err(|source| TransportError::ChannelUnavailable {
                addr: local_addr,
                source,
            })?;
        Self::with_channel(channel, config)
    }
}

impl<C: DatagramChannel> Session<C> {
    /// Wrap an already-open channel.
    pub fn with_channel(channel: C, config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let window = SendWindow::new(SeqNum::INITIAL, config.window_capacity);
        let (drain, _) = watch::channel(Drain::Idle);
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared {
                channel,
                config,
                state: Mutex::new(SendState {
                    window,
                    timer: RetransmitTimer::new(),
                    monitor: None,
                    peer: None,
                }),
                space: Notify::new(),
                drain,
                shutdown,
                receiver: Mutex::new(ReceiverState::new(SeqNum::INITIAL)),
            }),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    pub fn channel(&self) -> &C {
        &self.shared.channel
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.shared.channel.local_addr()?)
    }

    /// Fix the peer: frames go there, and datagrams from anywhere else are
    /// ignored from now on.
    pub async fn connect(&self, peer: SocketAddr) {
        self.shared.state.lock().await.peer = Some(peer);
        log::debug!("[gbn] connected to {peer}");
    }

    pub async fn peer(&self) -> Option<SocketAddr> {
        self.shared.state.lock().await.peer
    }

    /// Frames sent but not yet acknowledged.
    pub async fn in_flight(&self) -> usize {
        self.shared.state.lock().await.window.in_flight()
    }

    /// `true` when nothing is awaiting acknowledgement.
    pub fn is_idle(&self) -> bool {
        *self.shared.drain.borrow() == Drain::Idle
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Send one frame's worth of data.
    ///
    /// Waits while the window is full and returns once the frame is on the
    /// wire and recorded for retransmission; delivery is confirmed later by
    /// the ack monitor.  An empty payload is the end-of-stream marker.
    pub async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        loop {
            // Register before checking so an ack between the check and the
            // wait cannot be missed.
            let space = self.shared.space.notified();
            {
                let mut state = self.shared.state.lock().await;
                let peer = state.peer.ok_or(TransportError::NotConnected)?;
                if let Some(err) = self.shared.failure() {
                    return Err(err);
                }
                if state.window.can_send() {
                    let frame = state
                        .window
                        .build_data_frame(payload.to_vec())
                        .map_err(|_| TransportError::PayloadTooLarge {
                            len: payload.len(),
                            max: MAX_PAYLOAD,
                        })?;
                    let bytes = frame.encode();
                    self.shared.channel.send_to(&bytes, peer).await?;
                    let seq = state.window.record_sent(bytes, peer);
                    log::debug!(
                        "[gbn] → DATA seq={seq} len={} in_flight={}",
                        payload.len(),
                        state.window.in_flight()
                    );
                    self.start_tasks(&mut state);
                    return Ok(());
                }
            }
            space.await;
        }
    }

    fn start_tasks(&self, state: &mut SendState) {
        self.shared.drain.send_replace(Drain::Busy);
        if state.monitor.as_ref().map_or(true, |m| m.is_finished()) {
            state.monitor = Some(tokio::spawn(monitor_acks(Arc::clone(&self.shared))));
        }
        state.timer.arm(&self.shared);
    }

    /// Split `data` into frame-sized chunks and send them in order.
    pub async fn send_all(&self, data: &[u8]) -> Result<(), TransportError> {
        for chunk in data.chunks(MAX_PAYLOAD) {
            self.send(chunk).await?;
        }
        Ok(())
    }

    /// Send the zero-length end-of-stream marker.
    pub async fn finish(&self) -> Result<(), TransportError> {
        self.send(&[]).await
    }

    /// Wait until every frame sent so far is acknowledged.
    ///
    /// Bounded by `close_timeout`; on expiry returns
    /// [`TransportError::CloseTimeout`] and leaves the window untouched.
    /// A channel failure seen while waiting is returned as
    /// [`TransportError::Io`].
    pub async fn flush(&self) -> Result<(), TransportError> {
        let mut drain = self.shared.drain.subscribe();
        let settled = async {
            drain
                .wait_for(|d| *d != Drain::Busy)
                .await
                .map(|d| Drain::clone(&d))
                .ok()
        };
        let outcome = match self.shared.config.close_timeout {
            Some(limit) => time::timeout(limit, settled).await.ok().flatten(),
            None => settled.await,
        };
        match outcome {
            Some(done) => done.error().map_or(Ok(()), Err),
            None => Err(TransportError::CloseTimeout {
                outstanding: self.in_flight().await,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Wait for the next in-order frame and return its payload.
    ///
    /// Corrupt, duplicate, and out-of-order frames are answered with a
    /// duplicate ack and never returned.  An empty payload means the peer
    /// finished its stream.
    ///
    /// Not cancel-safe: a frame accepted just before the future is dropped is
    /// acknowledged but lost.
    pub async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let mut receiver = self.shared.receiver.lock().await;
        loop {
            let (bytes, from) = self.shared.channel.recv_from().await?;
            if !self.accepts_from(from).await {
                log::trace!("[gbn] ← datagram from stranger {from} ignored");
                continue;
            }

            let verdict = match Frame::decode(&bytes) {
                Err(e) => {
                    log::debug!("[gbn] ← corrupt frame from {from}: {e}");
                    receiver.on_corrupt()
                }
                Ok(frame) if frame.tag() == Tag::Ack => {
                    log::trace!("[gbn] ← stray ACK seq={} ignored", frame.seq());
                    continue;
                }
                Ok(frame) => {
                    let verdict = receiver.on_frame(frame.seq());
                    if verdict.is_accept() {
                        self.send_ack(verdict.ack(), from).await?;
                        log::debug!(
                            "[gbn] ← DATA seq={} len={}; → ACK {}",
                            frame.seq(),
                            frame.payload.len(),
                            verdict.ack()
                        );
                        return Ok(frame.payload);
                    }
                    log::debug!(
                        "[gbn] ← DATA seq={} (expected {}); → dup ACK {}",
                        frame.seq(),
                        receiver.expected(),
                        verdict.ack()
                    );
                    verdict
                }
            };
            self.send_ack(verdict.ack(), from).await?;
        }
    }

    /// Collect payloads until the end-of-stream marker arrives.
    pub async fn receive_to_end(&self) -> Result<Vec<u8>, TransportError> {
        let mut data = Vec::new();
        loop {
            let payload = self.receive().await?;
            if payload.is_empty() {
                return Ok(data);
            }
            data.extend_from_slice(&payload);
        }
    }

    /// Keep answering retransmissions with duplicate acks for `duration`.
    ///
    /// Call after the last `receive()` so that a peer whose final ack was
    /// lost can still drain its window.  Nothing new is delivered.
    pub async fn linger(&self, duration: Duration) -> Result<(), TransportError> {
        let receiver = self.shared.receiver.lock().await;
        let answered = self
            .answer_duplicates(&receiver, Instant::now() + duration)
            .await?;
        log::debug!("[gbn] linger done ({answered} retransmission(s) re-acked)");
        Ok(())
    }

    /// Until `deadline`, answer every non-ACK datagram from the peer with a
    /// duplicate ack of `last_accepted` and deliver nothing.
    async fn answer_duplicates(&self, receiver: &ReceiverState, deadline: Instant) -> Result<usize, TransportError> {
        let mut answered = 0;
        loop {
            let (bytes, from) = match time::timeout_at(deadline, self.shared.channel.recv_from()).await {
                Ok(received) => received?,
                Err(_elapsed) => return Ok(answered),
            };
            if !self.accepts_from(from).await {
                continue;
            }
            if matches!(Frame::decode(&bytes), Ok(ref frame) if frame.tag() == Tag::Ack) {
                continue;
            }
            log::debug!("[gbn] → dup ACK {} to {from}", receiver.last_accepted());
            self.send_ack(receiver.last_accepted(), from).await?;
            answered += 1;
        }
    }

    async fn accepts_from(&self, from: SocketAddr) -> bool {
        self.shared
            .state
            .lock()
            .await
            .peer
            .map_or(true, |peer| peer == from)
    }

    async fn send_ack(&self, seq: SeqNum, dest: SocketAddr) -> Result<(), TransportError> {
        self.shared
            .channel
            .send_to(&Frame::ack(seq).encode(), dest)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Rewind both directions to the initial sequence number so the session
    /// can carry another transfer.
    ///
    /// Waits for the send window to drain, then sits out the configured
    /// quiescence period.  Stragglers from the old transfer arriving meanwhile
    /// are never delivered; they draw a duplicate ack of the last accepted
    /// frame so a peer whose final ack was lost can still drain.
    ///
    /// Both peers must reset, and the receiving side should do so right after
    /// its last `receive()`: new frames landing inside its quiescence period
    /// would be acked with old sequence numbers.
    pub async fn reset_sequence_numbers(&self) -> Result<(), TransportError> {
        self.flush().await?;

        let deadline = Instant::now() + self.shared.config.quiescence;
        let mut receiver = self.shared.receiver.lock().await;
        let answered = self.answer_duplicates(&receiver, deadline).await?;

        let mut state = self.shared.state.lock().await;
        state.window.reset(SeqNum::INITIAL);
        receiver.reset(SeqNum::INITIAL);
        log::debug!("[gbn] sequence numbers reset ({answered} straggler(s) re-acked)");
        Ok(())
    }

    /// Wait for every sent frame to be acknowledged, then stop the
    /// background tasks and release the channel.
    ///
    /// If `close_timeout` expires first the outstanding frames are abandoned,
    /// resources are released anyway, and [`TransportError::CloseTimeout`]
    /// reports how many were lost.
    pub async fn close(self) -> Result<(), TransportError> {
        let drained = self.flush().await;
        if let Err(TransportError::CloseTimeout { outstanding }) = &drained {
            log::warn!("[gbn] close: abandoning {outstanding} unacknowledged frame(s)");
        }

        {
            let mut state = self.shared.state.lock().await;
            self.shared.stop_tasks(&mut state);
        }
        self.shared.shutdown.send_replace(true);
        log::debug!("[gbn] session closed");
        drained
    }
}

impl<C: DatagramChannel> Drop for Session<C> {
    fn drop(&mut self) {
        // Background tasks hold the shared state alive; tell them to go.
        self.shared.shutdown.send_replace(true);
    }
}
