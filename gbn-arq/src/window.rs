//! Go-Back-N send-side window.
//!
//! [`SendWindow`] tracks up to `capacity` in-flight frames.  Multiple frames
//! may be outstanding simultaneously; all of them are resent together when
//! the retransmit timer fires.
//!
//! # Protocol contract
//!
//! - At most `capacity` frames may be in flight at once.
//! - Acknowledgements are **cumulative**: `on_ack(K)` means the peer holds
//!   every frame strictly before sequence number `K`.
//! - On timeout, the caller retransmits **all** entries from `base` onwards.
//! - Sequence numbers wrap modulo [`SEQ_MODULUS`]; an acknowledgement is only
//!   believed when it lands inside `(base, next_seq]`.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.
//!
//! [`SEQ_MODULUS`]: crate::seq::SEQ_MODULUS

use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::frame::{Frame, FrameError};
use crate::seq::SeqNum;

/// A single in-flight frame occupying one slot in the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outstanding {
    pub seq: SeqNum,
    /// The encoded frame, resent byte-for-byte on timeout.
    pub bytes: Vec<u8>,
    pub dest: SocketAddr,
    /// Total number of times this frame has been transmitted.
    pub tx_count: u32,
}

/// Go-Back-N send-side state for one session.
///
/// ```text
///    base             next_seq
///      │                  │
///  ────┼──────────────────┼──────────────────▶ seq space
///      │ <── in flight ──▶│ <── sendable ───▶
/// ```
#[derive(Debug)]
pub struct SendWindow {
    /// Sequence number of the oldest unacknowledged frame (left edge).
    base: SeqNum,

    /// Sequence number for the next new frame.
    next_seq: SeqNum,

    /// Maximum number of frames in flight.
    capacity: usize,

    /// In-flight frames ordered by sequence number (front = oldest).
    buffer: VecDeque<Outstanding>,
}

impl SendWindow {
    /// Create an empty window starting at `initial`.
    ///
    /// `capacity` must be at least 1 and smaller than the sequence modulus;
    /// [`crate::config::TransportConfig::validate`] enforces that upstream.
    pub fn new(initial: SeqNum, capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be at least 1");
        Self {
            base: initial,
            next_seq: initial,
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn base(&self) -> SeqNum {
        self.base
    }

    pub fn next_seq(&self) -> SeqNum {
        self.next_seq
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `true` when there is room for at least one more in-flight frame.
    pub fn can_send(&self) -> bool {
        self.in_flight() < self.capacity
    }

    /// Number of frames currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.buffer.len()
    }

    /// `true` when nothing is awaiting acknowledgement.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Build the DATA frame that will occupy `next_seq`.
    ///
    /// Call [`record_sent`](Self::record_sent) with its encoding once it is on
    /// the wire.
    pub fn build_data_frame(&self, payload: Vec<u8>) -> Result<Frame, FrameError> {
        Frame::data(self.next_seq, payload)
    }

    /// Place a just-transmitted frame into the window and advance `next_seq`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is already full.  Check
    /// [`can_send`](Self::can_send) before calling.
    pub fn record_sent(&mut self, bytes: Vec<u8>, dest: SocketAddr) -> SeqNum {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full window ({} / {})",
            self.buffer.len(),
            self.capacity
        );
        let seq = self.next_seq;
        self.buffer.push_back(Outstanding {
            seq,
            bytes,
            dest,
            tx_count: 1,
        });
        self.next_seq = seq.next();
        seq
    }

    /// Process a cumulative acknowledgement.
    ///
    /// `acked_up_to` is the peer's next expected sequence number.  Removes
    /// every frame before it, advances `base`, and returns the number of
    /// newly acknowledged frames.  Returns `0` for a duplicate ack or one
    /// that points outside the in-flight range.
    pub fn on_ack(&mut self, acked_up_to: SeqNum) -> usize {
        let advance = self.base.distance_to(acked_up_to) as usize;
        if advance == 0 || advance > self.buffer.len() {
            return 0;
        }
        self.buffer.drain(..advance);
        self.base = acked_up_to;
        advance
    }

    /// Iterate over all in-flight frames from oldest to newest.
    pub fn frames(&self) -> impl Iterator<Item = &Outstanding> {
        self.buffer.iter()
    }

    /// Count one more transmission for every in-flight frame.
    pub fn on_retransmit(&mut self) {
        for entry in self.buffer.iter_mut() {
            entry.tx_count += 1;
        }
    }

    /// Rewind both edges to `initial` for a fresh session.
    ///
    /// Any frames still in flight are forgotten.
    pub fn reset(&mut self, initial: SeqNum) {
        self.buffer.clear();
        self.base = initial;
        self.next_seq = initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SEQ_MODULUS;

    fn dest() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn send_one(w: &mut SendWindow) -> SeqNum {
        let frame = w.build_data_frame(vec![1, 2, 3]).unwrap();
        w.record_sent(frame.encode(), dest())
    }

    #[test]
    fn initial_state() {
        let w = SendWindow::new(SeqNum::new(5), 2);
        assert_eq!(w.base(), SeqNum::new(5));
        assert_eq!(w.next_seq(), SeqNum::new(5));
        assert!(w.can_send());
        assert!(w.is_empty());
        assert_eq!(w.in_flight(), 0);
    }

    #[test]
    fn record_sent_advances_next_seq() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        let seq = send_one(&mut w);

        assert_eq!(seq, SeqNum::INITIAL);
        assert_eq!(w.next_seq(), SeqNum::new(1));
        assert_eq!(w.base(), SeqNum::INITIAL);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn build_data_frame_uses_next_seq() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 4);
        send_one(&mut w);
        let frame = w.build_data_frame(b"x".to_vec()).unwrap();
        assert_eq!(frame.seq(), SeqNum::new(1));
    }

    #[test]
    fn window_full_blocks_send() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        send_one(&mut w);
        send_one(&mut w);
        assert!(!w.can_send());
        assert_eq!(w.in_flight(), 2);
    }

    #[test]
    fn ack_slides_window_by_one() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        send_one(&mut w);
        send_one(&mut w);

        assert_eq!(w.on_ack(SeqNum::new(1)), 1);
        assert_eq!(w.base(), SeqNum::new(1));
        assert_eq!(w.in_flight(), 1);
        assert!(w.can_send());
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 4);
        for _ in 0..3 {
            send_one(&mut w);
        }
        assert_eq!(w.on_ack(SeqNum::new(3)), 3);
        assert_eq!(w.base(), SeqNum::new(3));
        assert!(w.is_empty());
    }

    #[test]
    fn duplicate_ack_returns_zero() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        send_one(&mut w);
        send_one(&mut w);
        assert_eq!(w.on_ack(SeqNum::new(1)), 1);
        assert_eq!(w.on_ack(SeqNum::new(1)), 0);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn ack_beyond_next_seq_ignored() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        send_one(&mut w);
        assert_eq!(w.on_ack(SeqNum::new(2)), 0);
        assert_eq!(w.on_ack(SeqNum::new(100)), 0);
        assert_eq!(w.base(), SeqNum::INITIAL);
    }

    #[test]
    fn stale_ack_behind_base_ignored() {
        let mut w = SendWindow::new(SeqNum::new(10), 2);
        send_one(&mut w);
        // An ack for an earlier session position is far "ahead" mod M.
        assert_eq!(w.on_ack(SeqNum::new(9)), 0);
        assert_eq!(w.on_ack(SeqNum::new(3)), 0);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn on_retransmit_increments_tx_count() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        send_one(&mut w);
        send_one(&mut w);
        w.on_retransmit();
        assert!(w.frames().all(|e| e.tx_count == 2));
    }

    #[test]
    fn frames_are_ordered_oldest_first() {
        let mut w = SendWindow::new(SeqNum::new(SEQ_MODULUS - 1), 2);
        send_one(&mut w);
        send_one(&mut w);
        let seqs: Vec<u8> = w.frames().map(|e| e.seq.value()).collect();
        assert_eq!(seqs, vec![SEQ_MODULUS - 1, 0]);
    }

    #[test]
    fn seq_wrap_around_keeps_bound() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        for _ in 0..(3 * SEQ_MODULUS as usize) {
            send_one(&mut w);
            send_one(&mut w);
            assert!(!w.can_send());
            assert_eq!(w.base().distance_to(w.next_seq()), 2);
            let acked = w.on_ack(w.base().next());
            assert_eq!(acked, 1);
            assert!(w.in_flight() <= w.capacity());
            assert_eq!(w.on_ack(w.next_seq()), 1);
            assert!(w.is_empty());
        }
        // 6 * M frames sent from 0 lands back on 0.
        assert_eq!(w.next_seq(), SeqNum::INITIAL);
        assert_eq!(w.base(), SeqNum::INITIAL);
    }

    #[test]
    fn reset_rewinds_both_edges() {
        let mut w = SendWindow::new(SeqNum::INITIAL, 2);
        send_one(&mut w);
        w.on_ack(SeqNum::new(1));
        w.reset(SeqNum::INITIAL);
        assert_eq!(w.base(), SeqNum::INITIAL);
        assert_eq!(w.next_seq(), SeqNum::INITIAL);
        assert!(w.is_empty());
    }
}
