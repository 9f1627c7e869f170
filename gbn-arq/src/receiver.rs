//! Go-Back-N receive-side state machine.
//!
//! [`ReceiverState`] implements the receiver side of Go-Back-N:
//!
//! - Only the **in-order** frame (seq == `expected`) is accepted.
//! - Out-of-order, duplicate, and corrupt frames are **discarded** without
//!   buffering.
//! - Every frame, accepted or not, is answered with an ACK.  An accepted
//!   frame is acked with its own sequence number; anything else gets a
//!   duplicate ACK of `last_accepted`.
//!
//! The sender reads an ACK carrying `s` as "the peer now expects `s + 1`".
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use crate::seq::SeqNum;

/// What the caller must do with an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Deliver the payload and ack `ack`.
    Accept { ack: SeqNum },
    /// Drop the frame and send a duplicate ack of `ack`.
    Reject { ack: SeqNum },
}

impl Verdict {
    /// Sequence number to place in the ACK frame either way.
    pub fn ack(self) -> SeqNum {
        match self {
            Verdict::Accept { ack } | Verdict::Reject { ack } => ack,
        }
    }

    pub fn is_accept(self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }
}

/// Go-Back-N receive-side state for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverState {
    /// Next sequence number that will be delivered.
    expected: SeqNum,

    /// Sequence number of the most recently delivered frame.
    ///
    /// Always `expected - 1`, including before the first delivery, so a
    /// duplicate ack sent then never matches anything the sender has in
    /// flight.
    last_accepted: SeqNum,
}

impl ReceiverState {
    pub fn new(initial: SeqNum) -> Self {
        Self {
            expected: initial,
            last_accepted: initial.prev(),
        }
    }

    pub fn expected(&self) -> SeqNum {
        self.expected
    }

    pub fn last_accepted(&self) -> SeqNum {
        self.last_accepted
    }

    /// Judge a frame that decoded cleanly.
    pub fn on_frame(&mut self, seq: SeqNum) -> Verdict {
        if seq == self.expected {
            self.last_accepted = self.expected;
            self.expected = self.expected.next();
            Verdict::Accept {
                ack: self.last_accepted,
            }
        } else {
            Verdict::Reject {
                ack: self.last_accepted,
            }
        }
    }

    /// Judge a datagram that failed to decode.
    pub fn on_corrupt(&self) -> Verdict {
        Verdict::Reject {
            ack: self.last_accepted,
        }
    }

    /// Rewind to `initial` for a fresh session.
    pub fn reset(&mut self, initial: SeqNum) {
        *self = Self::new(initial);
    }
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self::new(SeqNum::INITIAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SEQ_MODULUS;

    #[test]
    fn initial_state() {
        let r = ReceiverState::default();
        assert_eq!(r.expected(), SeqNum::INITIAL);
        assert_eq!(r.last_accepted(), SeqNum::new(SEQ_MODULUS - 1));
    }

    #[test]
    fn in_order_frame_accepted() {
        let mut r = ReceiverState::default();
        let v = r.on_frame(SeqNum::INITIAL);
        assert_eq!(v, Verdict::Accept { ack: SeqNum::INITIAL });
        assert_eq!(r.expected(), SeqNum::new(1));
        assert_eq!(r.last_accepted(), SeqNum::INITIAL);
    }

    #[test]
    fn out_of_order_frame_rejected() {
        let mut r = ReceiverState::default();
        r.on_frame(SeqNum::INITIAL);
        let v = r.on_frame(SeqNum::new(2));
        assert_eq!(v, Verdict::Reject { ack: SeqNum::INITIAL });
        assert_eq!(r.expected(), SeqNum::new(1));
    }

    #[test]
    fn duplicate_frame_rejected_with_last_accepted() {
        let mut r = ReceiverState::default();
        assert!(r.on_frame(SeqNum::new(0)).is_accept());
        assert!(r.on_frame(SeqNum::new(1)).is_accept());
        // Retransmitted frame 1 after its ack was lost.
        let v = r.on_frame(SeqNum::new(1));
        assert_eq!(v, Verdict::Reject { ack: SeqNum::new(1) });
        assert_eq!(r.expected(), SeqNum::new(2));
    }

    #[test]
    fn corrupt_frame_reacks_last_accepted() {
        let mut r = ReceiverState::default();
        r.on_frame(SeqNum::new(0));
        r.on_frame(SeqNum::new(1));
        assert_eq!(r.on_corrupt(), Verdict::Reject { ack: SeqNum::new(1) });
    }

    #[test]
    fn last_accepted_trails_expected_by_one() {
        let mut r = ReceiverState::default();
        for i in 0..(2 * SEQ_MODULUS as u16 + 5) {
            let seq = SeqNum::new((i % SEQ_MODULUS as u16) as u8);
            assert!(r.on_frame(seq).is_accept());
            assert_eq!(r.last_accepted().next(), r.expected());
        }
    }

    #[test]
    fn reset_rewinds() {
        let mut r = ReceiverState::default();
        r.on_frame(SeqNum::new(0));
        r.on_frame(SeqNum::new(1));
        r.reset(SeqNum::INITIAL);
        assert_eq!(r, ReceiverState::default());
    }
}
