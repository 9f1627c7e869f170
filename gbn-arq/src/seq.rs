//! Sequence-number space.
//!
//! Sequence numbers occupy a single header byte and wrap around modulo
//! [`SEQ_MODULUS`].  The modulus only has to be comfortably larger than the
//! send window (`capacity < SEQ_MODULUS`); 127 keeps every value inside a
//! signed byte.
//!
//! ```text
//!   base             next
//!    │                 │
//! ───┼─────────────────┼──────────────▶  (mod SEQ_MODULUS)
//!    │ <─ in flight ─▶ │
//! ```

use std::fmt;

/// Number of distinct sequence numbers before wrap-around.
pub const SEQ_MODULUS: u8 = 127;

/// A sequence number in `[0, SEQ_MODULUS)`.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Default, Debug)]
#[repr(transparent)]
pub struct SeqNum(u8);

impl SeqNum {
    /// First sequence number of every session.
    pub const INITIAL: SeqNum = SeqNum(0);

    /// Wrap `value` into the sequence space.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Self(value % SEQ_MODULUS)
    }

    /// Interpret a raw header byte; `None` when it lies outside the space.
    #[inline]
    pub const fn from_wire(value: u8) -> Option<Self> {
        if value < SEQ_MODULUS {
            Some(Self(value))
        } else {
            None
        }
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The sequence number `n` steps after this one.
    #[inline]
    pub const fn add(self, n: u8) -> Self {
        let n = n % SEQ_MODULUS;
        Self(((self.0 as u16 + n as u16) % SEQ_MODULUS as u16) as u8)
    }

    /// The successor of this sequence number.
    #[inline]
    pub const fn next(self) -> Self {
        self.add(1)
    }

    /// The predecessor of this sequence number.
    #[inline]
    pub const fn prev(self) -> Self {
        self.add(SEQ_MODULUS - 1)
    }

    /// Steps forward from `self` to `later`, i.e. `(later - self) mod M`.
    #[inline]
    pub const fn distance_to(self, later: SeqNum) -> u8 {
        ((later.0 as u16 + SEQ_MODULUS as u16 - self.0 as u16) % SEQ_MODULUS as u16) as u8
    }
}

impl From<SeqNum> for u8 {
    fn from(value: SeqNum) -> Self {
        value.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_wraps_into_space() {
        assert_eq!(SeqNum::new(0).value(), 0);
        assert_eq!(SeqNum::new(126).value(), 126);
        assert_eq!(SeqNum::new(127).value(), 0);
        assert_eq!(SeqNum::new(255).value(), 1);
    }

    #[test]
    fn from_wire_rejects_out_of_range() {
        assert_eq!(SeqNum::from_wire(126), Some(SeqNum::new(126)));
        assert_eq!(SeqNum::from_wire(127), None);
        assert_eq!(SeqNum::from_wire(200), None);
    }

    #[test]
    fn next_wraps_at_modulus() {
        let last = SeqNum::new(SEQ_MODULUS - 1);
        assert_eq!(last.next(), SeqNum::INITIAL);
        assert_eq!(SeqNum::INITIAL.prev(), last);
    }

    #[test]
    fn distance_across_wrap() {
        let a = SeqNum::new(125);
        let b = SeqNum::new(1);
        assert_eq!(a.distance_to(b), 3);
        assert_eq!(b.distance_to(a), SEQ_MODULUS - 3);
        assert_eq!(a.distance_to(a), 0);
    }

    #[test]
    fn add_large_step() {
        assert_eq!(SeqNum::new(100).add(50), SeqNum::new(23));
        assert_eq!(SeqNum::new(5).add(SEQ_MODULUS), SeqNum::new(5));
    }
}
