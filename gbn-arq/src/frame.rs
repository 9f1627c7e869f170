//! Wire-format definitions for frames.
//!
//! Every datagram exchanged between peers is a [`Frame`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, payload).
//! - Serialising a [`Frame`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Frame`], reporting
//!   corruption as an ordinary [`FrameError`] value.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Checksum    |   Sequence    |      Tag      |    Length     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (0..=123 bytes) ...                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `Length` counts the whole frame, header included.  The checksum is the
//! CRC-32 of bytes `1..` reduced modulo [`CHECKSUM_MODULUS`], so roughly one
//! corrupted frame in 127 passes verification.  Sequence-number validation
//! upstream catches most of those.

use thiserror::Error;

use crate::seq::{SeqNum, SEQ_MODULUS};

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 4;

/// Largest frame on the wire, header included.
pub const MAX_FRAME_LEN: usize = 127;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = MAX_FRAME_LEN - HEADER_LEN;

/// The CRC-32 is folded into `0..CHECKSUM_MODULUS` to fit the checksum byte.
pub const CHECKSUM_MODULUS: u32 = 127;

const OFF_CHECKSUM: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_TAG: usize = 2;
const OFF_LENGTH: usize = 3;

/// Frame kind carried in the tag byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Data = 0,
    Ack = 1,
}

impl Tag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Tag::Data),
            1 => Some(Tag::Ack),
            _ => None,
        }
    }
}

/// Fixed-size frame header as it appeared on (or will go onto) the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Reduced CRC over everything after this byte.
    pub checksum: u8,
    pub seq: SeqNum,
    pub tag: Tag,
    /// Total frame length, header included.
    pub length: u8,
}

/// A complete frame: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Errors that can arise when building or parsing a frame.
///
/// Every decode-side variant means the datagram was damaged (or was never a
/// frame at all); receivers treat them identically and drop the datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("buffer of {0} bytes is too short to contain a header")]
    TooShort(usize),

    #[error("buffer of {0} bytes exceeds the {max}-byte frame cap", max = MAX_FRAME_LEN)]
    TooLong(usize),

    #[error("length field says {declared} bytes but {actual} arrived")]
    LengthMismatch { declared: u8, actual: usize },

    #[error("checksum mismatch: header {stored}, computed {computed}")]
    ChecksumMismatch { stored: u8, computed: u8 },

    #[error("unknown tag {0}")]
    UnknownTag(u8),

    #[error("sequence number {0} outside the sequence space")]
    SequenceOutOfRange(u8),

    #[error("payload of {0} bytes exceeds the {max}-byte limit", max = MAX_PAYLOAD)]
    PayloadTooLarge(usize),
}

impl FrameError {
    /// `true` for every error a damaged datagram can produce on decode.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, FrameError::PayloadTooLarge(_))
    }
}

impl Frame {
    /// Build a frame; `header.checksum` is filled in by [`Frame::encode`].
    pub fn new(tag: Tag, seq: SeqNum, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }
        Ok(Frame {
            header: Header {
                checksum: 0,
                seq,
                tag,
                length: (HEADER_LEN + payload.len()) as u8,
            },
            payload,
        })
    }

    /// A DATA frame carrying `payload` at `seq`.
    pub fn data(seq: SeqNum, payload: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(Tag::Data, seq, payload)
    }

    /// An ACK frame confirming `seq`.
    pub fn ack(seq: SeqNum) -> Self {
        Frame {
            header: Header {
                checksum: 0,
                seq,
                tag: Tag::Ack,
                length: HEADER_LEN as u8,
            },
            payload: Vec::new(),
        }
    }

    pub fn seq(&self) -> SeqNum {
        self.header.seq
    }

    pub fn tag(&self) -> Tag {
        self.header.tag
    }

    /// Serialise this frame into a newly allocated byte vector.
    ///
    /// `length` and `checksum` are computed from the actual payload; any
    /// values already stored in those header fields are ignored.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];

        buf[OFF_SEQ] = self.header.seq.value();
        buf[OFF_TAG] = self.header.tag as u8;
        buf[OFF_LENGTH] = buf.len() as u8;
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf[OFF_CHECKSUM] = checksum(&buf[OFF_SEQ..]);

        buf
    }

    /// Parse a [`Frame`] from a raw datagram.
    ///
    /// The checksum is verified first, so a flipped bit anywhere in the
    /// datagram surfaces as [`FrameError::ChecksumMismatch`] unless it
    /// collides; the field checks after it catch the collisions that produce
    /// nonsense headers.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::TooShort(buf.len()));
        }
        if buf.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLong(buf.len()));
        }

        let stored = buf[OFF_CHECKSUM];
        let computed = checksum(&buf[OFF_SEQ..]);
        if stored != computed {
            return Err(FrameError::ChecksumMismatch { stored, computed });
        }

        let length = buf[OFF_LENGTH];
        if length as usize != buf.len() {
            return Err(FrameError::LengthMismatch {
                declared: length,
                actual: buf.len(),
            });
        }

        let seq = SeqNum::from_wire(buf[OFF_SEQ])
            .ok_or(FrameError::SequenceOutOfRange(buf[OFF_SEQ]))?;
        let tag = Tag::from_u8(buf[OFF_TAG]).ok_or(FrameError::UnknownTag(buf[OFF_TAG]))?;

        Ok(Frame {
            header: Header {
                checksum: stored,
                seq,
                tag,
                length,
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// CRC-32 of `data` folded into a single byte.
pub fn checksum(data: &[u8]) -> u8 {
    (crc32fast::hash(data) % CHECKSUM_MODULUS) as u8
}

// Keep the sequence byte and the frame cap in the same signed-byte range.
const _: () = assert!(SEQ_MODULUS as usize <= MAX_FRAME_LEN);
