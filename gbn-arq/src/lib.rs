//! `gbn-arq` — reliable, in-order delivery over an unreliable datagram
//! channel using Go-Back-N automatic repeat request.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   DATA frames   ┌──────────┐
//!  │  Sender  │────────────────▶│ Receiver │
//!  │ (window) │                 │ (expect) │
//!  └────┬─────┘                 └─────┬────┘
//!       │      cumulative ACKs        │
//!       │◀────────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │             Session               │
//!  │ (window + timer + ack monitor)    │
//!  └────┬──────────────────────────────┘
//!       │ raw datagrams
//!  ┌────▼─────────────┐
//!  │ DatagramChannel  │  (UDP, in-memory, or fault-injecting)
//!  └──────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]       — wire format (encode / decode / checksum)
//! - [`seq`]         — modular sequence-number arithmetic
//! - [`window`]      — outbound sliding window
//! - [`receiver`]    — inbound expected-sequence state machine
//! - [`timer`]       — retransmit timer
//! - [`session`]     — the public send / receive / close surface
//! - [`channel`]     — datagram channel trait and UDP implementation
//! - [`simulator`]   — in-memory and lossy channels for testing
//! - [`config`]      — tunables
//! - [`error`]       — error type

mod ack_monitor;
pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod receiver;
pub mod seq;
pub mod session;
pub mod simulator;
pub mod timer;
pub mod window;

pub use channel::{DatagramChannel, UdpChannel};
pub use config::TransportConfig;
pub use error::TransportError;
pub use frame::{Frame, FrameError, Tag, MAX_PAYLOAD};
pub use seq::{SeqNum, SEQ_MODULUS};
pub use session::Session;
pub use simulator::{Fault, FaultRule, LossyChannel, MemoryChannel, SimulatorConfig};
