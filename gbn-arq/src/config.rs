//! Transport tuning parameters.
//!
//! The protocol runs with a fixed retransmission interval; there is no RTT
//! estimation or back-off.  Everything a session needs to know about timing
//! and window size lives in [`TransportConfig`].

use std::time::Duration;

use crate::error::TransportError;
use crate::seq::SEQ_MODULUS;

/// Default number of frames in flight.
pub const DEFAULT_WINDOW_CAPACITY: usize = 2;

/// Default period of the bulk-retransmit timer.
pub const DEFAULT_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound on how long `close()` waits for outstanding acks.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default quiet period enforced before sequence numbers are rewound.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_secs(1);

/// Adjustable session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum frames sent but not yet acknowledged.
    pub window_capacity: usize,
    /// How often every outstanding frame is resent while acks are missing.
    pub retransmit_interval: Duration,
    /// Upper bound on waiting for the window to drain in `close()` and
    /// `reset_sequence_numbers()`.  `None` waits forever.
    pub close_timeout: Option<Duration>,
    /// How long stray frames from a previous session are discarded before
    /// sequence numbers are rewound.
    pub quiescence: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            retransmit_interval: DEFAULT_RETRANSMIT_INTERVAL,
            close_timeout: Some(DEFAULT_CLOSE_TIMEOUT),
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

impl TransportConfig {
    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    pub fn with_retransmit_interval(mut self, interval: Duration) -> Self {
        self.retransmit_interval = interval;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_quiescence(mut self, quiescence: Duration) -> Self {
        self.quiescence = quiescence;
        self
    }

    /// Check the parameters against the protocol's limits.
    ///
    /// The window must be non-empty and strictly smaller than the sequence
    /// space, otherwise a cumulative ack could not tell old frames from new.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.window_capacity == 0 {
            return Err(TransportError::InvalidConfig(
                "window capacity must be at least 1".into(),
            ));
        }
        if self.window_capacity >= SEQ_MODULUS as usize {
            return Err(TransportError::InvalidConfig(format!(
                "window capacity {} must be below the sequence modulus {SEQ_MODULUS}",
                self.window_capacity
            )));
        }
        if self.retransmit_interval.is_zero() {
            return Err(TransportError::InvalidConfig(
                "retransmit interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
