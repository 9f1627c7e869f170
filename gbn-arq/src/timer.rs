//! Retransmit timer.
//!
//! Reliable delivery requires that unacknowledged frames are re-sent if no
//! acknowledgement arrives in time.  Go-Back-N does this in bulk: every
//! [`RetransmitTimer`] fire resends *every* frame in the window, byte for
//! byte, straight onto the channel.
//!
//! The timer is a spawned task ticking at a fixed interval (no RTT estimation,
//! no back-off).  It exists exactly while the window holds frames: armed by
//! the first send, restarted by every ack that makes progress, cancelled when
//! the window drains.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::channel::DatagramChannel;
use crate::session::Shared;

/// Handle to the periodic retransmission task of one window.
#[derive(Debug, Default)]
pub struct RetransmitTimer {
    task: Option<JoinHandle<()>>,
}

impl RetransmitTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a retransmission task is scheduled.
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start the periodic task unless one is already running.
    pub(crate) fn arm<C: DatagramChannel>(&mut self, shared: &Arc<Shared<C>>) {
        if !self.is_armed() {
            self.task = Some(tokio::spawn(retransmit_loop(Arc::clone(shared))));
        }
    }

    /// Cancel and re-arm so the next fire is a full interval away.
    pub(crate) fn restart<C: DatagramChannel>(&mut self, shared: &Arc<Shared<C>>) {
        self.cancel();
        self.arm(shared);
    }

    /// Stop the periodic task, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Resend the whole window every `retransmit_interval` until cancelled.
async fn retransmit_loop<C: DatagramChannel>(shared: Arc<Shared<C>>) {
    let period = shared.config.retransmit_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = shared.shutdown.subscribe();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => return,
        }

        let frames: Vec<_> = {
            let mut state = shared.state.lock().await;
            state.window.on_retransmit();
            state
                .window
                .frames()
                .map(|e| (e.seq, e.bytes.clone(), e.dest, e.tx_count))
                .collect()
        };
        let Some(&(base, _, _, attempt)) = frames.first() else {
            return;
        };

        log::debug!(
            "[gbn] timeout: retransmitting {} frame(s) from seq={base} (attempt {attempt})",
            frames.len()
        );
        for (seq, bytes, dest, _) in frames {
            // Unreliable send: a failure here is just one more lost datagram.
            if let Err(e) = shared.channel.send_to(&bytes, dest).await {
                log::warn!("[gbn] retransmit of seq={seq} to {dest} failed: {e}");
            }
        }
    }
}
