//! Acknowledgement monitor.
//!
//! While a window holds frames, one background task per session sits on the
//! channel waiting for ACK frames and feeds them to the window.  The task
//! ends itself the moment an ack empties the window; the next `send()` starts
//! a fresh one.  A fatal receive error is recorded on the session and wakes
//! everyone waiting for the window.

use std::io;
use std::sync::Arc;

use crate::channel::DatagramChannel;
use crate::frame::{Frame, Tag};
use crate::session::Shared;

/// Outcome of processing one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckProgress {
    /// Frames are still outstanding.
    Pending,
    /// The window is empty; the monitor should exit.
    Drained,
}

/// Receive one datagram and apply it to the window if it is a valid ACK.
///
/// Corrupt datagrams, DATA frames, and datagrams from anyone but the peer are
/// discarded and reported as [`AckProgress::Pending`].
pub(crate) async fn wait_for_one_ack<C: DatagramChannel>(
    shared: &Arc<Shared<C>>,
) -> io::Result<AckProgress> {
    let (bytes, from) = shared.channel.recv_from().await?;

    let frame = match Frame::decode(&bytes) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("[gbn] ← corrupt ack from {from} dropped: {e}");
            return Ok(AckProgress::Pending);
        }
    };
    if frame.tag() != Tag::Ack {
        log::debug!("[gbn] ← DATA seq={} while sending; ignored", frame.seq());
        return Ok(AckProgress::Pending);
    }

    let mut state = shared.state.lock().await;
    if state.peer.is_some_and(|peer| peer != from) {
        log::trace!("[gbn] ← ACK from stranger {from} ignored");
        return Ok(AckProgress::Pending);
    }
    // An ACK carrying `s` confirms `s`; the window wants the next expected.
    Ok(shared.on_ack(&mut state, frame.seq().next()))
}

/// Background task: drain acknowledgements until the window empties.
pub(crate) async fn monitor_acks<C: DatagramChannel>(shared: Arc<Shared<C>>) {
    let mut shutdown = shared.shutdown.subscribe();
    log::trace!("[gbn] ack monitor started");

    loop {
        tokio::select! {
            _ = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => {
                log::debug!("[gbn] ack monitor interrupted by shutdown");
                return;
            }
            progress = wait_for_one_ack(&shared) => match progress {
                Ok(AckProgress::Pending) => {}
                Ok(AckProgress::Drained) => {
                    log::trace!("[gbn] ack monitor finished: window drained");
                    return;
                }
                Err(e) => {
                    log::warn!("[gbn] ack monitor stopped: {e}");
                    let mut state = shared.state.lock().await;
                    shared.fail(&mut state, &e);
                    return;
                }
            },
        }
    }
}
