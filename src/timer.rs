//! One-shot deferral timer for engine errors.
//!
//! The engine sometimes recovers internally from an error and sends a
//! genuine end-of-media afterwards. Advancing the playlist the moment the
//! error arrives would break that, so end-of-media handling is deferred by a
//! grace delay: if nothing cancels the timer it drops an
//! [`AsyncRecord::EndOfItemGrace`] into the queue, routing the handling back
//! onto the consumer thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use crate::queue::{AsyncRecord, EventQueue};

pub(crate) struct GraceTimer {
    cancel_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl GraceTimer {
    pub fn new() -> Self {
        Self {
            cancel_tx: None,
            handle: None,
        }
    }

    /// Arm the timer, superseding any previous arming.
    pub fn arm(&mut self, queue: Arc<EventQueue>, delay: Duration) {
        self.cancel();
        let (cancel_tx, cancel_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("framedeck-grace".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                    queue.push(AsyncRecord::EndOfItemGrace);
                }
            })
            .expect("failed to spawn grace timer thread");
        self.cancel_tx = Some(cancel_tx);
        self.handle = Some(handle);
    }

    /// Cancel a pending timer, if any, and reap the thread.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GraceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fires_after_delay() {
        let (queue, _wake) = EventQueue::new();
        let mut timer = GraceTimer::new();
        let t0 = Instant::now();
        timer.arm(queue.clone(), Duration::from_millis(50));

        while queue.is_empty() && t0.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(t0.elapsed() >= Duration::from_millis(50));
        assert!(matches!(
            queue.drain_all().pop_front(),
            Some(AsyncRecord::EndOfItemGrace)
        ));
    }

    #[test]
    fn cancel_prevents_firing() {
        let (queue, _wake) = EventQueue::new();
        let mut timer = GraceTimer::new();
        timer.arm(queue.clone(), Duration::from_millis(100));
        timer.cancel();
        thread::sleep(Duration::from_millis(200));
        assert!(queue.is_empty());
    }

    #[test]
    fn rearming_supersedes_previous_timer() {
        let (queue, _wake) = EventQueue::new();
        let mut timer = GraceTimer::new();
        timer.arm(queue.clone(), Duration::from_millis(40));
        timer.arm(queue.clone(), Duration::from_millis(40));
        thread::sleep(Duration::from_millis(150));
        // The first arming was cancelled; only one record lands.
        assert_eq!(queue.len(), 1);
        timer.cancel();
    }
}
