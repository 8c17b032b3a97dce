//! Cross-thread mailbox carrying engine records to the consumer thread.
//!
//! Engine worker threads push typed records from their callbacks; the
//! consumer thread drains them in one batch inside
//! [`Player::pump`](crate::player::Player::pump). Pushing also signals a
//! coalescing wake channel so a blocked consumer loop knows there is work.
//!
//! The queue is unbounded: the engine is trusted not to outrun the consumer
//! during correct operation, and dropping records is never acceptable.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::engine::{EngineEvent, LogLevel};
use crate::video::{FrameBuffer, VideoGeometry};

/// One record handed from an engine thread to the consumer thread.
///
/// Records are immutable once queued; ownership moves producer -> queue ->
/// dispatcher, which consumes them.
pub enum AsyncRecord {
    /// Transport/media event from the engine.
    Event(EngineEvent),
    /// Engine log line: level, formatted message, raw format string.
    Log {
        level: LogLevel,
        message: String,
        format: String,
    },
    /// Decode thread announced a new frame geometry and is blocked waiting
    /// for the consumer to allocate the shared buffer.
    FrameSetup {
        geometry: VideoGeometry,
        reply: Sender<Arc<FrameBuffer>>,
    },
    /// Decode pipeline tore down its output.
    FrameCleanup,
    /// The error-grace timer elapsed without a genuine end-of-media event.
    EndOfItemGrace,
}

/// Multi-producer / single-consumer record queue with a wake signal.
pub struct EventQueue {
    records: Mutex<VecDeque<AsyncRecord>>,
    wake_tx: Sender<()>,
}

impl EventQueue {
    /// Create the queue plus the wake receiver the consumer loop blocks on.
    pub fn new() -> (Arc<Self>, Receiver<()>) {
        // Capacity 1 on purpose: a pending wake swallows further signals,
        // mirroring a one-shot async notification. The consumer drains the
        // whole queue per wake, so coalescing loses nothing.
        let (wake_tx, wake_rx) = bounded(1);
        let queue = Arc::new(Self {
            records: Mutex::new(VecDeque::new()),
            wake_tx,
        });
        (queue, wake_rx)
    }

    /// Append a record and wake the consumer. Callable from any thread; the
    /// critical section is a single push.
    pub fn push(&self, record: AsyncRecord) {
        self.records.lock().expect("lock").push_back(record);
        self.wake();
    }

    /// Signal the consumer without queueing a record (used by the frame
    /// bridge, which publishes frame readiness through its own flag).
    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Swap out everything queued so far. Consumer thread only.
    ///
    /// The lock is held just for the swap, never across record processing.
    /// Records pushed while the returned batch is being processed show up in
    /// the next call.
    pub fn drain_all(&self) -> VecDeque<AsyncRecord> {
        std::mem::take(&mut *self.records.lock().expect("lock"))
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvent;
    use std::thread;

    fn time_of(record: &AsyncRecord) -> i64 {
        match record {
            AsyncRecord::Event(EngineEvent::TimeChanged(t)) => *t,
            _ => panic!("unexpected record"),
        }
    }

    #[test]
    fn drain_preserves_per_producer_order() {
        let (queue, _wake) = EventQueue::new();
        const PRODUCERS: i64 = 8;
        const PER_PRODUCER: i64 = 200;

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(AsyncRecord::Event(EngineEvent::TimeChanged(
                            p * PER_PRODUCER + i,
                        )));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let batch = queue.drain_all();
        assert_eq!(batch.len(), (PRODUCERS * PER_PRODUCER) as usize);

        // Per producer the sequence numbers must come out strictly ascending,
        // and every record must appear exactly once.
        let mut last_seen = vec![-1i64; PRODUCERS as usize];
        for record in &batch {
            let t = time_of(record);
            let producer = (t / PER_PRODUCER) as usize;
            assert!(t > last_seen[producer], "reordered within producer {producer}");
            last_seen[producer] = t;
        }
        for (producer, last) in last_seen.iter().enumerate() {
            assert_eq!(*last, (producer as i64 + 1) * PER_PRODUCER - 1);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn records_pushed_during_processing_land_in_next_drain() {
        let (queue, _wake) = EventQueue::new();
        queue.push(AsyncRecord::Event(EngineEvent::TimeChanged(1)));

        let first = queue.drain_all();
        assert_eq!(first.len(), 1);

        // Simulates a handler enqueueing while the batch is processed.
        queue.push(AsyncRecord::Event(EngineEvent::TimeChanged(2)));
        assert_eq!(first.len(), 1, "already-drained batch is a snapshot");

        let second = queue.drain_all();
        assert_eq!(second.len(), 1);
        assert_eq!(time_of(&second[0]), 2);
    }

    #[test]
    fn wake_signal_coalesces() {
        let (queue, wake) = EventQueue::new();
        for i in 0..10 {
            queue.push(AsyncRecord::Event(EngineEvent::TimeChanged(i)));
        }
        // Many pushes, one pending wake.
        assert!(wake.try_recv().is_ok());
        assert!(wake.try_recv().is_err());
        assert_eq!(queue.drain_all().len(), 10);
    }
}
