//! Lock-Free SPSC Ring Implementation

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use can_protocol::CanFrame;

use crate::slot::{unpack, Slot};
use crate::QueueError;

/// Default ring size (holds up to 7 frames)
pub const DEFAULT_CAPACITY: usize = 8;

/// State shared by the two ends of a queue.
///
/// `write_index` and `read_index` are free-running counters; the slot of a
/// counter is `counter % capacity`. The queue is empty when they are equal
/// and never holds more than `capacity - 1` frames.
#[derive(Debug)]
struct Shared {
    slots: Box<[Slot]>,
    capacity: usize,
    /// Next slot to fill (advanced by the producer only)
    write_index: AtomicUsize,
    /// Oldest unread slot (advanced by the consumer, or by the producer on overflow)
    read_index: AtomicUsize,
    overflows: AtomicU64,
    total_written: AtomicU64,
}

impl Shared {
    fn len(&self) -> usize {
        let tail = self.read_index.load(Ordering::Acquire);
        let head = self.write_index.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.capacity - 1)
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.len(),
            capacity: self.capacity,
            overflows: self.overflows.load(Ordering::Relaxed),
            total_written: self.total_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Frames currently buffered
    pub len: usize,
    /// Ring size
    pub capacity: usize,
    /// Frames discarded by the drop-oldest policy
    pub overflows: u64,
    /// Frames pushed since creation
    pub total_written: u64,
}

impl QueueStats {
    /// Fill ratio relative to the usable capacity (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len as f64 / (self.capacity - 1) as f64
    }
}

/// Constructor for a producer/consumer pair
pub struct FrameQueue;

impl FrameQueue {
    /// Create a queue with `capacity` slots and split it into its two ends
    pub fn with_capacity(capacity: usize) -> Result<(Producer, Consumer), QueueError> {
        if capacity < 2 {
            return Err(QueueError::CapacityTooSmall(capacity));
        }
        Ok(Self::split(capacity))
    }

    /// Queue with [`DEFAULT_CAPACITY`] slots
    pub fn with_default_capacity() -> (Producer, Consumer) {
        Self::split(DEFAULT_CAPACITY)
    }

    fn split(capacity: usize) -> (Producer, Consumer) {
        let slots: Vec<Slot> = (0..capacity).map(|_| Slot::default()).collect();
        let shared = Arc::new(Shared {
            slots: slots.into_boxed_slice(),
            capacity,
            write_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
            overflows: AtomicU64::new(0),
            total_written: AtomicU64::new(0),
        });

        (
            Producer {
                shared: shared.clone(),
            },
            Consumer { shared },
        )
    }
}

/// Writing end, owned by the capture handler
#[derive(Debug)]
pub struct Producer {
    shared: Arc<Shared>,
}

impl Producer {
    /// Push a frame. Constant time, never blocks.
    ///
    /// Returns `true` if the oldest unread frame was discarded to make room.
    pub fn push(&mut self, frame: CanFrame) -> bool {
        let shared = &*self.shared;
        let head = shared.write_index.load(Ordering::Relaxed);

        shared.slots[head % shared.capacity].store(&frame);
        let next = head.wrapping_add(1);
        shared.write_index.store(next, Ordering::Release);
        shared.total_written.fetch_add(1, Ordering::Relaxed);

        let tail = shared.read_index.load(Ordering::Acquire);
        if next.wrapping_sub(tail) >= shared.capacity {
            // Ring wrapped onto the reader: drop the oldest frame. Losing the
            // race to the consumer means it already made room.
            if shared
                .read_index
                .compare_exchange(tail, tail.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                shared.overflows.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> QueueMonitor {
        QueueMonitor {
            shared: self.shared.clone(),
        }
    }
}

/// Reading end, owned by the forwarding task
#[derive(Debug)]
pub struct Consumer {
    shared: Arc<Shared>,
}

impl Consumer {
    /// Take the oldest frame, or `None` if the queue is empty
    pub fn try_pop(&mut self) -> Option<CanFrame> {
        let shared = &*self.shared;
        loop {
            let tail = shared.read_index.load(Ordering::Acquire);
            let head = shared.write_index.load(Ordering::Acquire);
            if head == tail {
                return None;
            }

            let words = shared.slots[tail % shared.capacity].load();

            // Claiming the slot fails if the producer dropped it meanwhile,
            // in which case the words may be torn: start over.
            if shared
                .read_index
                .compare_exchange(tail, tail.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            if let Some(frame) = unpack(words) {
                return Some(frame);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shared.len() == 0
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> QueueMonitor {
        QueueMonitor {
            shared: self.shared.clone(),
        }
    }
}

/// Read-only statistics handle, shareable across tasks
#[derive(Debug, Clone)]
pub struct QueueMonitor {
    shared: Arc<Shared>,
}

impl QueueMonitor {
    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn frame(n: u16) -> CanFrame {
        CanFrame::standard(n & 0x7FF, &n.to_le_bytes()).unwrap()
    }

    #[test]
    fn test_push_and_pop() {
        let (mut tx, mut rx) = FrameQueue::with_capacity(10).unwrap();

        for i in 0..5 {
            tx.push(frame(i));
        }
        assert_eq!(rx.len(), 5);

        for i in 0..5 {
            assert_eq!(rx.try_pop(), Some(frame(i)));
        }
        assert_eq!(rx.try_pop(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_overwrite_oldest() {
        let (mut tx, mut rx) = FrameQueue::with_capacity(5).unwrap();

        let dropped: usize = (0..10).map(|i| tx.push(frame(i)) as usize).sum();

        // Only capacity-1 frames survive, the newest ones
        assert_eq!(rx.len(), 4);
        assert_eq!(dropped, 6);
        assert_eq!(rx.stats().overflows, 6);
        for i in 6..10 {
            assert_eq!(rx.try_pop(), Some(frame(i)));
        }
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_default_ring_keeps_seven() {
        let (mut tx, mut rx) = FrameQueue::with_default_capacity();
        for i in 0..8 {
            tx.push(frame(i));
        }
        assert_eq!(rx.stats().overflows, 1);
        assert_eq!(rx.try_pop(), Some(frame(1)));
    }

    #[test]
    fn test_capacity_too_small() {
        assert_eq!(
            FrameQueue::with_capacity(1).err(),
            Some(QueueError::CapacityTooSmall(1))
        );
    }

    #[test]
    fn test_fill_ratio() {
        let (mut tx, rx) = FrameQueue::with_capacity(101).unwrap();
        assert_eq!(rx.stats().fill_ratio(), 0.0);

        for i in 0..50 {
            tx.push(frame(i));
        }

        assert!((rx.stats().fill_ratio() - 0.5).abs() < 0.01);
        assert_eq!(tx.monitor().stats().total_written, 50);
    }

    #[test]
    fn test_concurrent_order_is_preserved() {
        let (mut tx, mut rx) = FrameQueue::with_capacity(8).unwrap();
        const COUNT: u16 = 20_000;

        let producer = std::thread::spawn(move || {
            for i in 0..COUNT {
                tx.push(CanFrame::extended(i as u32, &i.to_le_bytes()).unwrap());
            }
        });

        let mut last: Option<u32> = None;
        let mut received = 0u32;
        loop {
            match rx.try_pop() {
                Some(f) => {
                    // Frames may be dropped but never duplicated or reordered
                    let id = f.raw_id();
                    assert_eq!(f.data(), &(id as u16).to_le_bytes());
                    if let Some(prev) = last {
                        assert!(id > prev, "{} after {}", id, prev);
                    }
                    last = Some(id);
                    received += 1;
                }
                None if producer.is_finished() && rx.is_empty() => break,
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();

        let stats = rx.stats();
        assert_eq!(received as u64 + stats.overflows, COUNT as u64);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push,
        Pop,
    }

    proptest! {
        #[test]
        fn prop_matches_model(ops in proptest::collection::vec(
            prop_oneof![Just(Op::Push), Just(Op::Pop)], 0..200),
            capacity in 2usize..12,
        ) {
            let (mut tx, mut rx) = FrameQueue::with_capacity(capacity).unwrap();
            let mut model: VecDeque<CanFrame> = VecDeque::new();
            let mut next = 0u16;
            let mut drops = 0u64;

            for op in ops {
                match op {
                    Op::Push => {
                        let f = frame(next);
                        next += 1;
                        model.push_back(f);
                        let dropped = tx.push(f);
                        if model.len() > capacity - 1 {
                            model.pop_front();
                            drops += 1;
                            prop_assert!(dropped);
                        } else {
                            prop_assert!(!dropped);
                        }
                    }
                    Op::Pop => {
                        prop_assert_eq!(rx.try_pop(), model.pop_front());
                    }
                }
                prop_assert_eq!(rx.len(), model.len());
            }
            prop_assert_eq!(rx.stats().overflows, drops);
        }
    }
}
