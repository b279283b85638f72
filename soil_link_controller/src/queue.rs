// Blocking FIFO shared between the producer threads and the sender thread.
//
// Receiver threads and the shell `offer` commands; the single sender thread
// `poll`s them off in order. A `Mutex<VecDeque<T>>` holds the elements and a
// `Condvar` parks consumers while the queue is empty. Every `offer` wakes all
// parked consumers; whichever wins the lock takes the head, so FIFO order
// holds no matter which waiter runs first.
//
// The queue is unbounded and never rejects an element. It does no validation
// of its own; it is purely an ordering primitive.
//
// Lock poisoning is recovered. A push or pop never leaves the deque
// half-updated.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Unbounded, thread-safe FIFO with blocking and timed-blocking removal.
pub struct CommandQueue<T> {
    elements: Mutex<VecDeque<T>>,
    nonempty: Condvar,
}

impl<T> CommandQueue<T> {
    pub fn new() -> Self {
        Self {
            elements: Mutex::new(VecDeque::new()),
            nonempty: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.elements.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `element` to the tail and wake every waiting consumer.
    pub fn offer(&self, element: T) {
        let mut elements = self.lock();
        elements.push_back(element);
        self.nonempty.notify_all();
    }

    /// Block until the queue is non-empty, then remove and return the head.
    pub fn poll(&self) -> T {
        let mut elements = self
            .nonempty
            .wait_while(self.lock(), |elements| elements.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        match elements.pop_front() {
            Some(element) => element,
            // `wait_while` only returns once the predicate is false.
            None => unreachable!("woke with an empty queue"),
        }
    }

    /// Like `poll`, but give up after `timeout`. Returns `None` on timeout
    /// without consuming anything.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let (mut elements, _) = self
            .nonempty
            .wait_timeout_while(self.lock(), timeout, |elements| elements.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        elements.pop_front()
    }

    /// Number of queued elements at the time of the call.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn single_thread_fifo() {
        let queue = CommandQueue::new();
        queue.offer(1);
        queue.offer(2);
        queue.offer(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.poll(), 1);
        assert_eq!(queue.poll(), 2);
        assert_eq!(queue.poll(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn poll_blocks_until_offer() {
        let queue = Arc::new(CommandQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.poll())
        };

        thread::sleep(Duration::from_millis(50));
        queue.offer("late");
        assert_eq!(consumer.join().unwrap(), "late");
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        let queue = Arc::new(CommandQueue::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.offer((p, i));
                    }
                })
            })
            .collect();

        let mut next_expected = [0usize; PRODUCERS];
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let (p, i) = queue.poll();
            assert_eq!(i, next_expected[p], "producer {p} out of order");
            next_expected[p] += 1;
        }
        for producer in producers {
            producer.join().unwrap();
        }

        assert!(next_expected.iter().all(|&n| n == PER_PRODUCER));
        assert!(queue.is_empty());
    }

    #[test]
    fn poll_order_matches_offer_order_across_threads() {
        // Producers offer under a shared counter so the global offer order is
        // known; the consumer must see exactly that order.
        let queue = Arc::new(CommandQueue::new());
        let counter = Arc::new(Mutex::new(0u32));
        let producers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let mut n = counter.lock().unwrap();
                        queue.offer(*n);
                        *n += 1;
                    }
                })
            })
            .collect();

        for expected in 0..600 {
            assert_eq!(queue.poll(), expected);
        }
        for producer in producers {
            producer.join().unwrap();
        }
    }

    #[test]
    fn poll_timeout_on_empty_waits_full_duration() {
        let queue: CommandQueue<u8> = CommandQueue::new();
        let timeout = Duration::from_millis(60);
        let start = Instant::now();
        assert_eq!(queue.poll_timeout(timeout), None);
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn element_offered_after_timeout_is_kept() {
        let queue = CommandQueue::new();
        assert_eq!(queue.poll_timeout(Duration::from_millis(10)), None);
        queue.offer(9);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.poll_timeout(Duration::from_millis(10)), Some(9));
    }

    #[test]
    fn poll_timeout_returns_early_when_offered() {
        let queue = Arc::new(CommandQueue::new());
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.offer(5u8);
            })
        };
        assert_eq!(queue.poll_timeout(Duration::from_secs(5)), Some(5));
        producer.join().unwrap();
    }
}
