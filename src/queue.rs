//! Bounded timed circular queue.
//!
//! `push` never blocks: when the queue is full the oldest entry is discarded
//! to make room.  Retrieval skips entries older than the configured maximum
//! age, so a burst that sat in the queue through a reconnect is not replayed
//! as if it were fresh.  Marine instruments want the latest reading, never a
//! delayed one.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

pub struct TimedQueue<T> {
    inner:    Mutex<VecDeque<(T, Instant)>>,
    notify:   Notify,
    capacity: usize,
    max_age:  Duration,
}

impl<T> TimedQueue<T> {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            max_age,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Enqueue `item`, discarding the oldest entry if the queue is full.
    /// Returns `true` when an old entry had to be dropped.
    pub fn push(&self, item: T) -> bool {
        let dropped = {
            let mut q = self.inner.lock().unwrap();
            let dropped = if q.len() >= self.capacity {
                q.pop_front();
                true
            } else {
                false
            };
            q.push_back((item, Instant::now()));
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    /// Dequeue the next entry that is still fresh, or `None` when the queue
    /// holds nothing usable right now.
    pub fn try_pop(&self) -> Option<T> {
        let mut q = self.inner.lock().unwrap();
        while let Some((item, stamp)) = q.pop_front() {
            if stamp.elapsed() <= self.max_age {
                return Some(item);
            }
        }
        None
    }

    /// Dequeue the next fresh entry, waiting until one arrives.
    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    /// Drain up to `limit` fresh entries without waiting.
    pub fn drain(&self, limit: usize) -> Vec<T> {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.try_pop() {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_drops_exactly_one_oldest() {
        let q = TimedQueue::new(3, Duration::from_secs(30));
        assert!(!q.push(1));
        assert!(!q.push(2));
        assert!(!q.push(3));
        assert!(q.push(4)); // 1 is gone
        assert_eq!(q.len(), 3);
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), Some(4));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn expired_head_is_skipped() {
        let q = TimedQueue::new(10, Duration::from_millis(20));
        q.push("stale");
        std::thread::sleep(Duration::from_millis(40));
        q.push("fresh");
        assert_eq!(q.try_pop(), Some("fresh"));
        assert_eq!(q.try_pop(), None);
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        use std::sync::Arc;
        let q = Arc::new(TimedQueue::new(4, Duration::from_secs(30)));
        let q2 = Arc::clone(&q);
        let waiter = tokio::spawn(async move { q2.pop().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        q.push(7u32);
        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[test]
    fn drain_is_bounded() {
        let q = TimedQueue::new(10, Duration::from_secs(30));
        for i in 0..6 {
            q.push(i);
        }
        let batch = q.drain(4);
        assert_eq!(batch, vec![0, 1, 2, 3]);
        assert_eq!(q.len(), 2);
    }
}
