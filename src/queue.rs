use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

/// Bounded single-consumer queue that prefers fresh items over old ones.
///
/// `push` drops the oldest queued item when the queue is full; `push_within`
/// first gives the consumer a bounded amount of time to make room. Slow
/// consumers therefore lose history instead of stalling producers.
#[derive(Debug)]
pub struct LossyQueue<T> {
    capacity: usize,
    inner: StdMutex<Inner<T>>,
    item_ready: Notify,
    space_ready: Notify,
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> LossyQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: StdMutex::new(Inner {
                items: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
            }),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    /// Enqueues immediately, dropping the oldest queued item if the queue is
    /// full. Returns false once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return false;
        }
        if inner.items.len() >= self.capacity {
            inner.items.pop_front();
        }
        inner.items.push_back(item);
        drop(inner);
        self.item_ready.notify_one();
        true
    }

    /// Waits up to `wait` for free space, then enqueues, dropping the oldest
    /// queued item if the consumer never caught up. Returns false once the
    /// queue is closed.
    pub async fn push_within(&self, item: T, wait: Duration) -> bool {
        let mut pending = match self.try_push(item) {
            Ok(pushed) => return pushed,
            Err(item) => item,
        };
        let deadline = Instant::now() + wait;
        loop {
            let space = self.space_ready.notified();
            pending = match self.try_push(pending) {
                Ok(pushed) => return pushed,
                Err(item) => item,
            };
            if timeout_at(deadline, space).await.is_err() {
                return self.push(pending);
            }
        }
    }

    fn try_push(&self, item: T) -> Result<bool, T> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(false);
        }
        if inner.items.len() < self.capacity {
            inner.items.push_back(item);
            drop(inner);
            self.item_ready.notify_one();
            return Ok(true);
        }
        Err(item)
    }

    /// Dequeues the oldest item, waiting for one to arrive. Returns `None`
    /// once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let ready = self.item_ready.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(item) = inner.items.pop_front() {
                    drop(inner);
                    self.space_ready.notify_one();
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            ready.await;
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.items.pop_front();
        if item.is_some() {
            drop(inner);
            self.space_ready.notify_one();
        }
        item
    }

    /// Closes the queue. Queued items stay poppable; producers are rejected.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.item_ready.notify_one();
        self.space_ready.notify_one();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }
}
