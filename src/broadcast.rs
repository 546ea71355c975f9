use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::{mpsc, watch};

use crate::queue::LossyQueue;

const BROADCAST_MAIN_BUFFER: usize = 128;

/// Maximum accepted length of a client-published broadcast, in characters.
pub const BROADCAST_MESSAGE_MAX_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BroadcastMessage(pub String);

impl From<&str> for BroadcastMessage {
    fn from(message: &str) -> Self {
        Self(message.to_owned())
    }
}

impl From<String> for BroadcastMessage {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Listener end of a group broadcast subscription.
pub struct MessageStream {
    queue: Arc<LossyQueue<BroadcastMessage>>,
}

impl MessageStream {
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        self.queue.pop().await
    }

    pub fn try_recv(&mut self) -> Option<BroadcastMessage> {
        self.queue.try_pop()
    }
}

/// In-memory topic scoped to one game group. Delivery is best-effort: a
/// listener that stops draining loses its oldest pending messages first.
pub struct GroupBroadcast {
    messages_tx: mpsc::Sender<BroadcastMessage>,
    messages_rx: StdMutex<Option<mpsc::Receiver<BroadcastMessage>>>,
    listeners: StdRwLock<Vec<Arc<LossyQueue<BroadcastMessage>>>>,
    stop_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl GroupBroadcast {
    pub fn new() -> Arc<Self> {
        let (messages_tx, messages_rx) = mpsc::channel(BROADCAST_MAIN_BUFFER);
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            messages_tx,
            messages_rx: StdMutex::new(Some(messages_rx)),
            listeners: StdRwLock::new(Vec::new()),
            stop_tx,
            started: AtomicBool::new(false),
        })
    }

    /// Starts the pump. One-shot: later calls are no-ops.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut messages_rx) = self.messages_rx.lock().unwrap().take() else {
            return;
        };
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            let mut stop = bus.stop_tx.subscribe();
            loop {
                tokio::select! {
                    maybe = messages_rx.recv() => match maybe {
                        Some(message) => {
                            let listeners = bus.listeners.read().unwrap().clone();
                            for listener in listeners {
                                listener.push(message.clone());
                            }
                        }
                        None => return,
                    },
                    _ = stop.wait_for(|stopped| *stopped) => return,
                }
            }
        });
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        let mut listeners = self.listeners.write().unwrap();
        for listener in listeners.drain(..) {
            listener.close();
        }
    }

    /// Publishes without blocking; the message is lost if the bus is stopped
    /// or its main queue is saturated.
    pub fn broadcast_message(&self, message: impl Into<BroadcastMessage>) {
        if *self.stop_tx.borrow() {
            return;
        }
        let _ = self.messages_tx.try_send(message.into());
    }

    /// Subscribes with a private queue of `buffer` messages. Closing `stop`
    /// detaches the listener and closes the stream.
    pub fn listen_messages(
        self: &Arc<Self>,
        mut stop: watch::Receiver<bool>,
        buffer: usize,
    ) -> MessageStream {
        let queue = Arc::new(LossyQueue::new(buffer));
        self.listeners.write().unwrap().push(Arc::clone(&queue));

        let bus = Arc::clone(self);
        let listener = Arc::clone(&queue);
        tokio::spawn(async move {
            let mut bus_stop = bus.stop_tx.subscribe();
            tokio::select! {
                _ = stop.wait_for(|stopped| *stopped) => {}
                _ = bus_stop.wait_for(|stopped| *stopped) => {}
            }
            let mut listeners = bus.listeners.write().unwrap();
            if let Some(index) = listeners
                .iter()
                .position(|other| Arc::ptr_eq(other, &listener))
            {
                listeners.remove(index);
            }
            drop(listeners);
            listener.close();
        });

        MessageStream { queue }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_bus() -> Arc<GroupBroadcast> {
        let bus = GroupBroadcast::new();
        bus.start();
        bus
    }

    #[tokio::test]
    async fn delivers_to_every_listener() {
        let bus = started_bus();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let mut first = bus.listen_messages(stop_rx.clone(), 8);
        let mut second = bus.listen_messages(stop_rx, 8);

        bus.broadcast_message("user joined your game group");

        assert_eq!(
            first.recv().await.unwrap(),
            BroadcastMessage::from("user joined your game group")
        );
        assert_eq!(
            second.recv().await.unwrap(),
            BroadcastMessage::from("user joined your game group")
        );
    }

    #[tokio::test]
    async fn slow_listener_loses_the_oldest_messages() {
        let bus = started_bus();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let mut listener = bus.listen_messages(stop_rx, 2);

        for index in 0..5 {
            bus.broadcast_message(format!("message {index}"));
        }
        // let the pump drain the main queue
        tokio::task::yield_now().await;

        assert_eq!(
            listener.recv().await.unwrap(),
            BroadcastMessage::from("message 3")
        );
        assert_eq!(
            listener.recv().await.unwrap(),
            BroadcastMessage::from("message 4")
        );
        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn listener_stop_detaches_only_that_listener() {
        let bus = started_bus();
        let (stop_a_tx, stop_a_rx) = watch::channel(false);
        let (_stop_b_tx, stop_b_rx) = watch::channel(false);
        let mut a = bus.listen_messages(stop_a_rx, 8);
        let mut b = bus.listen_messages(stop_b_rx, 8);
        assert_eq!(bus.listener_count(), 2);

        stop_a_tx.send_replace(true);
        assert!(a.recv().await.is_none());
        assert_eq!(bus.listener_count(), 1);

        bus.broadcast_message("still here");
        assert_eq!(b.recv().await.unwrap(), BroadcastMessage::from("still here"));
    }

    #[tokio::test]
    async fn stop_closes_everything_and_drops_later_publishes() {
        let bus = started_bus();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let mut listener = bus.listen_messages(stop_rx, 8);

        bus.stop();
        assert!(listener.recv().await.is_none());
        bus.broadcast_message("lost");
        assert_eq!(bus.listener_count(), 0);
    }
}
