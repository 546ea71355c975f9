use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::broadcast::{GroupBroadcast, BROADCAST_MESSAGE_MAX_LEN};
use crate::player::Player;
use crate::protocol::{self, InputMessage, OutputMessage};
use crate::queue::LossyQueue;
use crate::world::World;

const INPUT_SUBSCRIBER_BUFFER: usize = 32;
const SNAKE_COMMANDS_BUFFER: usize = 32;
const BROADCAST_LISTEN_BUFFER: usize = 32;
const INPUT_SEND_TIMEOUT: Duration = Duration::from_millis(50);

/// Fan-out of decoded client messages to the worker's input subscribers.
/// Sends are timed: a subscriber that stays saturated past the timeout loses
/// its oldest pending message.
struct InputFanout {
    subscribers: StdRwLock<Vec<Arc<LossyQueue<InputMessage>>>>,
}

impl InputFanout {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: StdRwLock::new(Vec::new()),
        })
    }

    fn subscribe(&self, buffer: usize) -> Arc<LossyQueue<InputMessage>> {
        let queue = Arc::new(LossyQueue::new(buffer));
        self.subscribers.write().unwrap().push(Arc::clone(&queue));
        queue
    }

    async fn publish(&self, message: InputMessage) {
        let subscribers = self.subscribers.read().unwrap().clone();
        for subscriber in subscribers {
            subscriber
                .push_within(message.clone(), INPUT_SEND_TIMEOUT)
                .await;
        }
    }

    fn close(&self) {
        let mut subscribers = self.subscribers.write().unwrap();
        for subscriber in subscribers.drain(..) {
            subscriber.close();
        }
    }
}

/// Duplex pipeline between one client socket and the group: inbound frames
/// fan out to the snake-command and broadcast subscribers, outbound world
/// events, player messages and group broadcasts multiplex onto the socket.
pub struct ConnectionWorker {
    socket: WebSocket,
    session: Uuid,
}

impl ConnectionWorker {
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            session: Uuid::new_v4(),
        }
    }

    /// Runs until the transport fails or `group_stop` fires. Always emits the
    /// join notice on entry and the leave notice on the way out.
    pub async fn start(
        self,
        mut group_stop: watch::Receiver<bool>,
        world: Arc<World>,
        broadcast: Arc<GroupBroadcast>,
    ) {
        let session = self.session;
        tracing::info!(%session, "connection worker started");
        broadcast.broadcast_message("user joined your game group");

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        {
            // external stop folds into the worker-local one
            let stop_tx = Arc::clone(&stop_tx);
            let mut local_stop = stop_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = group_stop.wait_for(|stopped| *stopped) => {
                        stop_tx.send_replace(true);
                    }
                    _ = local_stop.wait_for(|stopped| *stopped) => {}
                }
            });
        }

        let fanout = InputFanout::new();
        let commands_queue = fanout.subscribe(INPUT_SUBSCRIBER_BUFFER);
        let broadcasts_queue = fanout.subscribe(INPUT_SUBSCRIBER_BUFFER);

        let (commands_tx, commands_rx) = mpsc::channel(SNAKE_COMMANDS_BUFFER);
        tokio::spawn(listen_snake_commands(commands_queue, commands_tx));
        tokio::spawn(republish_broadcasts(
            broadcasts_queue,
            Arc::clone(&broadcast),
            session,
        ));

        let mut player_rx = Player::new(Arc::clone(&world)).start(stop_rx.clone(), commands_rx);
        let mut events = world.events(stop_rx.clone());
        let mut broadcasts = broadcast.listen_messages(stop_rx.clone(), BROADCAST_LISTEN_BUFFER);

        let (mut sender, mut receiver) = self.socket.split();
        let send_task = tokio::spawn(async move {
            loop {
                let output = tokio::select! {
                    maybe = events.recv() => match maybe {
                        Some(event) => OutputMessage::Game(event),
                        None => return,
                    },
                    maybe = player_rx.recv() => match maybe {
                        Some(message) => OutputMessage::Player(message),
                        None => return,
                    },
                    maybe = broadcasts.recv() => match maybe {
                        Some(message) => OutputMessage::Broadcast(message),
                        None => return,
                    },
                };
                match protocol::encode_output(&output) {
                    Ok(text) => {
                        if sender.send(WsMessage::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%session, %error, "encode output message error");
                    }
                }
            }
        });

        let mut stop = stop_rx.clone();
        loop {
            let maybe = tokio::select! {
                _ = stop.wait_for(|stopped| *stopped) => break,
                maybe = receiver.next() => maybe,
            };
            match maybe {
                Some(Ok(WsMessage::Text(text))) => match protocol::decode_input(&text) {
                    Ok(message) => fanout.publish(message).await,
                    Err(error) => {
                        tracing::debug!(%session, %error, "dropped undecodable input message");
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {
                    tracing::debug!(%session, "unexpected input frame type");
                }
                Some(Err(error)) => {
                    tracing::debug!(%session, %error, "read input message error");
                    break;
                }
            }
        }

        broadcast.broadcast_message("user left your game group");
        stop_tx.send_replace(true);
        fanout.close();
        send_task.abort();
        tracing::info!(%session, "connection worker finished");
    }
}

async fn listen_snake_commands(
    queue: Arc<LossyQueue<InputMessage>>,
    commands: mpsc::Sender<String>,
) {
    while let Some(message) = queue.pop().await {
        if let InputMessage::Snake(command) = message {
            if commands.send(command).await.is_err() {
                return;
            }
        }
    }
}

async fn republish_broadcasts(
    queue: Arc<LossyQueue<InputMessage>>,
    broadcast: Arc<GroupBroadcast>,
    session: Uuid,
) {
    while let Some(message) = queue.pop().await {
        if let InputMessage::Broadcast(text) = message {
            if text.chars().count() > BROADCAST_MESSAGE_MAX_LEN {
                tracing::warn!(%session, "dropped oversized broadcast message");
                continue;
            }
            broadcast.broadcast_message(text);
        }
    }
}
