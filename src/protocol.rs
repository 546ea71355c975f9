use serde::{Deserialize, Serialize};

use crate::broadcast::BroadcastMessage;
use crate::player;
use crate::world::Event;

/// Message received from a client. Unknown types fail to decode and are
/// dropped by the connection worker.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum InputMessage {
    /// A snake movement command: one of `"n"`, `"e"`, `"s"`, `"w"`.
    Snake(String),
    /// Free-form text republished to the whole group.
    Broadcast(String),
}

/// Envelope written to a client.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum OutputMessage {
    Game(Event),
    Player(player::Message),
    Broadcast(BroadcastMessage),
}

pub fn decode_input(text: &str) -> Result<InputMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_output(message: &OutputMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
