use std::sync::Arc;

use crate::objects::{Apple, GameObject, ObjectView};
use crate::world::{EventKind, EventPayload, World};

/// Logs world traffic: errors loudly, object events at debug level.
pub fn spawn_logger(world: &Arc<World>, group_id: usize) {
    let mut events = world.events(world.stop_signal());
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event.payload {
                EventPayload::Error(error) => {
                    tracing::error!(group = group_id, %error, "world error");
                }
                EventPayload::Object(object) => {
                    tracing::debug!(
                        group = group_id,
                        kind = ?event.kind,
                        object = object.id(),
                        "world event"
                    );
                }
            }
        }
    });
}

/// Keeps food on the board: every eaten apple grows back somewhere else.
pub fn spawn_apple_keeper(world: &Arc<World>, group_id: usize) {
    let mut events = world.events(world.stop_signal());
    let world = Arc::clone(world);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if event.kind != EventKind::ObjectDelete {
                continue;
            }
            let EventPayload::Object(object) = &event.payload else {
                continue;
            };
            if !matches!(object.view(), ObjectView::Apple { .. }) {
                continue;
            }
            if let Err(error) = Apple::create(&world) {
                tracing::debug!(group = group_id, %error, "apple replant skipped");
            }
        }
    });
}
