use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::engine::{Direction, Dot, Location};
use crate::objects::GameObject;
use crate::playground::{ErrPlayground, Playground};
use crate::queue::LossyQueue;

const EVENTS_MAIN_BUFFER: usize = 512;
const EVENTS_PROXY_BUFFER: usize = 128;
const EVENTS_OUT_BUFFER: usize = 32;
const EVENTS_SEND_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    ObjectCreate,
    ObjectDelete,
    ObjectUpdate,
    ObjectChecked,
    Error,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            EventKind::ObjectCreate => "create",
            EventKind::ObjectDelete => "delete",
            EventKind::ObjectUpdate => "update",
            EventKind::ObjectChecked => "checked",
            EventKind::Error => "error",
        }
    }
}

#[derive(Clone)]
pub enum EventPayload {
    Object(Arc<dyn GameObject>),
    Error(ErrPlayground),
}

/// A world-state change notice. The object payload is a live reference:
/// serialization snapshots the object at encode time, and consumers that keep
/// the payload around may observe later mutation.
#[derive(Clone)]
pub struct Event {
    pub kind: EventKind,
    pub payload: EventPayload,
}

impl Event {
    fn object(kind: EventKind, object: Arc<dyn GameObject>) -> Self {
        Self {
            kind,
            payload: EventPayload::Object(object),
        }
    }

    fn error(error: ErrPlayground) -> Self {
        Self {
            kind: EventKind::Error,
            payload: EventPayload::Error(error),
        }
    }

    pub fn object_id(&self) -> Option<crate::objects::ObjectId> {
        match &self.payload {
            EventPayload::Object(object) => Some(object.id()),
            EventPayload::Error(_) => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            EventPayload::Object(object) => f
                .debug_struct("Event")
                .field("kind", &self.kind)
                .field("object", &object.id())
                .finish(),
            EventPayload::Error(error) => f
                .debug_struct("Event")
                .field("kind", &self.kind)
                .field("error", error)
                .finish(),
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.kind.as_str())?;
        match &self.payload {
            EventPayload::Object(object) => map.serialize_entry("payload", &object.view())?,
            EventPayload::Error(error) => map.serialize_entry("payload", &error.to_string())?,
        }
        map.end()
    }
}

/// Subscriber end of the world event bus. Per-subscriber FIFO, lossy under
/// overload: the oldest pending event gives way to the newest.
pub struct EventStream {
    queue: Arc<LossyQueue<Event>>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<Event> {
        self.queue.pop().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.queue.try_pop()
    }
}

/// The playground plus its event bus. Every mutation publishes exactly one
/// event on success and one error event on failure; lookups that found
/// something publish a `checked` event per returned object.
pub struct World {
    playground: Playground,
    events_tx: mpsc::Sender<Event>,
    events_rx: StdMutex<Option<mpsc::Receiver<Event>>>,
    subscribers: StdRwLock<Vec<mpsc::Sender<Event>>>,
    stop_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl World {
    pub fn new(playground: Playground) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(EVENTS_MAIN_BUFFER);
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            playground,
            events_tx,
            events_rx: StdMutex::new(Some(events_rx)),
            subscribers: StdRwLock::new(Vec::new()),
            stop_tx,
            started: AtomicBool::new(false),
        })
    }

    /// Starts the event pump. One-shot: later calls are no-ops.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut events_rx) = self.events_rx.lock().unwrap().take() else {
            return;
        };
        let world = Arc::clone(self);
        tokio::spawn(async move {
            let mut stop = world.stop_tx.subscribe();
            loop {
                let maybe = tokio::select! {
                    maybe = events_rx.recv() => maybe,
                    _ = stop.wait_for(|stopped| *stopped) => return,
                };
                match maybe {
                    Some(event) => world.fan_out(event).await,
                    None => return,
                }
            }
        });
    }

    /// Stops the pump and closes every subscriber stream. Later publishes
    /// become no-ops.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        self.subscribers.write().unwrap().clear();
    }

    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    fn publish(&self, event: Event) {
        if *self.stop_tx.borrow() {
            return;
        }
        // never block the mutator: a full main queue loses the event
        let _ = self.events_tx.try_send(event);
    }

    async fn fan_out(&self, event: Event) {
        let subscribers = self.subscribers.read().unwrap().clone();
        let mut stop = self.stop_tx.subscribe();
        for proxy in subscribers {
            tokio::select! {
                _ = proxy.send(event.clone()) => {}
                _ = stop.wait_for(|stopped| *stopped) => return,
            }
        }
    }

    /// Materializes a subscriber. Closing `stop` (or stopping the world)
    /// unregisters it and closes the stream.
    pub fn events(self: &Arc<Self>, mut stop: watch::Receiver<bool>) -> EventStream {
        let (proxy_tx, mut proxy_rx) = mpsc::channel(EVENTS_PROXY_BUFFER);
        self.subscribers.write().unwrap().push(proxy_tx.clone());

        let queue = Arc::new(LossyQueue::new(EVENTS_OUT_BUFFER));
        let out = Arc::clone(&queue);
        let world = Arc::clone(self);
        tokio::spawn(async move {
            let mut world_stop = world.stop_tx.subscribe();
            loop {
                let maybe = tokio::select! {
                    _ = stop.wait_for(|stopped| *stopped) => break,
                    _ = world_stop.wait_for(|stopped| *stopped) => break,
                    maybe = proxy_rx.recv() => maybe,
                };
                match maybe {
                    Some(event) => {
                        out.push_within(event, EVENTS_SEND_TIMEOUT).await;
                    }
                    None => break,
                }
            }
            world.remove_subscriber(&proxy_tx);
            out.close();
        });

        EventStream { queue }
    }

    fn remove_subscriber(&self, proxy: &mpsc::Sender<Event>) {
        let mut subscribers = self.subscribers.write().unwrap();
        if let Some(index) = subscribers.iter().position(|s| s.same_channel(proxy)) {
            subscribers.remove(index);
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }

    // Playground surface. Mutations and successful lookups publish events.

    pub fn object_exists(&self, object: &dyn GameObject) -> bool {
        self.playground.object_exists(object)
    }

    pub fn location_exists(&self, location: &Location) -> bool {
        self.playground.location_exists(location)
    }

    pub fn entity_exists(&self, object: &dyn GameObject, location: &Location) -> bool {
        self.playground.entity_exists(object, location)
    }

    pub fn get_object_by_location(&self, location: &Location) -> Option<Arc<dyn GameObject>> {
        let object = self.playground.get_object_by_location(location)?;
        self.publish(Event::object(EventKind::ObjectChecked, Arc::clone(&object)));
        Some(object)
    }

    pub fn get_object_by_dot(&self, dot: Dot) -> Option<Arc<dyn GameObject>> {
        let object = self.playground.get_object_by_dot(dot)?;
        self.publish(Event::object(EventKind::ObjectChecked, Arc::clone(&object)));
        Some(object)
    }

    pub fn get_entity_by_dot(&self, dot: Dot) -> Option<(Arc<dyn GameObject>, Location)> {
        let (object, location) = self.playground.get_entity_by_dot(dot)?;
        self.publish(Event::object(EventKind::ObjectChecked, Arc::clone(&object)));
        Some((object, location))
    }

    pub fn get_objects_by_dots(&self, dots: &[Dot]) -> Vec<Arc<dyn GameObject>> {
        let objects = self.playground.get_objects_by_dots(dots);
        for object in &objects {
            self.publish(Event::object(EventKind::ObjectChecked, Arc::clone(object)));
        }
        objects
    }

    pub fn get_objects(&self) -> Vec<Arc<dyn GameObject>> {
        self.playground.get_objects()
    }

    pub fn create_object(
        &self,
        object: Arc<dyn GameObject>,
        location: Location,
    ) -> Result<(), ErrPlayground> {
        match self.playground.create_object(Arc::clone(&object), location) {
            Ok(()) => {
                self.publish(Event::object(EventKind::ObjectCreate, object));
                Ok(())
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn create_object_available_dots(
        &self,
        object: Arc<dyn GameObject>,
        location: Location,
    ) -> Result<Location, ErrPlayground> {
        match self
            .playground
            .create_object_available_dots(Arc::clone(&object), location)
        {
            Ok(placed) => {
                self.publish(Event::object(EventKind::ObjectCreate, object));
                Ok(placed)
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn delete_object(
        &self,
        object: &dyn GameObject,
        location: &Location,
    ) -> Result<(), ErrPlayground> {
        match self.playground.delete_object(object, location) {
            Ok(removed) => {
                self.publish(Event::object(EventKind::ObjectDelete, removed));
                Ok(())
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn update_object(
        &self,
        object: &dyn GameObject,
        old: &Location,
        new: Location,
    ) -> Result<(), ErrPlayground> {
        match self.playground.update_object(object, old, new) {
            Ok(updated) => {
                self.publish(Event::object(EventKind::ObjectUpdate, updated));
                Ok(())
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn update_object_available_dots(
        &self,
        object: &dyn GameObject,
        old: &Location,
        new: Location,
    ) -> Result<Location, ErrPlayground> {
        match self
            .playground
            .update_object_available_dots(object, old, new)
        {
            Ok((updated, kept)) => {
                self.publish(Event::object(EventKind::ObjectUpdate, updated));
                Ok(kept)
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn create_object_random_dot(
        &self,
        object: Arc<dyn GameObject>,
    ) -> Result<Location, ErrPlayground> {
        match self
            .playground
            .create_object_random_dot(Arc::clone(&object))
        {
            Ok(placed) => {
                self.publish(Event::object(EventKind::ObjectCreate, object));
                Ok(placed)
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn create_object_random_rect(
        &self,
        object: Arc<dyn GameObject>,
        rw: u8,
        rh: u8,
    ) -> Result<Location, ErrPlayground> {
        match self
            .playground
            .create_object_random_rect(Arc::clone(&object), rw, rh)
        {
            Ok(placed) => {
                self.publish(Event::object(EventKind::ObjectCreate, object));
                Ok(placed)
            }
            Err(error) => {
                self.publish(Event::error(error));
                Err(error)
            }
        }
    }

    pub fn navigate(&self, dot: Dot, direction: Direction, distance: u8) -> Dot {
        self.playground.navigate(dot, direction, distance)
    }

    pub fn random_direction(&self) -> Direction {
        self.playground.random_direction()
    }

    pub fn size(&self) -> u16 {
        self.playground.size()
    }

    pub fn width(&self) -> u8 {
        self.playground.width()
    }

    pub fn height(&self) -> u8 {
        self.playground.height()
    }
}

#[cfg(test)]
pub(crate) fn test_event_create(object: Arc<dyn GameObject>) -> Event {
    Event::object(EventKind::ObjectCreate, object)
}
