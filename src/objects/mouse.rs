use std::sync::Mutex as StdMutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;

use super::{next_object_id, Food, GameObject, ObjectId, ObjectView};
use crate::engine::{Dot, Location};
use crate::playground::ErrPlayground;
use crate::world::World;

const MOUSE_TICK: Duration = Duration::from_secs(1);
const MOUSE_NUTRITIONAL_VALUE: u16 = 5;

struct MouseState {
    dot: Dot,
    direction: crate::engine::Direction,
    eaten: bool,
}

/// A one-cell walker. Every tick it tries to step towards its direction and
/// turns to a fresh random direction when the target cell is taken.
pub struct Mouse {
    id: ObjectId,
    world: Weak<World>,
    state: StdMutex<MouseState>,
    caught: Notify,
}

impl Mouse {
    pub fn create(world: &Arc<World>) -> Result<Arc<Self>, ErrPlayground> {
        let mouse = Arc::new(Self {
            id: next_object_id(),
            world: Arc::downgrade(world),
            state: StdMutex::new(MouseState {
                dot: Dot::default(),
                direction: world.random_direction(),
                eaten: false,
            }),
            caught: Notify::new(),
        });
        let placed = world.create_object_random_dot(mouse.clone())?;
        if let Some(dot) = placed.first() {
            mouse.state.lock().unwrap().dot = dot;
        }
        mouse.spawn_walker(world);
        Ok(mouse)
    }

    fn spawn_walker(self: &Arc<Self>, world: &Arc<World>) {
        let mouse = Arc::clone(self);
        let mut stop = world.stop_signal();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MOUSE_TICK);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !mouse.step() {
                            return;
                        }
                    }
                    _ = mouse.caught.notified() => return,
                    _ = stop.wait_for(|stopped| *stopped) => return,
                }
            }
        });
    }

    fn step(&self) -> bool {
        let Some(world) = self.world.upgrade() else {
            return false;
        };
        let mut state = self.state.lock().unwrap();
        if state.eaten {
            return false;
        }
        let next = world.navigate(state.dot, state.direction, 1);
        if world.get_object_by_dot(next).is_some() {
            // blocked: turn instead of walking
            state.direction = world.random_direction();
            return true;
        }
        match world.update_object(self, &Location::dot(state.dot), Location::dot(next)) {
            Ok(()) => {
                state.dot = next;
                true
            }
            Err(error) => {
                tracing::debug!(mouse = self.id, %error, "mouse step failed");
                false
            }
        }
    }

    pub fn dot(&self) -> Dot {
        self.state.lock().unwrap().dot
    }

    pub fn direction(&self) -> crate::engine::Direction {
        self.state.lock().unwrap().direction
    }
}

impl GameObject for Mouse {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn view(&self) -> ObjectView {
        let state = self.state.lock().unwrap();
        ObjectView::Mouse {
            id: self.id,
            dot: state.dot,
            dir: state.direction,
        }
    }

    fn as_food(&self) -> Option<&dyn Food> {
        Some(self)
    }
}

impl Food for Mouse {
    fn nutritional_value(&self, dot: Dot) -> u16 {
        let Some(world) = self.world.upgrade() else {
            return 0;
        };
        let mut state = self.state.lock().unwrap();
        if state.eaten || state.dot != dot {
            return 0;
        }
        if let Err(error) = world.delete_object(self, &Location::dot(dot)) {
            tracing::debug!(mouse = self.id, %error, "caught mouse was not registered");
            return 0;
        }
        state.eaten = true;
        self.caught.notify_one();
        MOUSE_NUTRITIONAL_VALUE
    }
}
