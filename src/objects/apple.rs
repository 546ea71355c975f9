use std::sync::Mutex as StdMutex;
use std::sync::{Arc, Weak};

use super::{next_object_id, Food, GameObject, ObjectId, ObjectView};
use crate::engine::{Dot, Location};
use crate::playground::ErrPlayground;
use crate::world::World;

const APPLE_NUTRITIONAL_VALUE: u16 = 1;

struct AppleState {
    dot: Dot,
    eaten: bool,
}

/// One-cell food.
pub struct Apple {
    id: ObjectId,
    world: Weak<World>,
    state: StdMutex<AppleState>,
}

impl Apple {
    /// Drops an apple on a random free cell.
    pub fn create(world: &Arc<World>) -> Result<Arc<Self>, ErrPlayground> {
        let apple = Arc::new(Self {
            id: next_object_id(),
            world: Arc::downgrade(world),
            state: StdMutex::new(AppleState {
                dot: Dot::default(),
                eaten: false,
            }),
        });
        let placed = world.create_object_random_dot(apple.clone())?;
        if let Some(dot) = placed.first() {
            apple.state.lock().unwrap().dot = dot;
        }
        Ok(apple)
    }

    #[cfg(test)]
    pub(crate) fn create_at(world: &Arc<World>, dot: Dot) -> Result<Arc<Self>, ErrPlayground> {
        let apple = Arc::new(Self {
            id: next_object_id(),
            world: Arc::downgrade(world),
            state: StdMutex::new(AppleState { dot, eaten: false }),
        });
        world.create_object(apple.clone(), Location::dot(dot))?;
        Ok(apple)
    }

    pub fn dot(&self) -> Dot {
        self.state.lock().unwrap().dot
    }
}

impl GameObject for Apple {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn view(&self) -> ObjectView {
        ObjectView::Apple {
            id: self.id,
            dot: self.dot(),
        }
    }

    fn as_food(&self) -> Option<&dyn Food> {
        Some(self)
    }
}

impl Food for Apple {
    fn nutritional_value(&self, dot: Dot) -> u16 {
        let Some(world) = self.world.upgrade() else {
            return 0;
        };
        let mut state = self.state.lock().unwrap();
        if state.eaten || state.dot != dot {
            return 0;
        }
        if let Err(error) = world.delete_object(self, &Location::dot(dot)) {
            tracing::debug!(apple = self.id, %error, "eaten apple was not registered");
            return 0;
        }
        state.eaten = true;
        APPLE_NUTRITIONAL_VALUE
    }
}
