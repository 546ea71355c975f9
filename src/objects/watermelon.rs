use std::sync::Mutex as StdMutex;
use std::sync::{Arc, Weak};

use super::{next_object_id, Food, GameObject, ObjectId, ObjectView};
use crate::engine::{Dot, Location};
use crate::playground::ErrPlayground;
use crate::world::World;

const WATERMELON_WIDTH: u8 = 2;
const WATERMELON_HEIGHT: u8 = 2;
const WATERMELON_NUTRITIONAL_VALUE: u16 = 3;

/// A 2×2 chunk of food. Eaten cell by cell; removes itself once nothing is
/// left.
pub struct Watermelon {
    id: ObjectId,
    world: Weak<World>,
    location: StdMutex<Location>,
}

impl Watermelon {
    pub fn create(world: &Arc<World>) -> Result<Arc<Self>, ErrPlayground> {
        let watermelon = Arc::new(Self {
            id: next_object_id(),
            world: Arc::downgrade(world),
            location: StdMutex::new(Location::default()),
        });
        let placed = world.create_object_random_rect(
            watermelon.clone(),
            WATERMELON_WIDTH,
            WATERMELON_HEIGHT,
        )?;
        *watermelon.location.lock().unwrap() = placed;
        Ok(watermelon)
    }

    pub fn location(&self) -> Location {
        self.location.lock().unwrap().clone()
    }
}

impl GameObject for Watermelon {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn view(&self) -> ObjectView {
        ObjectView::Watermelon {
            id: self.id,
            dots: self.location(),
        }
    }

    fn as_food(&self) -> Option<&dyn Food> {
        Some(self)
    }
}

impl Food for Watermelon {
    fn nutritional_value(&self, dot: Dot) -> u16 {
        let Some(world) = self.world.upgrade() else {
            return 0;
        };
        let mut location = self.location.lock().unwrap();
        if !location.contains(dot) {
            return 0;
        }
        let remaining = location.delete(dot);
        if remaining.is_empty() {
            if let Err(error) = world.delete_object(self, &*location) {
                tracing::debug!(watermelon = self.id, %error, "eaten watermelon was not registered");
            }
            *location = remaining;
        } else {
            match world.update_object_available_dots(self, &*location, remaining) {
                Ok(kept) => *location = kept,
                Err(error) => {
                    tracing::debug!(watermelon = self.id, %error, "watermelon shrink failed");
                    return 0;
                }
            }
        }
        WATERMELON_NUTRITIONAL_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playground::Playground;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[tokio::test]
    async fn is_eaten_cell_by_cell() {
        let playground = Playground::new(10, 10, StdRng::seed_from_u64(71)).unwrap();
        let world = World::new(playground);
        world.start();

        let watermelon = Watermelon::create(&world).unwrap();
        let dots: Vec<Dot> = watermelon.location().iter().collect();
        assert_eq!(dots.len(), 4);

        for (index, dot) in dots.iter().enumerate() {
            assert_eq!(watermelon.nutritional_value(*dot), 3);
            assert_eq!(watermelon.location().len(), 3 - index);
        }
        assert!(!world.object_exists(watermelon.as_ref()));
        assert_eq!(watermelon.nutritional_value(dots[0]), 0);
    }
}
