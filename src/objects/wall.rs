use std::sync::{Arc, OnceLock};

use super::{next_object_id, GameObject, ObjectId, ObjectView};
use crate::engine::Location;
use crate::playground::ErrPlayground;
use crate::world::World;

/// Static lethal obstacle. Walls never move and are not food.
pub struct Wall {
    id: ObjectId,
    location: OnceLock<Location>,
}

impl Wall {
    pub fn create(world: &Arc<World>, location: Location) -> Result<Arc<Self>, ErrPlayground> {
        let wall = Arc::new(Self {
            id: next_object_id(),
            location: OnceLock::new(),
        });
        world.create_object(wall.clone(), location.clone())?;
        let _ = wall.location.set(location);
        Ok(wall)
    }

    pub fn create_random_rect(
        world: &Arc<World>,
        width: u8,
        height: u8,
    ) -> Result<Arc<Self>, ErrPlayground> {
        let wall = Arc::new(Self {
            id: next_object_id(),
            location: OnceLock::new(),
        });
        let placed = world.create_object_random_rect(wall.clone(), width, height)?;
        let _ = wall.location.set(placed);
        Ok(wall)
    }

    pub fn location(&self) -> Location {
        self.location.get().cloned().unwrap_or_default()
    }
}

impl GameObject for Wall {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn view(&self) -> ObjectView {
        ObjectView::Wall {
            id: self.id,
            dots: self.location(),
        }
    }
}
