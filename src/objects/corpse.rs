use std::sync::Mutex as StdMutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;

use super::{next_object_id, Food, GameObject, ObjectId, ObjectView};
use crate::engine::{Dot, Location};
use crate::playground::ErrPlayground;
use crate::world::World;

/// How long a corpse lies on the playground before it decays.
const CORPSE_TTL: Duration = Duration::from_secs(15);
const CORPSE_NUTRITIONAL_VALUE: u16 = 2;

struct CorpseState {
    location: Location,
    nipped: Option<Dot>,
}

/// What a dead snake leaves behind. Shrinks as snakes nip cells off it and
/// disappears when fully eaten or after its TTL.
pub struct Corpse {
    id: ObjectId,
    world: Weak<World>,
    state: StdMutex<CorpseState>,
    consumed: Notify,
}

impl Corpse {
    /// Lays a corpse over whatever part of `location` is still free and
    /// starts its decay timer.
    pub fn create(world: &Arc<World>, location: Location) -> Result<Arc<Self>, ErrPlayground> {
        let corpse = Arc::new(Self {
            id: next_object_id(),
            world: Arc::downgrade(world),
            state: StdMutex::new(CorpseState {
                location: Location::default(),
                nipped: None,
            }),
            consumed: Notify::new(),
        });
        let placed = world.create_object_available_dots(corpse.clone(), location)?;
        corpse.state.lock().unwrap().location = placed;
        corpse.spawn_decay(world);
        Ok(corpse)
    }

    fn spawn_decay(self: &Arc<Self>, world: &Arc<World>) {
        let corpse = Arc::clone(self);
        let mut stop = world.stop_signal();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(CORPSE_TTL) => corpse.decay(),
                _ = corpse.consumed.notified() => {}
                _ = stop.wait_for(|stopped| *stopped) => {}
            }
        });
    }

    fn decay(&self) {
        let Some(world) = self.world.upgrade() else {
            return;
        };
        let location = self.state.lock().unwrap().location.clone();
        if location.is_empty() {
            return;
        }
        if let Err(error) = world.delete_object(self, &location) {
            tracing::debug!(corpse = self.id, %error, "decayed corpse was not registered");
        }
    }

    pub fn location(&self) -> Location {
        self.state.lock().unwrap().location.clone()
    }

    #[cfg(test)]
    pub fn nipped(&self) -> Option<Dot> {
        self.state.lock().unwrap().nipped
    }
}

impl GameObject for Corpse {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn view(&self) -> ObjectView {
        ObjectView::Corpse {
            id: self.id,
            dots: self.location(),
        }
    }

    fn as_food(&self) -> Option<&dyn Food> {
        Some(self)
    }
}

impl Food for Corpse {
    fn nutritional_value(&self, dot: Dot) -> u16 {
        let Some(world) = self.world.upgrade() else {
            return 0;
        };
        let mut state = self.state.lock().unwrap();
        if !state.location.contains(dot) {
            return 0;
        }
        let remaining = state.location.delete(dot);
        if remaining.is_empty() {
            if let Err(error) = world.delete_object(self, &state.location) {
                tracing::debug!(corpse = self.id, %error, "eaten corpse was not registered");
            }
            state.location = remaining;
            state.nipped = Some(dot);
            self.consumed.notify_one();
        } else {
            match world.update_object_available_dots(self, &state.location, remaining) {
                Ok(kept) => {
                    state.location = kept;
                    state.nipped = Some(dot);
                }
                Err(error) => {
                    tracing::debug!(corpse = self.id, %error, "corpse shrink failed");
                    return 0;
                }
            }
        }
        CORPSE_NUTRITIONAL_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playground::Playground;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn world(width: u8, height: u8) -> Arc<World> {
        let playground =
            Playground::new(width, height, StdRng::seed_from_u64(31)).unwrap();
        let world = World::new(playground);
        world.start();
        world
    }

    fn location(dots: &[(u8, u8)]) -> Location {
        dots.iter().map(|&(x, y)| Dot::new(x, y)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn decays_after_its_ttl() {
        let world = world(10, 10);
        let corpse = Corpse::create(&world, location(&[(1, 1), (2, 1)])).unwrap();
        assert!(world.object_exists(corpse.as_ref()));

        tokio::time::sleep(CORPSE_TTL + Duration::from_secs(1)).await;
        assert!(!world.object_exists(corpse.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn nipping_shrinks_the_corpse() {
        let world = world(10, 10);
        let corpse = Corpse::create(&world, location(&[(1, 1), (2, 1), (3, 1)])).unwrap();

        assert_eq!(corpse.nutritional_value(Dot::new(2, 1)), 2);
        assert_eq!(corpse.location(), location(&[(1, 1), (3, 1)]));
        assert_eq!(corpse.nipped(), Some(Dot::new(2, 1)));
        assert!(world.object_exists(corpse.as_ref()));

        // a cell outside the corpse is worth nothing
        assert_eq!(corpse.nutritional_value(Dot::new(9, 9)), 0);
        assert_eq!(corpse.nutritional_value(Dot::new(2, 1)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fully_eaten_corpse_removes_itself() {
        let world = world(10, 10);
        let corpse = Corpse::create(&world, location(&[(1, 1), (2, 1)])).unwrap();

        assert_eq!(corpse.nutritional_value(Dot::new(1, 1)), 2);
        assert_eq!(corpse.nutritional_value(Dot::new(2, 1)), 2);
        assert!(!world.object_exists(corpse.as_ref()));
        assert!(corpse.location().is_empty());

        // the decay timer is gone: nothing left to delete after the TTL
        tokio::time::sleep(CORPSE_TTL + Duration::from_secs(1)).await;
        assert!(!world.object_exists(corpse.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn lies_only_over_free_cells() {
        let world = world(10, 10);
        let blocker = Corpse::create(&world, location(&[(2, 1)])).unwrap();
        let corpse = Corpse::create(&world, location(&[(1, 1), (2, 1), (3, 1)])).unwrap();
        assert_eq!(corpse.location(), location(&[(1, 1), (3, 1)]));
        assert!(world.object_exists(blocker.as_ref()));
    }
}
