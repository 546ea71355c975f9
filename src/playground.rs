use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use thiserror::Error;

use crate::engine::{self, Direction, Dot, Location};
use crate::objects::GameObject;

const RANDOM_PLACEMENT_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrPlayground {
    #[error("playground must have a nonzero area")]
    InvalidSize,
    #[error("location is empty")]
    EmptyLocation,
    #[error("dot {0} is out of bounds")]
    OutOfBounds(Dot),
    #[error("location is occupied")]
    LocationOccupied,
    #[error("object is already registered")]
    ObjectAlreadyExists,
    #[error("object is not registered with the passed location")]
    NotFoundObject,
    #[error("no dots of the location are available")]
    NoAvailableDots,
    #[error("no free dot on the playground")]
    NoFreeDot,
    #[error("no free placement for a {width}x{height} rectangle")]
    NoRectPlacement { width: u8, height: u8 },
}

struct Entity {
    object: Arc<dyn GameObject>,
    location: Location,
}

struct PlaygroundState {
    entities: Vec<Entity>,
    rng: StdRng,
}

/// Authoritative spatial registry of the fixed-size toroidal grid. Every
/// public operation is one critical section over the object↔location
/// relation; callers never observe a partially applied mutation.
pub struct Playground {
    width: u8,
    height: u8,
    state: StdMutex<PlaygroundState>,
}

impl Playground {
    pub fn new(width: u8, height: u8, rng: StdRng) -> Result<Self, ErrPlayground> {
        if width == 0 || height == 0 {
            return Err(ErrPlayground::InvalidSize);
        }
        Ok(Self {
            width,
            height,
            state: StdMutex::new(PlaygroundState {
                entities: Vec::new(),
                rng,
            }),
        })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn size(&self) -> u16 {
        u16::from(self.width) * u16::from(self.height)
    }

    pub fn navigate(&self, dot: Dot, direction: Direction, distance: u8) -> Dot {
        engine::navigate(dot, direction, distance, self.width, self.height)
    }

    pub fn random_direction(&self) -> Direction {
        let mut state = self.state.lock().unwrap();
        Direction::random(&mut state.rng)
    }

    pub fn object_exists(&self, object: &dyn GameObject) -> bool {
        let state = self.state.lock().unwrap();
        state.entities.iter().any(|e| e.object.id() == object.id())
    }

    /// True iff every dot of `location` is occupied by one and the same
    /// object.
    pub fn location_exists(&self, location: &Location) -> bool {
        if location.is_empty() {
            return false;
        }
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .any(|e| location.iter().all(|dot| e.location.contains(dot)))
    }

    pub fn entity_exists(&self, object: &dyn GameObject, location: &Location) -> bool {
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .any(|e| e.object.id() == object.id() && e.location.same_dots(location))
    }

    /// The object whose registered location is exactly `location`.
    pub fn get_object_by_location(&self, location: &Location) -> Option<Arc<dyn GameObject>> {
        if location.is_empty() {
            return None;
        }
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .find(|e| e.location.same_dots(location))
            .map(|e| Arc::clone(&e.object))
    }

    pub fn get_object_by_dot(&self, dot: Dot) -> Option<Arc<dyn GameObject>> {
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .find(|e| e.location.contains(dot))
            .map(|e| Arc::clone(&e.object))
    }

    pub fn get_entity_by_dot(&self, dot: Dot) -> Option<(Arc<dyn GameObject>, Location)> {
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .find(|e| e.location.contains(dot))
            .map(|e| (Arc::clone(&e.object), e.location.clone()))
    }

    /// Distinct objects any of whose cells match one of `dots`, in
    /// registration order.
    pub fn get_objects_by_dots(&self, dots: &[Dot]) -> Vec<Arc<dyn GameObject>> {
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .filter(|e| dots.iter().any(|dot| e.location.contains(*dot)))
            .map(|e| Arc::clone(&e.object))
            .collect()
    }

    pub fn get_objects(&self) -> Vec<Arc<dyn GameObject>> {
        let state = self.state.lock().unwrap();
        state
            .entities
            .iter()
            .map(|e| Arc::clone(&e.object))
            .collect()
    }

    #[cfg(test)]
    pub fn occupied(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.entities.iter().map(|e| e.location.len()).sum()
    }

    pub fn create_object(
        &self,
        object: Arc<dyn GameObject>,
        location: Location,
    ) -> Result<(), ErrPlayground> {
        let mut state = self.state.lock().unwrap();
        self.check_location(&location)?;
        if state.entities.iter().any(|e| e.object.id() == object.id()) {
            return Err(ErrPlayground::ObjectAlreadyExists);
        }
        if location
            .iter()
            .any(|dot| occupied_by(&state.entities, dot, None))
        {
            return Err(ErrPlayground::LocationOccupied);
        }
        state.entities.push(Entity { object, location });
        Ok(())
    }

    /// Registers the subset of `location` whose dots are currently free and
    /// returns it.
    pub fn create_object_available_dots(
        &self,
        object: Arc<dyn GameObject>,
        location: Location,
    ) -> Result<Location, ErrPlayground> {
        let mut state = self.state.lock().unwrap();
        if location.is_empty() {
            return Err(ErrPlayground::EmptyLocation);
        }
        if state.entities.iter().any(|e| e.object.id() == object.id()) {
            return Err(ErrPlayground::ObjectAlreadyExists);
        }
        let available: Location = location
            .iter()
            .filter(|dot| self.in_bounds(*dot) && !occupied_by(&state.entities, *dot, None))
            .collect();
        if available.is_empty() {
            return Err(ErrPlayground::NoAvailableDots);
        }
        state.entities.push(Entity {
            object,
            location: available.clone(),
        });
        Ok(available)
    }

    pub fn delete_object(
        &self,
        object: &dyn GameObject,
        location: &Location,
    ) -> Result<Arc<dyn GameObject>, ErrPlayground> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .entities
            .iter()
            .position(|e| e.object.id() == object.id() && e.location.same_dots(location))
            .ok_or(ErrPlayground::NotFoundObject)?;
        Ok(state.entities.remove(index).object)
    }

    pub fn update_object(
        &self,
        object: &dyn GameObject,
        old: &Location,
        new: Location,
    ) -> Result<Arc<dyn GameObject>, ErrPlayground> {
        let mut state = self.state.lock().unwrap();
        self.check_location(&new)?;
        let index = state
            .entities
            .iter()
            .position(|e| e.object.id() == object.id() && e.location.same_dots(old))
            .ok_or(ErrPlayground::NotFoundObject)?;
        if new
            .iter()
            .any(|dot| occupied_by(&state.entities, dot, Some(object.id())))
        {
            return Err(ErrPlayground::LocationOccupied);
        }
        state.entities[index].location = new;
        Ok(Arc::clone(&state.entities[index].object))
    }

    /// Keeps every dot of `new` that is either part of `old` or currently
    /// free, registers that subset and returns it.
    pub fn update_object_available_dots(
        &self,
        object: &dyn GameObject,
        old: &Location,
        new: Location,
    ) -> Result<(Arc<dyn GameObject>, Location), ErrPlayground> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .entities
            .iter()
            .position(|e| e.object.id() == object.id() && e.location.same_dots(old))
            .ok_or(ErrPlayground::NotFoundObject)?;
        let kept: Location = new
            .iter()
            .filter(|dot| {
                self.in_bounds(*dot)
                    && (old.contains(*dot) || !occupied_by(&state.entities, *dot, None))
            })
            .collect();
        if kept.is_empty() {
            return Err(ErrPlayground::NoAvailableDots);
        }
        state.entities[index].location = kept.clone();
        Ok((Arc::clone(&state.entities[index].object), kept))
    }

    /// Registers the object on a uniformly random free cell.
    pub fn create_object_random_dot(
        &self,
        object: Arc<dyn GameObject>,
    ) -> Result<Location, ErrPlayground> {
        let mut state = self.state.lock().unwrap();
        if state.entities.iter().any(|e| e.object.id() == object.id()) {
            return Err(ErrPlayground::ObjectAlreadyExists);
        }
        for _ in 0..RANDOM_PLACEMENT_ATTEMPTS {
            let dot = Dot::new(
                state.rng.gen_range(0..self.width),
                state.rng.gen_range(0..self.height),
            );
            if !occupied_by(&state.entities, dot, None) {
                let location = Location::dot(dot);
                state.entities.push(Entity {
                    object,
                    location: location.clone(),
                });
                return Ok(location);
            }
        }
        // Dense playground: enumerate to keep the draw uniform.
        let free: Vec<Dot> = self
            .all_dots()
            .filter(|dot| !occupied_by(&state.entities, *dot, None))
            .collect();
        if free.is_empty() {
            return Err(ErrPlayground::NoFreeDot);
        }
        let dot = free[state.rng.gen_range(0..free.len())];
        let location = Location::dot(dot);
        state.entities.push(Entity {
            object,
            location: location.clone(),
        });
        Ok(location)
    }

    /// Registers the object on a uniformly random free `rw`×`rh` rectangle.
    /// Rectangles are contiguous, never wrap, and their cells are listed in
    /// row-major order.
    pub fn create_object_random_rect(
        &self,
        object: Arc<dyn GameObject>,
        rw: u8,
        rh: u8,
    ) -> Result<Location, ErrPlayground> {
        if rw == 0 || rh == 0 || rw > self.width || rh > self.height {
            return Err(ErrPlayground::NoRectPlacement {
                width: rw,
                height: rh,
            });
        }
        let mut state = self.state.lock().unwrap();
        if state.entities.iter().any(|e| e.object.id() == object.id()) {
            return Err(ErrPlayground::ObjectAlreadyExists);
        }
        let max_x = self.width - rw;
        let max_y = self.height - rh;
        for _ in 0..RANDOM_PLACEMENT_ATTEMPTS {
            let x = state.rng.gen_range(0..=max_x);
            let y = state.rng.gen_range(0..=max_y);
            if let Some(location) = free_rect(&state.entities, x, y, rw, rh) {
                state.entities.push(Entity {
                    object,
                    location: location.clone(),
                });
                return Ok(location);
            }
        }
        let mut placements = Vec::new();
        for y in 0..=max_y {
            for x in 0..=max_x {
                if let Some(location) = free_rect(&state.entities, x, y, rw, rh) {
                    placements.push(location);
                }
            }
        }
        if placements.is_empty() {
            return Err(ErrPlayground::NoRectPlacement {
                width: rw,
                height: rh,
            });
        }
        let location = placements.swap_remove(state.rng.gen_range(0..placements.len()));
        state.entities.push(Entity {
            object,
            location: location.clone(),
        });
        Ok(location)
    }

    fn check_location(&self, location: &Location) -> Result<(), ErrPlayground> {
        if location.is_empty() {
            return Err(ErrPlayground::EmptyLocation);
        }
        for dot in location.iter() {
            if !self.in_bounds(dot) {
                return Err(ErrPlayground::OutOfBounds(dot));
            }
        }
        Ok(())
    }

    fn in_bounds(&self, dot: Dot) -> bool {
        dot.x < self.width && dot.y < self.height
    }

    fn all_dots(&self) -> impl Iterator<Item = Dot> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Dot::new(x, y)))
    }
}

fn occupied_by(entities: &[Entity], dot: Dot, ignore: Option<crate::objects::ObjectId>) -> bool {
    entities.iter().any(|e| {
        if Some(e.object.id()) == ignore {
            return false;
        }
        e.location.contains(dot)
    })
}

fn free_rect(entities: &[Entity], x: u8, y: u8, rw: u8, rh: u8) -> Option<Location> {
    let mut dots = Vec::with_capacity(usize::from(rw) * usize::from(rh));
    for dy in 0..rh {
        for dx in 0..rw {
            let dot = Dot::new(x + dx, y + dy);
            if occupied_by(entities, dot, None) {
                return None;
            }
            dots.push(dot);
        }
    }
    Some(Location::new(dots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{next_object_id, ObjectId, ObjectView};
    use rand::SeedableRng;

    struct Marker {
        id: ObjectId,
    }

    impl Marker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: next_object_id(),
            })
        }
    }

    impl GameObject for Marker {
        fn id(&self) -> ObjectId {
            self.id
        }

        fn view(&self) -> ObjectView {
            ObjectView::Wall {
                id: self.id,
                dots: Location::default(),
            }
        }
    }

    fn playground(width: u8, height: u8) -> Playground {
        Playground::new(width, height, StdRng::seed_from_u64(7)).unwrap()
    }

    fn location(dots: &[(u8, u8)]) -> Location {
        dots.iter().map(|&(x, y)| Dot::new(x, y)).collect()
    }

    #[test]
    fn rejects_an_empty_grid() {
        assert_eq!(
            Playground::new(0, 10, StdRng::seed_from_u64(1)).err(),
            Some(ErrPlayground::InvalidSize)
        );
    }

    #[test]
    fn create_then_delete_restores_the_initial_state() {
        let pg = playground(10, 10);
        let object = Marker::new();
        let loc = location(&[(1, 1), (2, 1)]);

        pg.create_object(object.clone(), loc.clone()).unwrap();
        assert!(pg.object_exists(object.as_ref()));
        assert!(pg.entity_exists(object.as_ref(), &loc));
        assert_eq!(pg.occupied(), 2);

        pg.delete_object(object.as_ref(), &loc).unwrap();
        assert!(!pg.object_exists(object.as_ref()));
        assert_eq!(pg.occupied(), 0);
        assert!(pg.get_objects().is_empty());
    }

    #[test]
    fn create_rejects_conflicts_and_bounds() {
        let pg = playground(5, 5);
        let first = Marker::new();
        pg.create_object(first.clone(), location(&[(2, 2)])).unwrap();

        let second = Marker::new();
        assert_eq!(
            pg.create_object(second.clone(), location(&[(2, 2), (3, 2)])),
            Err(ErrPlayground::LocationOccupied)
        );
        assert_eq!(
            pg.create_object(second.clone(), location(&[(5, 0)])),
            Err(ErrPlayground::OutOfBounds(Dot::new(5, 0)))
        );
        assert_eq!(
            pg.create_object(second, Location::default()),
            Err(ErrPlayground::EmptyLocation)
        );
        assert_eq!(
            pg.create_object(first, location(&[(4, 4)])),
            Err(ErrPlayground::ObjectAlreadyExists)
        );
    }

    #[test]
    fn lookups_find_the_registered_entity() {
        let pg = playground(10, 10);
        let object = Marker::new();
        let loc = location(&[(3, 3), (4, 3), (5, 3)]);
        pg.create_object(object.clone(), loc.clone()).unwrap();

        assert!(pg.location_exists(&location(&[(4, 3)])));
        assert!(pg.location_exists(&loc));
        assert!(!pg.location_exists(&location(&[(4, 3), (4, 4)])));

        let found = pg.get_object_by_dot(Dot::new(4, 3)).unwrap();
        assert_eq!(found.id(), object.id());
        assert!(pg.get_object_by_dot(Dot::new(0, 0)).is_none());

        let (found, full) = pg.get_entity_by_dot(Dot::new(5, 3)).unwrap();
        assert_eq!(found.id(), object.id());
        assert!(full.same_dots(&loc));

        let exact = pg.get_object_by_location(&loc.reversed()).unwrap();
        assert_eq!(exact.id(), object.id());
        assert!(pg.get_object_by_location(&location(&[(3, 3)])).is_none());
    }

    #[test]
    fn objects_by_dots_are_distinct() {
        let pg = playground(10, 10);
        let a = Marker::new();
        let b = Marker::new();
        pg.create_object(a.clone(), location(&[(1, 1), (2, 1)]))
            .unwrap();
        pg.create_object(b.clone(), location(&[(5, 5)])).unwrap();

        let found = pg.get_objects_by_dots(&[
            Dot::new(1, 1),
            Dot::new(2, 1),
            Dot::new(5, 5),
            Dot::new(9, 9),
        ]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), a.id());
        assert_eq!(found[1].id(), b.id());
    }

    #[test]
    fn update_replaces_the_registration_atomically() {
        let pg = playground(10, 10);
        let object = Marker::new();
        let old = location(&[(1, 1), (2, 1)]);
        pg.create_object(object.clone(), old.clone()).unwrap();

        // moving over its own cells is allowed
        let new = location(&[(2, 1), (3, 1)]);
        pg.update_object(object.as_ref(), &old, new.clone()).unwrap();
        assert!(pg.entity_exists(object.as_ref(), &new));
        assert!(!pg.entity_exists(object.as_ref(), &old));
    }

    #[test]
    fn update_with_identical_location_is_a_relation_noop() {
        let pg = playground(10, 10);
        let object = Marker::new();
        let loc = location(&[(1, 1), (2, 1)]);
        pg.create_object(object.clone(), loc.clone()).unwrap();
        pg.update_object(object.as_ref(), &loc, loc.clone()).unwrap();
        assert!(pg.entity_exists(object.as_ref(), &loc));
        assert_eq!(pg.occupied(), 2);
    }

    #[test]
    fn update_rejects_conflicts_and_unknown_pairs() {
        let pg = playground(10, 10);
        let object = Marker::new();
        let other = Marker::new();
        let loc = location(&[(1, 1)]);
        pg.create_object(object.clone(), loc.clone()).unwrap();
        pg.create_object(other.clone(), location(&[(2, 1)])).unwrap();

        assert!(matches!(
            pg.update_object(object.as_ref(), &loc, location(&[(2, 1)])),
            Err(ErrPlayground::LocationOccupied)
        ));
        assert!(matches!(
            pg.update_object(object.as_ref(), &location(&[(9, 9)]), location(&[(3, 3)])),
            Err(ErrPlayground::NotFoundObject)
        ));
        // the failed updates left the relation untouched
        assert!(pg.entity_exists(object.as_ref(), &loc));
    }

    #[test]
    fn delete_requires_the_exact_pair() {
        let pg = playground(10, 10);
        let object = Marker::new();
        let loc = location(&[(1, 1)]);
        pg.create_object(object.clone(), loc.clone()).unwrap();

        assert!(matches!(
            pg.delete_object(object.as_ref(), &location(&[(2, 2)])),
            Err(ErrPlayground::NotFoundObject)
        ));
        assert!(pg.delete_object(object.as_ref(), &loc).is_ok());
        assert!(matches!(
            pg.delete_object(object.as_ref(), &loc),
            Err(ErrPlayground::NotFoundObject)
        ));
    }

    #[test]
    fn available_dots_register_the_free_subset() {
        let pg = playground(10, 10);
        let blocker = Marker::new();
        pg.create_object(blocker, location(&[(2, 1)])).unwrap();

        let object = Marker::new();
        let wanted = location(&[(1, 1), (2, 1), (3, 1)]);
        let placed = pg
            .create_object_available_dots(object.clone(), wanted)
            .unwrap();
        assert_eq!(placed, location(&[(1, 1), (3, 1)]));
        assert!(pg.entity_exists(object.as_ref(), &placed));
    }

    #[test]
    fn available_dots_fail_when_nothing_is_free() {
        let pg = playground(10, 10);
        let blocker = Marker::new();
        pg.create_object(blocker, location(&[(1, 1)])).unwrap();

        let object = Marker::new();
        assert_eq!(
            pg.create_object_available_dots(object, location(&[(1, 1)])),
            Err(ErrPlayground::NoAvailableDots)
        );
    }

    #[test]
    fn update_available_dots_keeps_own_and_free_cells() {
        let pg = playground(10, 10);
        let blocker = Marker::new();
        pg.create_object(blocker, location(&[(4, 1)])).unwrap();

        let object = Marker::new();
        let old = location(&[(1, 1), (2, 1), (3, 1)]);
        pg.create_object(object.clone(), old.clone()).unwrap();

        let (_, kept) = pg
            .update_object_available_dots(
                object.as_ref(),
                &old,
                location(&[(2, 1), (3, 1), (4, 1), (5, 1)]),
            )
            .unwrap();
        assert_eq!(kept, location(&[(2, 1), (3, 1), (5, 1)]));
        assert!(pg.entity_exists(object.as_ref(), &kept));
    }

    #[test]
    fn random_dot_fails_on_a_full_grid() {
        let pg = playground(2, 2);
        let block = Marker::new();
        pg.create_object(block, location(&[(0, 0), (1, 0), (0, 1), (1, 1)]))
            .unwrap();
        assert_eq!(
            pg.create_object_random_dot(Marker::new()),
            Err(ErrPlayground::NoFreeDot)
        );
    }

    #[test]
    fn random_dot_lands_on_the_single_free_cell() {
        let pg = playground(2, 2);
        let block = Marker::new();
        pg.create_object(block, location(&[(0, 0), (1, 0), (0, 1)]))
            .unwrap();
        let placed = pg.create_object_random_dot(Marker::new()).unwrap();
        assert_eq!(placed, location(&[(1, 1)]));
    }

    #[test]
    fn random_rect_is_row_major_and_in_bounds() {
        let pg = playground(6, 4);
        let placed = pg
            .create_object_random_rect(Marker::new(), 3, 2)
            .unwrap();
        assert_eq!(placed.len(), 6);
        let dots = placed.dots();
        let origin = dots[0];
        for dy in 0..2u8 {
            for dx in 0..3u8 {
                assert_eq!(
                    dots[usize::from(dy) * 3 + usize::from(dx)],
                    Dot::new(origin.x + dx, origin.y + dy)
                );
            }
        }
    }

    #[test]
    fn rect_placement_never_wraps() {
        // a 3x1 rectangle fits a 3-wide grid but not a 2-wide one
        let pg = playground(3, 3);
        assert!(pg.create_object_random_rect(Marker::new(), 3, 1).is_ok());

        let narrow = playground(2, 3);
        assert_eq!(
            narrow.create_object_random_rect(Marker::new(), 3, 1),
            Err(ErrPlayground::NoRectPlacement {
                width: 3,
                height: 1
            })
        );
    }

    #[test]
    fn rect_placement_finds_the_last_free_spot() {
        let pg = playground(3, 3);
        let block = Marker::new();
        // occupy everything except the bottom row
        pg.create_object(
            block,
            location(&[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]),
        )
        .unwrap();
        let placed = pg
            .create_object_random_rect(Marker::new(), 3, 1)
            .unwrap();
        assert_eq!(placed, location(&[(0, 2), (1, 2), (2, 2)]));
    }
}
