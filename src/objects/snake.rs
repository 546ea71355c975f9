use std::sync::{Arc, RwLock as StdRwLock, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use super::{next_object_id, Corpse, Food, GameObject, ObjectId, ObjectView};
use crate::engine::{calculate_direction, Direction, Dot, Location};
use crate::playground::ErrPlayground;
use crate::world::World;

const SNAKE_START_LENGTH: u16 = 3;
const SNAKE_START_SPEED: Duration = Duration::from_secs(1);
const SNAKE_SPEED_FACTOR: f64 = 1.02;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrSnake {
    #[error("cannot create snake: {0}")]
    Create(ErrPlayground),
    #[error("cannot update snake: {0}")]
    Update(ErrPlayground),
    #[error("snake died at {0}")]
    Died(Dot),
    #[error("snake body is empty")]
    EmptyBody,
    #[error("world is gone")]
    WorldGone,
    #[error("unknown snake command")]
    UnknownCommand,
    #[error("next direction cannot be opposite to the current one")]
    OppositeDirection,
}

struct SnakeState {
    dots: Vec<Dot>,
    length: u16,
    direction: Direction,
}

/// A player-controlled snake. The cell list is head-first; `length` is the
/// virtual length the body grows towards after eating.
pub struct Snake {
    id: ObjectId,
    world: Weak<World>,
    state: StdRwLock<SnakeState>,
}

impl Snake {
    /// Spawns a snake on a random free 1×3 strip, head pointing to a random
    /// direction, and registers it with the world.
    pub fn new(world: &Arc<World>) -> Result<Arc<Self>, ErrSnake> {
        let direction = world.random_direction();
        let snake = Arc::new(Self {
            id: next_object_id(),
            world: Arc::downgrade(world),
            state: StdRwLock::new(SnakeState {
                dots: Vec::new(),
                length: SNAKE_START_LENGTH,
                direction,
            }),
        });

        let start = SNAKE_START_LENGTH as u8;
        let object: Arc<dyn GameObject> = snake.clone();
        let location = match direction {
            Direction::North | Direction::South => {
                world.create_object_random_rect(object, 1, start)
            }
            Direction::East | Direction::West => world.create_object_random_rect(object, start, 1),
        }
        .map_err(ErrSnake::Create)?;

        // row-major placement puts the head at the north/west end; flip it
        // for the opposite headings
        let location = match direction {
            Direction::South | Direction::East => location.reversed(),
            Direction::North | Direction::West => location,
        };
        snake.state.write().unwrap().dots = location.into_dots();

        Ok(snake)
    }

    pub fn location(&self) -> Location {
        Location::new(self.state.read().unwrap().dots.clone())
    }

    pub fn length(&self) -> u16 {
        self.state.read().unwrap().length
    }

    pub fn direction(&self) -> Direction {
        self.state.read().unwrap().direction
    }

    /// Drives the snake until it dies, the world goes away, or `stop` closes.
    /// The returned channel closes when the loop exits.
    pub fn run(self: &Arc<Self>, mut stop: watch::Receiver<bool>) -> mpsc::Receiver<()> {
        let (done_tx, done_rx) = mpsc::channel::<()>(1);
        let snake = Arc::clone(self);
        tokio::spawn(async move {
            let _done = done_tx;
            loop {
                let delay = snake.delay();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        if let Err(error) = snake.step() {
                            tracing::debug!(snake = snake.id, %error, "snake loop finished");
                            return;
                        }
                    }
                    _ = stop.wait_for(|stopped| *stopped) => return,
                }
            }
        });
        done_rx
    }

    /// One movement tick: resolve the next head cell, eat or die, commit the
    /// new body through the world.
    fn step(&self) -> Result<(), ErrSnake> {
        let world = self.world.upgrade().ok_or(ErrSnake::WorldGone)?;

        let (head, direction) = {
            let state = self.state.read().unwrap();
            let head = *state.dots.first().ok_or(ErrSnake::EmptyBody)?;
            (head, state.direction)
        };
        let next = world.navigate(head, direction, 1);

        if let Some(object) = world.get_object_by_dot(next) {
            let eaten = object.id() != self.id && self.eat(object.as_ref(), next);
            if !eaten {
                self.die(&world);
                return Err(ErrSnake::Died(next));
            }
        }

        let (old, new) = {
            let state = self.state.read().unwrap();
            let mut dots = Vec::with_capacity(state.dots.len() + 1);
            dots.push(next);
            dots.extend_from_slice(&state.dots);
            if state.length < dots.len() as u16 {
                dots.pop();
            }
            (Location::new(state.dots.clone()), Location::new(dots))
        };
        world
            .update_object(self, &old, new.clone())
            .map_err(ErrSnake::Update)?;
        self.state.write().unwrap().dots = new.into_dots();

        Ok(())
    }

    fn eat(&self, object: &dyn GameObject, dot: Dot) -> bool {
        let Some(food) = object.as_food() else {
            return false;
        };
        let value = food.nutritional_value(dot);
        if value == 0 {
            // stale cell: the food no longer owns it, but somebody does
            return false;
        }
        self.feed(value);
        true
    }

    fn die(&self, world: &Arc<World>) {
        let location = self.location();
        if let Err(error) = world.delete_object(self, &location) {
            tracing::debug!(snake = self.id, %error, "dead snake was not registered");
            return;
        }
        if let Err(error) = Corpse::create(world, location) {
            tracing::debug!(snake = self.id, %error, "corpse was not laid");
        }
    }

    fn feed(&self, value: u16) {
        let mut state = self.state.write().unwrap();
        state.length = state.length.saturating_add(value);
    }

    fn delay(&self) -> Duration {
        let length = self.state.read().unwrap().length;
        // longer snakes tick slower
        SNAKE_START_SPEED.mul_f64(SNAKE_SPEED_FACTOR.powi(i32::from(length)))
    }

    /// Applies a movement command. A turn opposite to the last committed
    /// step is rejected.
    pub fn command(&self, command: &str) -> Result<(), ErrSnake> {
        let direction =
            Direction::from_command(command).map_err(|_| ErrSnake::UnknownCommand)?;
        let mut state = self.state.write().unwrap();
        let current = if state.dots.len() >= 2 {
            // the neck may wrap the border; fall back to the stored heading
            calculate_direction(state.dots[1], state.dots[0]).unwrap_or(state.direction)
        } else {
            state.direction
        };
        if direction.reverse() == current {
            return Err(ErrSnake::OppositeDirection);
        }
        state.direction = direction;
        Ok(())
    }
}

impl GameObject for Snake {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn view(&self) -> ObjectView {
        ObjectView::Snake {
            id: self.id,
            dots: self.location(),
        }
    }
}
