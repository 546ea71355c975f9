use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::broadcast::GroupBroadcast;
use crate::connection::ConnectionWorker;
use crate::objects::{Apple, Mouse, Wall, Watermelon};
use crate::observers;
use crate::playground::{ErrPlayground, Playground};
use crate::world::World;

mod manager;

pub use manager::{ErrGroupManager, GroupInfo, GroupManager};

// Initial population, scaled to the grid area.
const CELLS_PER_WALL: u16 = 100;
const CELLS_PER_APPLE: u16 = 50;
const CELLS_PER_MOUSE: u16 = 200;
const WATERMELON_MIN_CELLS: u16 = 100;
const WALL_MAX_SIDE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrGroup {
    #[error("group is full")]
    GroupFull,
}

/// One playable session: a world, its broadcast bus and the set of connected
/// workers, capped at `limit`.
pub struct Group {
    id: usize,
    limit: usize,
    world: Arc<World>,
    broadcast: Arc<GroupBroadcast>,
    connections: AtomicUsize,
    stop_tx: watch::Sender<bool>,
}

impl Group {
    pub fn new(
        id: usize,
        limit: usize,
        width: u8,
        height: u8,
        seed: u64,
    ) -> Result<Arc<Self>, ErrPlayground> {
        let playground = Playground::new(width, height, StdRng::seed_from_u64(seed))?;
        let world = World::new(playground);
        world.start();
        let broadcast = GroupBroadcast::new();
        broadcast.start();
        let (stop_tx, _) = watch::channel(false);

        let group = Arc::new(Self {
            id,
            limit,
            world,
            broadcast,
            connections: AtomicUsize::new(0),
            stop_tx,
        });
        group.seed_world();
        observers::spawn_logger(&group.world, id);
        observers::spawn_apple_keeper(&group.world, id);
        Ok(group)
    }

    /// Populates a fresh world with walls and food.
    fn seed_world(&self) {
        let size = self.world.size();
        let mut rng = StdRng::seed_from_u64(u64::from(size) ^ self.id as u64);

        for _ in 0..size / CELLS_PER_WALL {
            let width = rng.gen_range(1..=WALL_MAX_SIDE);
            let height = rng.gen_range(1..=WALL_MAX_SIDE);
            if let Err(error) = Wall::create_random_rect(&self.world, width, height) {
                tracing::debug!(group = self.id, %error, "wall placement skipped");
            }
        }
        for _ in 0..(size / CELLS_PER_APPLE).max(1) {
            if let Err(error) = Apple::create(&self.world) {
                tracing::debug!(group = self.id, %error, "apple placement skipped");
            }
        }
        for _ in 0..size / CELLS_PER_MOUSE {
            if let Err(error) = Mouse::create(&self.world) {
                tracing::debug!(group = self.id, %error, "mouse placement skipped");
            }
        }
        if size >= WATERMELON_MIN_CELLS {
            if let Err(error) = Watermelon::create(&self.world) {
                tracing::debug!(group = self.id, %error, "watermelon placement skipped");
            }
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn is_full(&self) -> bool {
        self.connection_count() >= self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.connection_count() == 0
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn broadcast(&self) -> &Arc<GroupBroadcast> {
        &self.broadcast
    }

    /// Runs `worker` inside this group: takes a connection slot for the whole
    /// life of the worker and frees it afterwards.
    pub async fn handle(&self, worker: ConnectionWorker) -> Result<(), ErrGroup> {
        self.acquire_slot()?;
        worker
            .start(
                self.stop_tx.subscribe(),
                Arc::clone(&self.world),
                Arc::clone(&self.broadcast),
            )
            .await;
        self.release_slot();
        Ok(())
    }

    fn acquire_slot(&self) -> Result<(), ErrGroup> {
        let mut current = self.connections.load(Ordering::SeqCst);
        loop {
            if current >= self.limit {
                return Err(ErrGroup::GroupFull);
            }
            match self.connections.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn release_slot(&self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }

    /// Stops every task bound to this group and closes both buses.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        self.world.stop();
        self.broadcast.stop();
    }
}
