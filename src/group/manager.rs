use dashmap::DashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use thiserror::Error;

use super::Group;
use crate::playground::ErrPlayground;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrGroupManager {
    #[error("groups limit reached")]
    GroupsLimit,
    #[error("connections limit reached")]
    ConnsLimit,
    #[error("unknown group")]
    NotFoundGroup,
    #[error("group is not empty")]
    GroupNotEmpty,
    #[error("cannot create group: {0}")]
    CreateGroup(ErrPlayground),
}

/// Summary of one group for the REST layer.
#[derive(Debug, Clone, Copy)]
pub struct GroupInfo {
    pub id: usize,
    pub limit: usize,
    pub count: usize,
    pub width: u8,
    pub height: u8,
}

struct Budget {
    next_id: usize,
    capacity_used: usize,
}

/// Process-wide registry of game groups. Keeps the sum of per-group
/// connection limits within the host budget and the number of groups within
/// the groups cap.
pub struct GroupManager {
    groups: DashMap<usize, Arc<Group>>,
    budget: StdMutex<Budget>,
    groups_limit: usize,
    conns_limit: usize,
    seed: u64,
}

impl GroupManager {
    pub fn new(groups_limit: usize, conns_limit: usize, seed: u64) -> Self {
        Self {
            groups: DashMap::new(),
            budget: StdMutex::new(Budget {
                next_id: 1,
                capacity_used: 0,
            }),
            groups_limit,
            conns_limit,
            seed,
        }
    }

    pub fn new_group(
        &self,
        limit: usize,
        width: u8,
        height: u8,
    ) -> Result<Arc<Group>, ErrGroupManager> {
        let mut budget = self.budget.lock().unwrap();
        if self.groups.len() >= self.groups_limit {
            return Err(ErrGroupManager::GroupsLimit);
        }
        if budget.capacity_used + limit > self.conns_limit {
            return Err(ErrGroupManager::ConnsLimit);
        }
        let id = budget.next_id;
        let seed = self.seed.wrapping_add(id as u64);
        let group =
            Group::new(id, limit, width, height, seed).map_err(ErrGroupManager::CreateGroup)?;
        budget.next_id += 1;
        budget.capacity_used += limit;
        self.groups.insert(id, Arc::clone(&group));
        tracing::info!(group = id, limit, width, height, "group created");
        Ok(group)
    }

    pub fn get(&self, id: usize) -> Result<Arc<Group>, ErrGroupManager> {
        self.groups
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ErrGroupManager::NotFoundGroup)
    }

    /// Deletes an empty group, stopping its world and broadcast and freeing
    /// its share of the connection budget.
    pub fn delete(&self, id: usize) -> Result<(), ErrGroupManager> {
        let mut budget = self.budget.lock().unwrap();
        let group = self
            .groups
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ErrGroupManager::NotFoundGroup)?;
        if !group.is_empty() {
            return Err(ErrGroupManager::GroupNotEmpty);
        }
        self.groups.remove(&id);
        budget.capacity_used = budget.capacity_used.saturating_sub(group.limit());
        group.stop();
        tracing::info!(group = id, "group deleted");
        Ok(())
    }

    pub fn list(&self) -> Vec<GroupInfo> {
        let mut infos: Vec<GroupInfo> = self
            .groups
            .iter()
            .map(|entry| {
                let group = entry.value();
                GroupInfo {
                    id: group.id(),
                    limit: group.limit(),
                    count: group.connection_count(),
                    width: group.world().width(),
                    height: group.world().height(),
                }
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups_limit(&self) -> usize {
        self.groups_limit
    }

    pub fn conns_limit(&self) -> usize {
        self.conns_limit
    }

    pub fn capacity_used(&self) -> usize {
        self.budget.lock().unwrap().capacity_used
    }
}
