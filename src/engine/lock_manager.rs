//! Lock manager for session and row locks
//!
//! Shared/exclusive locks keyed by [`LockResource`], owned by connection
//! ids. Non-blocking requests fail fast; blocking requests wait on a
//! release signal until a deadline. An entry is dropped from the table as
//! soon as its last holder releases it.

use crate::error::{CtdbError, Result};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Lock owner (connection id)
pub type OwnerId = u64;

/// Lockable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockResource {
    /// Engine-wide session lock
    Session,
    /// A single row of an open table file
    Row { file: u64, row: u64 },
}

/// Lock strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Shared lock (read)
    Shared,
    /// Exclusive lock (write)
    Exclusive,
}

/// Holders of a single resource
struct LockEntry {
    holders: RwLock<Vec<(OwnerId, LockKind)>>,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            holders: RwLock::new(Vec::new()),
        }
    }

    /// First holder that conflicts with `owner` taking `kind`
    fn conflict(holders: &[(OwnerId, LockKind)], owner: OwnerId, kind: LockKind) -> Option<(OwnerId, LockKind)> {
        holders
            .iter()
            .find(|(id, held)| {
                *id != owner && (kind == LockKind::Exclusive || *held == LockKind::Exclusive)
            })
            .copied()
    }

    /// Grant atomically, replacing any lock `owner` already holds
    fn try_grant(&self, owner: OwnerId, kind: LockKind) -> std::result::Result<(), (OwnerId, LockKind)> {
        let mut holders = self.holders.write();
        if let Some(conflict) = Self::conflict(&holders, owner, kind) {
            return Err(conflict);
        }
        holders.retain(|(id, _)| *id != owner);
        holders.push((owner, kind));
        Ok(())
    }

    fn release(&self, owner: OwnerId) -> bool {
        let mut holders = self.holders.write();
        let before = holders.len();
        holders.retain(|(id, _)| *id != owner);
        holders.len() != before
    }

    fn is_free(&self) -> bool {
        self.holders.read().is_empty()
    }

    fn holds_lock(&self, owner: OwnerId) -> Option<LockKind> {
        self.holders
            .read()
            .iter()
            .find(|(id, _)| *id == owner)
            .map(|(_, kind)| *kind)
    }
}

pub struct LockManager {
    /// Grants and pruning both run under the resource's shard lock
    locks: DashMap<LockResource, LockEntry>,

    /// owner -> resources it holds
    owner_locks: Mutex<HashMap<OwnerId, HashSet<LockResource>>>,

    /// Bumped on every release; blocking waiters sleep on it
    releases: Mutex<u64>,
    release_signal: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
            owner_locks: Mutex::new(HashMap::new()),
            releases: Mutex::new(0),
            release_signal: Condvar::new(),
        }
    }

    /// Acquire without waiting
    ///
    /// Re-acquiring by the same owner replaces its mode: an upgrade
    /// succeeds only when no one else holds the resource.
    pub fn try_acquire(&self, owner: OwnerId, resource: LockResource, kind: LockKind) -> Result<()> {
        let granted = self
            .locks
            .entry(resource)
            .or_insert_with(LockEntry::new)
            .try_grant(owner, kind);
        match granted {
            Ok(()) => {
                self.owner_locks.lock().entry(owner).or_default().insert(resource);
                Ok(())
            }
            Err((holder, held)) => Err(CtdbError::LockConflict(format!(
                "{:?} lock on {} denied: held {:?} by connection {}",
                kind,
                describe(resource),
                held,
                holder
            ))),
        }
    }

    /// Drop the entry for `resource` if nobody holds it
    fn prune(&self, resource: LockResource) {
        self.locks.remove_if(&resource, |_, entry| entry.is_free());
    }

    /// Acquire, waiting up to `timeout` for conflicting holders to release
    pub fn acquire_blocking(
        &self,
        owner: OwnerId,
        resource: LockResource,
        kind: LockKind,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut releases = self.releases.lock();
        loop {
            match self.try_acquire(owner, resource, kind) {
                Ok(()) => return Ok(()),
                Err(err) if Instant::now() >= deadline => return Err(err),
                Err(_) => {}
            }
            if self.release_signal.wait_until(&mut releases, deadline).timed_out() {
                return self.try_acquire(owner, resource, kind);
            }
        }
    }

    /// Release one resource; returns whether `owner` held it
    pub fn release(&self, owner: OwnerId, resource: LockResource) -> bool {
        let released = self
            .locks
            .get(&resource)
            .map(|entry| entry.release(owner))
            .unwrap_or(false);

        if let Some(held) = self.owner_locks.lock().get_mut(&owner) {
            held.remove(&resource);
        }
        self.prune(resource);
        if released {
            self.notify_release();
        }
        released
    }

    /// Release every lock held by `owner`
    pub fn release_all(&self, owner: OwnerId) {
        let held = self.owner_locks.lock().remove(&owner).unwrap_or_default();
        self.release_set(owner, held);
    }

    /// Release the row locks `owner` holds in one table file
    pub fn release_file_rows(&self, owner: OwnerId, file: u64) {
        let rows: HashSet<LockResource> = {
            let mut owner_locks = self.owner_locks.lock();
            match owner_locks.get_mut(&owner) {
                Some(held) => {
                    let rows: HashSet<_> = held
                        .iter()
                        .filter(|r| matches!(r, LockResource::Row { file: f, .. } if *f == file))
                        .copied()
                        .collect();
                    held.retain(|r| !rows.contains(r));
                    rows
                }
                None => HashSet::new(),
            }
        };
        self.release_set(owner, rows);
    }

    fn release_set(&self, owner: OwnerId, resources: HashSet<LockResource>) {
        let mut any = false;
        for resource in resources {
            if let Some(entry) = self.locks.get(&resource) {
                any |= entry.release(owner);
            }
            self.prune(resource);
        }
        if any {
            self.notify_release();
        }
    }

    fn notify_release(&self) {
        let mut releases = self.releases.lock();
        *releases = releases.wrapping_add(1);
        self.release_signal.notify_all();
    }

    pub fn holds(&self, owner: OwnerId, resource: LockResource) -> Option<LockKind> {
        self.locks.get(&resource).and_then(|entry| entry.holds_lock(owner))
    }

    /// Another owner's lock that would block `owner` from taking `kind`
    pub fn conflicting_holder(
        &self,
        owner: OwnerId,
        resource: LockResource,
        kind: LockKind,
    ) -> Option<(OwnerId, LockKind)> {
        let entry = self.locks.get(&resource)?;
        let holders = entry.holders.read();
        LockEntry::conflict(&holders, owner, kind)
    }

    pub fn stats(&self) -> LockManagerStats {
        let owner_locks = self.owner_locks.lock();

        LockManagerStats {
            total_locks: self.locks.len() as u64,
            active_owners: owner_locks.values().filter(|s| !s.is_empty()).count() as u64,
            total_held: owner_locks.values().map(|s| s.len() as u64).sum(),
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(resource: LockResource) -> String {
    match resource {
        LockResource::Session => "session resources".to_string(),
        LockResource::Row { file, row } => format!("row {} of table file {}", row, file),
    }
}

/// Lock manager statistics
#[derive(Debug, Clone)]
pub struct LockManagerStats {
    pub total_locks: u64,
    pub active_owners: u64,
    pub total_held: u64,
}
