//! User entity and registry (spec §3 User, §4.1).

use std::collections::{HashMap, HashSet};

use log::info;

use super::error::{CoreError, CoreResult};
use super::ids::SessionId;

#[derive(Debug, Clone)]
pub struct User {
    pub uid: u32,
    pub gid: u32,
    pub name: String,
    pub sessions: HashSet<SessionId>,
    pub runtime_dir_ready: bool,
    pub linger: bool,
    pub gc_pending: bool,
}

impl User {
    fn new(uid: u32, gid: u32, name: String) -> Self {
        User {
            uid,
            gid,
            name,
            sessions: HashSet::new(),
            runtime_dir_ready: false,
            linger: false,
            gc_pending: false,
        }
    }

    /// Construct a bare user outside the registry, for restoring persisted state (spec §4.11)
    /// before it is re-inserted via `UserRegistry::upsert`.
    pub fn new_for_restore(uid: u32, gid: u32, name: String) -> Self {
        Self::new(uid, gid, name)
    }

    /// GC-eligible once the session set is empty and nothing is keeping the runtime directory
    /// alive (spec §3): lingering users are kept even with no sessions.
    pub fn is_collectible(&self) -> bool {
        self.sessions.is_empty() && !self.linger
    }
}

#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<u32, User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert: `gid`/`name` apply only on creation (spec §4.1).
    pub fn upsert(&mut self, uid: u32, gid: u32, name: &str) -> CoreResult<&mut User> {
        if !self.users.contains_key(&uid) {
            info!("user {uid} ({name}) created");
            self.users.insert(uid, User::new(uid, gid, name.to_string()));
        }
        Ok(self.users.get_mut(&uid).expect("just ensured present"))
    }

    pub fn get(&self, uid: u32) -> Option<&User> {
        self.users.get(&uid)
    }

    pub fn get_mut(&mut self, uid: u32) -> Option<&mut User> {
        self.users.get_mut(&uid)
    }

    pub fn contains(&self, uid: u32) -> bool {
        self.users.contains_key(&uid)
    }

    pub fn mark_gc_pending(&mut self, uid: u32) {
        if let Some(u) = self.users.get_mut(&uid) {
            u.gc_pending = true;
        }
    }

    pub fn free(&mut self, uid: u32) -> Option<User> {
        let removed = self.users.remove(&uid);
        if removed.is_some() {
            info!("user {uid} freed");
        }
        removed
    }

    /// Sweep: free every collectible user marked GC-pending.
    pub fn sweep(&mut self) -> Vec<u32> {
        let dead: Vec<u32> = self
            .users
            .values()
            .filter(|u| u.gc_pending && u.is_collectible())
            .map(|u| u.uid)
            .collect();
        for uid in &dead {
            self.free(*uid);
        }
        dead
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn require(&self, uid: u32) -> CoreResult<&User> {
        self.get(uid)
            .ok_or_else(|| CoreError::NotFound(format!("user {uid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_idempotent() {
        let mut reg = UserRegistry::new();
        reg.upsert(1000, 1000, "alice").unwrap();
        reg.upsert(1000, 2000, "bob").unwrap();
        let u = reg.get(1000).unwrap();
        assert_eq!(u.gid, 1000);
        assert_eq!(u.name, "alice");
    }

    #[test]
    fn lingering_user_is_not_collectible() {
        let mut reg = UserRegistry::new();
        let u = reg.upsert(1000, 1000, "alice").unwrap();
        u.linger = true;
        reg.mark_gc_pending(1000);
        assert!(reg.sweep().is_empty());
        assert!(reg.contains(1000));
    }
}
