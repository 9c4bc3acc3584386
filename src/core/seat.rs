//! Seat entity and registry (spec §3 Seat, §4.1).

use std::collections::HashMap;

use log::{debug, info};

use super::error::{CoreError, CoreResult};
use super::ids::{SeatId, SessionId};

#[derive(Debug, Clone, Default)]
pub struct Seat {
    pub id: SeatId,
    pub devices: Vec<String>,
    pub sessions: Vec<SessionId>,
    pub active: Option<SessionId>,
    pub started: bool,
    pub gc_pending: bool,
}

impl Seat {
    fn new(id: SeatId) -> Self {
        Seat {
            id,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.sessions.is_empty()
    }

    pub fn attach_device(&mut self, syspath: &str) {
        if !self.devices.iter().any(|d| d == syspath) {
            self.devices.push(syspath.to_string());
        }
    }

    pub fn detach_device(&mut self, syspath: &str) {
        self.devices.retain(|d| d != syspath);
    }

    pub fn attach_session(&mut self, id: SessionId) {
        if !self.sessions.contains(&id) {
            self.sessions.push(id);
        }
    }

    pub fn detach_session(&mut self, id: &SessionId) {
        self.sessions.retain(|s| s != id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }

    /// Invariant (spec §3): `active` must point into `sessions` or be null.
    pub fn set_active(&mut self, id: Option<SessionId>) -> CoreResult<()> {
        if let Some(ref sid) = id {
            if !self.sessions.contains(sid) {
                return Err(CoreError::InvalidArgument(format!(
                    "session {sid} is not attached to seat {}",
                    self.id
                )));
            }
        }
        self.active = id;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SeatRegistry {
    seats: HashMap<SeatId, Seat>,
}

impl SeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert: construction parameters only apply on creation (spec §4.1).
    pub fn upsert(&mut self, id: &SeatId) -> CoreResult<&mut Seat> {
        if !self.seats.contains_key(id) {
            debug!("seat {id} created");
            self.seats.insert(id.clone(), Seat::new(id.clone()));
        }
        Ok(self.seats.get_mut(id).expect("just ensured present"))
    }

    pub fn get(&self, id: &SeatId) -> Option<&Seat> {
        self.seats.get(id)
    }

    pub fn get_mut(&mut self, id: &SeatId) -> Option<&mut Seat> {
        self.seats.get_mut(id)
    }

    pub fn contains(&self, id: &SeatId) -> bool {
        self.seats.contains_key(id)
    }

    /// Start the seat: a no-op if already started, otherwise flips the flag and logs once.
    pub fn start(&mut self, id: &SeatId) -> CoreResult<()> {
        let seat = self
            .seats
            .get_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("seat {id}")))?;
        if !seat.started {
            seat.started = true;
            info!("seat {id} started");
        }
        Ok(())
    }

    pub fn mark_gc_pending(&mut self, id: &SeatId) {
        if let Some(s) = self.seats.get_mut(id) {
            s.gc_pending = true;
        }
    }

    /// Free a seat unconditionally.
    pub fn free(&mut self, id: &SeatId) -> Option<Seat> {
        let removed = self.seats.remove(id);
        if removed.is_some() {
            info!("seat {id} freed");
        }
        removed
    }

    /// Sweep: free every empty seat marked GC-pending. Re-referencing (attaching a device or
    /// session) clears `gc_pending` elsewhere, so only genuinely abandoned seats are collected.
    pub fn sweep(&mut self) -> Vec<SeatId> {
        let dead: Vec<SeatId> = self
            .seats
            .values()
            .filter(|s| s.gc_pending && s.is_empty())
            .map(|s| s.id.clone())
            .collect();
        for id in &dead {
            self.free(id);
        }
        dead
    }

    pub fn iter(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }
}
