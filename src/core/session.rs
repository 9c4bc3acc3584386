//! Session entity, state machine, and registry (spec §3 Session, §4.3).

use std::collections::HashMap;

use log::{debug, info};

use super::error::{CoreError, CoreResult};
use super::ids::{SeatId, SessionId};

/// `opening → active ↔ online → closing → closed` (spec §4.3). Transitions are driven
/// externally; the core only enforces that `closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Active,
    Online,
    Closing,
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// What kind of login this is, mirroring logind's `Class` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionClass {
    #[default]
    User,
    Greeter,
    LockScreen,
}

/// The display protocol (or lack of one) the session runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionType {
    #[default]
    Unspecified,
    Tty,
    X11,
    Wayland,
    Mir,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub uid: u32,
    pub seat: Option<SeatId>,
    /// Bus peer that claims exclusive device control over this session's seat devices.
    pub controller: Option<String>,
    pub vt: Option<u32>,
    pub state: SessionState,
    pub idle_hint: bool,
    pub idle_since: u64,
    pub class: SessionClass,
    pub kind: SessionType,
}

impl Session {
    fn new(id: SessionId, uid: u32) -> Self {
        Session {
            id,
            uid,
            seat: None,
            controller: None,
            vt: None,
            state: SessionState::Opening,
            idle_hint: false,
            idle_since: 0,
            class: SessionClass::default(),
            kind: SessionType::default(),
        }
    }

    /// Construct a bare session outside the registry, for restoring persisted state
    /// (spec §4.11) before it is re-inserted via `SessionRegistry::upsert`.
    pub fn new_for_restore(id: SessionId, uid: u32) -> Self {
        Self::new(id, uid)
    }

    /// Advance the state machine. Rejects any transition out of `Closed` (spec §4.3: terminal).
    pub fn transition(&mut self, next: SessionState) -> CoreResult<()> {
        if self.state.is_terminal() {
            return Err(CoreError::InvalidArgument(format!(
                "session {} is already closed",
                self.id
            )));
        }
        debug!("session {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn set_idle_hint(&mut self, idle: bool, since: u64) {
        self.idle_hint = idle;
        self.idle_since = since;
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert: `uid` and all other construction parameters apply only on creation
    /// (spec §4.1).
    pub fn upsert(&mut self, id: &SessionId, uid: u32) -> CoreResult<&mut Session> {
        if !self.sessions.contains_key(id) {
            info!("session {id} created for uid {uid}");
            self.sessions.insert(id.clone(), Session::new(id.clone(), uid));
        }
        Ok(self.sessions.get_mut(id).expect("just ensured present"))
    }

    /// Re-insert a session recovered from persisted state (spec §4.11), preserving its seat,
    /// controller, vt, class, kind and state rather than rebuilding a fresh one through
    /// `upsert`. Idempotent: a session already present under this id is left untouched.
    pub fn insert_restored(&mut self, session: Session) -> CoreResult<()> {
        if self.sessions.contains_key(&session.id) {
            return Ok(());
        }
        info!("session {} restored for uid {}", session.id, session.uid);
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn free(&mut self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            info!("session {id} freed");
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn require(&self, id: &SessionId) -> CoreResult<&Session> {
        self.get(id)
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))
    }

    /// Find the session whose controller bus-peer equals `name`, used by bus-name watch drop
    /// (spec §4.7) and by the process/session resolver's inverse lookups.
    pub fn find_by_controller(&self, name: &str) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| s.controller.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_ignores_uid_on_repeat() {
        let mut reg = SessionRegistry::new();
        let id = SessionId::new("c1");
        reg.upsert(&id, 1000).unwrap();
        reg.upsert(&id, 2000).unwrap();
        assert_eq!(reg.get(&id).unwrap().uid, 1000);
    }

    #[test]
    fn closed_is_terminal() {
        let mut reg = SessionRegistry::new();
        let id = SessionId::new("c1");
        let sess = reg.upsert(&id, 1000).unwrap();
        sess.transition(SessionState::Active).unwrap();
        sess.transition(SessionState::Closed).unwrap();
        assert!(sess.transition(SessionState::Active).is_err());
    }

    #[test]
    fn insert_restored_preserves_fields_and_is_idempotent() {
        let mut reg = SessionRegistry::new();
        let id = SessionId::new("c1");
        let mut restored = Session::new_for_restore(id.clone(), 1000);
        restored.seat = Some(SeatId::parse("seat1").unwrap());
        restored.state = SessionState::Active;
        reg.insert_restored(restored).unwrap();

        assert_eq!(reg.get(&id).unwrap().state, SessionState::Active);
        assert_eq!(reg.get(&id).unwrap().seat, Some(SeatId::parse("seat1").unwrap()));

        // A second restore attempt for the same id is a no-op, not an overwrite.
        let mut other = Session::new_for_restore(id.clone(), 2000);
        other.state = SessionState::Closed;
        reg.insert_restored(other).unwrap();
        assert_eq!(reg.get(&id).unwrap().uid, 1000);
        assert_eq!(reg.get(&id).unwrap().state, SessionState::Active);
    }
}
