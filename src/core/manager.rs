//! Orchestration surface (spec §2 component 9): the API the bus glue calls into.
//!
//! `Manager` owns the four registries, the inhibitor engine, the bus-name watch set, and wires
//! the relationship graph edits that keep spec §8's invariants true after every mutation.

use log::{info, warn};

use crate::config::Config;

use super::device::DeviceRegistry;
use super::error::{CoreError, CoreResult};
use super::hotplug::{handle_seat_device, HotplugOutcome, SeatDeviceEvent};
use super::idle::{self, SessionIdle};
use super::ids::{SeatId, SessionId};
use super::inhibitor::{InhibitorEngine, Mode, What};
use super::seat::SeatRegistry;
use super::session::{Session, SessionRegistry, SessionState};
use super::user::UserRegistry;
use super::bus_watch::BusNameWatchSet;

/// Resolves a process id to the session that owns it, backed by the cgroup classifier
/// (spec §4.8) in production and by a fixed table in tests.
pub trait ProcessResolver {
    fn session_of(&self, pid: i32) -> Option<SessionId>;
}

/// Resolver that never finds a session — matches the spec's "classifier failure is not an
/// error" contract: every `ignore_inactive` query is filtered out rather than panicking.
#[derive(Default)]
pub struct NullProcessResolver;

impl ProcessResolver for NullProcessResolver {
    fn session_of(&self, _pid: i32) -> Option<SessionId> {
        None
    }
}

pub struct Manager {
    pub devices: DeviceRegistry,
    pub seats: SeatRegistry,
    pub sessions: SessionRegistry,
    pub users: UserRegistry,
    pub inhibitors: InhibitorEngine,
    pub bus_watch: BusNameWatchSet,
    resolver: Box<dyn ProcessResolver>,
}

impl Manager {
    pub fn new() -> Self {
        Manager {
            devices: DeviceRegistry::new(),
            seats: SeatRegistry::new(),
            sessions: SessionRegistry::new(),
            users: UserRegistry::new(),
            inhibitors: InhibitorEngine::new(),
            bus_watch: BusNameWatchSet::new(),
            resolver: Box::new(NullProcessResolver),
        }
    }

    pub fn with_resolver(resolver: Box<dyn ProcessResolver>) -> Self {
        Manager {
            resolver,
            ..Self::new()
        }
    }

    // ---- hot-plug dispatch (spec §4.2) -----------------------------------------------------

    pub fn handle_seat_device_event(
        &mut self,
        event: &SeatDeviceEvent<'_>,
    ) -> CoreResult<HotplugOutcome> {
        let outcome = handle_seat_device(event, &mut self.devices, &mut self.seats)?;
        self.sweep_gc();
        Ok(outcome)
    }

    // ---- sessions (spec §6 bus surface) ----------------------------------------------------

    /// `add_session(id, uid, …) → Session` (spec §6). Creates the user and, if named, the seat as
    /// a side effect, and wires every cross-link spec §8 requires.
    pub fn add_session(
        &mut self,
        id: &SessionId,
        uid: u32,
        gid: u32,
        username: &str,
        seat: Option<&SeatId>,
    ) -> CoreResult<&Session> {
        self.users.upsert(uid, gid, username)?;
        let user = self.users.get_mut(uid).expect("just upserted");
        user.sessions.insert(id.clone());
        user.gc_pending = false;

        if self.sessions.contains(id) {
            return self.sessions.require(id);
        }

        let session = self.sessions.upsert(id, uid)?;
        session.seat = seat.cloned();

        if let Some(seat_id) = seat {
            let seat_rec = self.seats.upsert(seat_id)?;
            seat_rec.attach_session(id.clone());
            seat_rec.gc_pending = false;
            self.seats.start(seat_id)?;
        }

        self.sessions.require(id)
    }

    /// Release (log out) a session: unwind every back-reference, enqueue the owning user and
    /// seat for GC if they're now empty (spec §4.3).
    pub fn release_session(&mut self, id: &SessionId) -> CoreResult<()> {
        let Some(mut session) = self.sessions.free(id) else {
            return Err(CoreError::NotFound(format!("session {id}")));
        };
        session.transition(SessionState::Closed).ok();

        if let Some(seat_id) = &session.seat {
            if let Some(seat) = self.seats.get_mut(seat_id) {
                seat.detach_session(id);
                if seat.is_empty() {
                    seat.gc_pending = true;
                }
            }
        }

        if let Some(user) = self.users.get_mut(session.uid) {
            user.sessions.remove(id);
            if user.is_collectible() {
                user.gc_pending = true;
            }
        }

        self.sweep_gc();
        Ok(())
    }

    pub fn activate_session(&mut self, id: &SessionId) -> CoreResult<()> {
        let session = self.sessions.require(id)?;
        let seat_id = session
            .seat
            .clone()
            .ok_or_else(|| CoreError::InvalidArgument(format!("session {id} has no seat")))?;
        let seat = self
            .seats
            .get_mut(&seat_id)
            .ok_or_else(|| CoreError::NotFound(format!("seat {seat_id}")))?;
        seat.set_active(Some(id.clone()))?;
        let session = self.sessions.get_mut(id).expect("checked above");
        if session.state != SessionState::Closing {
            session.transition(SessionState::Active)?;
        }
        Ok(())
    }

    pub fn lock_session(&mut self, id: &SessionId) -> CoreResult<()> {
        // Locking does not change the state machine; it is purely a UI concern signalled to
        // whichever greeter owns the seat. The core only validates the session exists.
        self.sessions.require(id).map(|_| ())
    }

    pub fn unlock_session(&mut self, id: &SessionId) -> CoreResult<()> {
        self.sessions.require(id).map(|_| ())
    }

    // ---- inhibitors (spec §4.4, §6) --------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_inhibitor(
        &mut self,
        what: What,
        mode: Mode,
        who: &str,
        why: &str,
        uid: u32,
        pid: i32,
        since: u64,
    ) -> String {
        self.inhibitors.create(what, mode, who, why, uid, pid, since)
    }

    pub fn release_inhibitor(&mut self, id: &str) {
        self.inhibitors.free(id);
    }

    pub fn is_inhibited(
        &self,
        what: What,
        mode: Mode,
        for_uid: Option<u32>,
        ignore_inactive: bool,
    ) -> (bool, u64) {
        let predicate = |pid: i32| -> bool {
            match self.resolver.session_of(pid) {
                Some(session_id) => matches!(
                    self.sessions.get(&session_id).map(|s| s.state),
                    Some(SessionState::Active) | Some(SessionState::Online)
                ),
                None => false,
            }
        };
        self.inhibitors
            .is_inhibited(what, mode, for_uid, ignore_inactive, &predicate)
    }

    // ---- idle aggregation (spec §4.5) ------------------------------------------------------

    pub fn idle_hint(&self) -> (bool, u64) {
        let (idle_inhibited, _) = self.is_inhibited(What::IDLE, Mode::Block, None, false);
        let reports = self.sessions.iter().map(|s| SessionIdle {
            idle: s.idle_hint,
            since: s.idle_since,
        });
        idle::aggregate(idle_inhibited, reports)
    }

    // ---- device management bus ops (spec §6) -----------------------------------------------

    /// `attach_device(seat_id, syspath, override)`: move a device onto `seat_id`, detaching it
    /// from any seat it currently belongs to. Refuses to move a device away from a seat it is
    /// already attached to unless `override_` is set.
    pub fn attach_device(&mut self, seat_id: &SeatId, syspath: &str, override_: bool) -> CoreResult<()> {
        let existing_seat = self.devices.get(syspath).and_then(|d| d.seat.clone());
        if let Some(ref current) = existing_seat {
            if current == seat_id {
                return Ok(());
            }
            if !override_ {
                return Err(CoreError::Busy(format!(
                    "device {syspath} is already attached to seat {current}"
                )));
            }
            if let Some(seat) = self.seats.get_mut(current) {
                seat.detach_device(syspath);
                if seat.is_empty() {
                    seat.gc_pending = true;
                }
            }
        }

        self.devices.upsert(syspath, false)?;
        let seat = self.seats.upsert(seat_id)?;
        seat.attach_device(syspath);
        seat.gc_pending = false;
        self.seats.start(seat_id)?;
        if let Some(device) = self.devices.get_mut(syspath) {
            device.seat = Some(seat_id.clone());
        }
        self.sweep_gc();
        Ok(())
    }

    /// `flush_devices()`: drop every non-master device from every seat, forcing a future
    /// hot-plug re-enumeration to re-derive seat membership from scratch.
    pub fn flush_devices(&mut self) {
        let flushable: Vec<String> = self
            .devices
            .iter()
            .filter(|d| !d.master)
            .map(|d| d.syspath.clone())
            .collect();
        for syspath in flushable {
            if let Some(device) = self.devices.free(&syspath) {
                if let Some(seat_id) = device.seat {
                    if let Some(seat) = self.seats.get_mut(&seat_id) {
                        seat.detach_device(&syspath);
                        if seat.is_empty() {
                            seat.gc_pending = true;
                        }
                    }
                }
            }
        }
        info!("flushed non-master devices");
        self.sweep_gc();
    }

    pub fn set_user_linger(&mut self, uid: u32, enable: bool) -> CoreResult<()> {
        let user = self.users.get_mut(uid).ok_or(CoreError::NotFound(format!("user {uid}")))?;
        user.linger = enable;
        if !enable && user.is_collectible() {
            user.gc_pending = true;
            self.sweep_gc();
        }
        Ok(())
    }

    // ---- kill-policy predicate (spec §4.9) -------------------------------------------------

    pub fn shall_kill(config: &Config, username: &str) -> bool {
        if !config.kill.kill_user_processes {
            return false;
        }
        if config.kill.kill_exclude_users.iter().any(|u| u == username) {
            return false;
        }
        if config.kill.kill_only_users.is_empty() {
            return true;
        }
        config.kill.kill_only_users.iter().any(|u| u == username)
    }

    // ---- GC (spec §9: sweep in dependency order until a fixed point) ----------------------

    pub fn sweep_gc(&mut self) {
        loop {
            let seats_freed = !self.seats.sweep().is_empty();
            let users_freed = !self.users.sweep().is_empty();
            if !seats_freed && !users_freed {
                break;
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hotplug::Action;

    fn config_for_kill(kill: bool, exclude: &[&str], only: &[&str]) -> Config {
        let mut cfg = Config::default();
        cfg.kill.kill_user_processes = kill;
        cfg.kill.kill_exclude_users = exclude.iter().map(|s| s.to_string()).collect();
        cfg.kill.kill_only_users = only.iter().map(|s| s.to_string()).collect();
        cfg
    }

    #[test]
    fn kill_policy_matrix() {
        let cfg = config_for_kill(true, &["root"], &["alice"]);
        assert!(!Manager::shall_kill(&cfg, "root"));
        assert!(Manager::shall_kill(&cfg, "alice"));
        assert!(!Manager::shall_kill(&cfg, "bob"));
    }

    #[test]
    fn kill_disabled_globally_never_kills() {
        let cfg = config_for_kill(false, &[], &["alice"]);
        assert!(!Manager::shall_kill(&cfg, "alice"));
    }

    #[test]
    fn add_and_release_session_round_trip_gcs_seat_and_user() {
        let mut mgr = Manager::new();
        let seat = SeatId::parse("seat1").unwrap();
        let sid = SessionId::new("c1");
        mgr.add_session(&sid, 1000, 1000, "alice", Some(&seat)).unwrap();
        assert!(mgr.seats.contains(&seat));
        assert!(mgr.users.contains(1000));

        mgr.release_session(&sid).unwrap();
        assert!(!mgr.seats.contains(&seat));
        assert!(!mgr.users.contains(1000));
    }

    #[test]
    fn hotplug_then_manager_gc_removes_seat_after_device_removed() {
        let mut mgr = Manager::new();
        let add = SeatDeviceEvent {
            action: Action::Add,
            syspath: "/sys/class/drm/card0",
            id_seat: Some("seat1"),
            master_of_seat: true,
        };
        mgr.handle_seat_device_event(&add).unwrap();
        assert!(mgr.seats.contains(&SeatId::parse("seat1").unwrap()));

        let remove = SeatDeviceEvent {
            action: Action::Remove,
            ..add
        };
        mgr.handle_seat_device_event(&remove).unwrap();
        assert!(!mgr.seats.contains(&SeatId::parse("seat1").unwrap()));
    }

    #[test]
    fn linger_keeps_user_alive_without_sessions() {
        let mut mgr = Manager::new();
        mgr.users.upsert(1000, 1000, "alice").unwrap();
        mgr.set_user_linger(1000, true).unwrap();
        mgr.users.mark_gc_pending(1000);
        mgr.sweep_gc();
        assert!(mgr.users.contains(1000));
    }
}
