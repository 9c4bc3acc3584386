//! Persisted state (spec §6 "Persisted state", §4.11).
//!
//! Sessions, users, and inhibitors survive a daemon restart as flat `key=value` files under a
//! runtime directory, one pair per line. Unknown keys are tolerated; a malformed file aborts only
//! that record's restoration (spec §7), logged at `warn!` — never the daemon.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use crate::core::ids::{SeatId, SessionId};
use crate::core::inhibitor::{Mode, What};
use crate::core::session::{Session, SessionClass, SessionState, SessionType};
use crate::core::user::User;

/// Default runtime directory sessions/users/inhibitors are persisted under.
pub fn default_runtime_dir() -> PathBuf {
    std::env::var_os("SEATWARDEN_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/run/seatwarden"))
}

/// Parse a `key=value`-per-line file into a map, skipping blank lines and anything before the
/// first `=` that doesn't parse as `key=value`.
fn parse_kv(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

fn render_kv(pairs: &[(&str, String)]) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Write a session's persisted fields: controller, seat, leader pid (unused by the core but part
/// of the real on-disk shape), tty, class, type.
pub fn save_session(dir: &Path, session: &Session, leader_pid: i32) -> Result<()> {
    let path = dir.join(format!("session-{}", session.id));
    let pairs = [
        ("UID", session.uid.to_string()),
        ("SEAT", session.seat.as_ref().map(|s| s.to_string()).unwrap_or_default()),
        ("CONTROLLER", session.controller.clone().unwrap_or_default()),
        ("LEADER", leader_pid.to_string()),
        ("VTNR", session.vt.map(|v| v.to_string()).unwrap_or_default()),
        ("CLASS", class_to_str(session.class).to_string()),
        ("TYPE", type_to_str(session.kind).to_string()),
        ("STATE", state_to_str(session.state).to_string()),
    ];
    fs::write(&path, render_kv(&pairs))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Restore one session record. Returns `None` (and logs a warning) if the file is malformed,
/// rather than propagating an error that would abort restoration of the rest.
pub fn load_session(dir: &Path, id: &SessionId) -> Option<Session> {
    let path = dir.join(format!("session-{id}"));
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("skipping session {id}: {e}");
            return None;
        }
    };
    let kv = parse_kv(&content);

    let uid: u32 = match kv.get("UID").and_then(|v| v.parse().ok()) {
        Some(u) => u,
        None => {
            warn!("skipping session {id}: missing or malformed UID");
            return None;
        }
    };

    let mut session = Session::new_for_restore(id.clone(), uid);
    if let Some(seat) = kv.get("SEAT").filter(|s| !s.is_empty()) {
        match SeatId::parse(seat) {
            Ok(seat_id) => session.seat = Some(seat_id),
            Err(e) => warn!("session {id}: ignoring malformed SEAT {seat:?}: {e}"),
        }
    }
    if let Some(controller) = kv.get("CONTROLLER").filter(|s| !s.is_empty()) {
        session.controller = Some(controller.clone());
    }
    if let Some(vt) = kv.get("VTNR").and_then(|v| v.parse().ok()) {
        session.vt = Some(vt);
    }
    if let Some(class) = kv.get("CLASS").and_then(|v| class_from_str(v)) {
        session.class = class;
    }
    if let Some(kind) = kv.get("TYPE").and_then(|v| type_from_str(v)) {
        session.kind = kind;
    }
    if let Some(state) = kv.get("STATE").and_then(|v| state_from_str(v)) {
        session.state = state;
    }

    Some(session)
}

pub fn save_user(dir: &Path, user: &User) -> Result<()> {
    let path = dir.join(format!("user-{}", user.uid));
    let sessions = user
        .sessions
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let pairs = [
        ("GID", user.gid.to_string()),
        ("NAME", user.name.clone()),
        ("LINGER", user.linger.to_string()),
        ("SESSIONS", sessions),
    ];
    fs::write(&path, render_kv(&pairs)).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_user(dir: &Path, uid: u32) -> Option<User> {
    let path = dir.join(format!("user-{uid}"));
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("skipping user {uid}: {e}");
            return None;
        }
    };
    let kv = parse_kv(&content);
    let gid: u32 = match kv.get("GID").and_then(|v| v.parse().ok()) {
        Some(g) => g,
        None => {
            warn!("skipping user {uid}: missing or malformed GID");
            return None;
        }
    };
    let name = kv.get("NAME").cloned().unwrap_or_default();
    let mut user = User::new_for_restore(uid, gid, name);
    user.linger = kv.get("LINGER").map(|v| v == "true").unwrap_or(false);
    if let Some(sessions) = kv.get("SESSIONS") {
        for s in sessions.split_whitespace() {
            user.sessions.insert(SessionId::new(s));
        }
    }
    Some(user)
}

/// Inhibitor record as it appears on disk, separate from the runtime `Inhibitor` because the
/// fifo path is a filesystem concern the in-memory engine doesn't need.
pub struct PersistedInhibitor {
    pub what: What,
    pub mode: Mode,
    pub who: String,
    pub why: String,
    pub uid: u32,
    pub pid: i32,
    pub since: u64,
    pub fifo_path: PathBuf,
}

pub fn save_inhibitor(dir: &Path, id: &str, inh: &PersistedInhibitor) -> Result<()> {
    let path = dir.join(format!("inhibitor-{id}"));
    let pairs = [
        ("WHAT", inh.what.bits().to_string()),
        ("MODE", mode_to_str(inh.mode).to_string()),
        ("WHO", inh.who.clone()),
        ("WHY", inh.why.clone()),
        ("UID", inh.uid.to_string()),
        ("PID", inh.pid.to_string()),
        ("SINCE", inh.since.to_string()),
        ("FIFO", inh.fifo_path.display().to_string()),
    ];
    fs::write(&path, render_kv(&pairs)).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_inhibitor(dir: &Path, id: &str) -> Option<PersistedInhibitor> {
    let path = dir.join(format!("inhibitor-{id}"));
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("skipping inhibitor {id}: {e}");
            return None;
        }
    };
    let kv = parse_kv(&content);
    let what = kv
        .get("WHAT")
        .and_then(|v| v.parse::<u32>().ok())
        .and_then(What::from_bits);
    let mode = kv.get("MODE").and_then(|v| mode_from_str(v));
    let (what, mode) = match (what, mode) {
        (Some(w), Some(m)) => (w, m),
        _ => {
            warn!("skipping inhibitor {id}: malformed WHAT/MODE");
            return None;
        }
    };
    let uid: u32 = match kv.get("UID").and_then(|v| v.parse().ok()) {
        Some(u) => u,
        None => {
            warn!("skipping inhibitor {id}: missing or malformed UID");
            return None;
        }
    };
    let pid: i32 = kv.get("PID").and_then(|v| v.parse().ok()).unwrap_or(0);
    let since: u64 = kv.get("SINCE").and_then(|v| v.parse().ok()).unwrap_or(1);
    Some(PersistedInhibitor {
        what,
        mode,
        who: kv.get("WHO").cloned().unwrap_or_default(),
        why: kv.get("WHY").cloned().unwrap_or_default(),
        uid,
        pid,
        since,
        fifo_path: kv.get("FIFO").map(PathBuf::from).unwrap_or_default(),
    })
}

fn class_to_str(c: SessionClass) -> &'static str {
    match c {
        SessionClass::User => "user",
        SessionClass::Greeter => "greeter",
        SessionClass::LockScreen => "lock-screen",
    }
}

fn class_from_str(s: &str) -> Option<SessionClass> {
    match s {
        "user" => Some(SessionClass::User),
        "greeter" => Some(SessionClass::Greeter),
        "lock-screen" => Some(SessionClass::LockScreen),
        _ => None,
    }
}

fn type_to_str(t: SessionType) -> &'static str {
    match t {
        SessionType::Unspecified => "unspecified",
        SessionType::Tty => "tty",
        SessionType::X11 => "x11",
        SessionType::Wayland => "wayland",
        SessionType::Mir => "mir",
    }
}

fn type_from_str(s: &str) -> Option<SessionType> {
    match s {
        "unspecified" => Some(SessionType::Unspecified),
        "tty" => Some(SessionType::Tty),
        "x11" => Some(SessionType::X11),
        "wayland" => Some(SessionType::Wayland),
        "mir" => Some(SessionType::Mir),
        _ => None,
    }
}

fn state_to_str(s: SessionState) -> &'static str {
    match s {
        SessionState::Opening => "opening",
        SessionState::Active => "active",
        SessionState::Online => "online",
        SessionState::Closing => "closing",
        SessionState::Closed => "closed",
    }
}

fn state_from_str(s: &str) -> Option<SessionState> {
    match s {
        "opening" => Some(SessionState::Opening),
        "active" => Some(SessionState::Active),
        "online" => Some(SessionState::Online),
        "closing" => Some(SessionState::Closing),
        "closed" => Some(SessionState::Closed),
        _ => None,
    }
}

fn mode_to_str(m: Mode) -> &'static str {
    match m {
        Mode::Block => "block",
        Mode::Delay => "delay",
    }
}

fn mode_from_str(s: &str) -> Option<Mode> {
    match s {
        "block" => Some(Mode::Block),
        "delay" => Some(Mode::Delay),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Session;

    #[test]
    fn session_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new("c1");
        let mut session = Session::new_for_restore(id.clone(), 1000);
        session.seat = Some(SeatId::parse("seat1").unwrap());
        session.controller = Some(":1.5".to_string());
        session.vt = Some(3);
        session.class = SessionClass::User;
        session.kind = SessionType::Wayland;
        session.state = SessionState::Active;

        save_session(dir.path(), &session, 4242).unwrap();
        let restored = load_session(dir.path(), &id).unwrap();
        assert_eq!(restored.uid, 1000);
        assert_eq!(restored.seat, session.seat);
        assert_eq!(restored.controller, session.controller);
        assert_eq!(restored.vt, Some(3));
        assert_eq!(restored.kind, SessionType::Wayland);
        assert_eq!(restored.state, SessionState::Active);
    }

    #[test]
    fn malformed_session_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new("broken");
        fs::write(dir.path().join("session-broken"), "UID=not-a-number\n").unwrap();
        assert!(load_session(dir.path(), &id).is_none());
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new("c1");
        fs::write(
            dir.path().join("session-c1"),
            "UID=1000\nSOME_FUTURE_KEY=whatever\n",
        )
        .unwrap();
        let restored = load_session(dir.path(), &id).unwrap();
        assert_eq!(restored.uid, 1000);
    }

    #[test]
    fn inhibitor_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let inh = PersistedInhibitor {
            what: What::SHUTDOWN | What::SLEEP,
            mode: Mode::Block,
            who: "app".to_string(),
            why: "reason".to_string(),
            uid: 1000,
            pid: 99,
            since: 123,
            fifo_path: PathBuf::from("/run/seatwarden/inhibit/1.fifo"),
        };
        save_inhibitor(dir.path(), "1", &inh).unwrap();
        let restored = load_inhibitor(dir.path(), "1").unwrap();
        assert_eq!(restored.what, What::SHUTDOWN | What::SLEEP);
        assert_eq!(restored.mode, Mode::Block);
        assert_eq!(restored.uid, 1000);
        assert_eq!(restored.since, 123);
    }
}
