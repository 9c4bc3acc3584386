//! Bus surface types (spec §1: "the message-bus transport and method-dispatch glue" is out of
//! scope; only the shapes the orchestration layer must be able to produce are defined here).
//!
//! This module supplies the D-Bus object-path naming scheme and the `org.freedesktop.login1`-
//! shaped proxy trait the core is wired to satisfy. No `zbus::Connection` is ever opened from
//! here — wiring a live connection to these methods is the bus glue's job.

#![allow(dead_code)]

use zbus::zvariant::OwnedObjectPath;

/// Base object path this daemon publishes itself under.
pub const OBJECT_PREFIX: &str = "/org/seatwarden1";

/// Escape a key the way D-Bus object paths require: anything that isn't `[A-Za-z0-9_]` becomes
/// `_xx` (its hex byte), matching the convention `org.freedesktop.login1` itself uses for session
/// and user object paths.
fn escape_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

pub fn session_path(session_id: &str) -> OwnedObjectPath {
    let escaped = escape_path_segment(session_id);
    OwnedObjectPath::try_from(format!("{OBJECT_PREFIX}/session/_{escaped}"))
        .expect("escaped segment is always a valid object path component")
}

pub fn seat_path(seat_id: &str) -> OwnedObjectPath {
    let escaped = escape_path_segment(seat_id);
    OwnedObjectPath::try_from(format!("{OBJECT_PREFIX}/seat/_{escaped}"))
        .expect("escaped segment is always a valid object path component")
}

pub fn user_path(uid: u32) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("{OBJECT_PREFIX}/user/_{uid}"))
        .expect("uid is always a valid object path component")
}

/// Manager-interface proxy, shaped after `org.freedesktop.login1.Manager` (spec §6 bus surface).
/// Implemented by the bus glue against `Manager`; kept here only as the contract the
/// orchestration surface must satisfy.
#[zbus::proxy(interface = "org.seatwarden1.Manager", assume_defaults = true)]
trait ManagerProxy {
    fn create_session(
        &self,
        uid: u32,
        pid: u32,
        service: &str,
        seat_id: &str,
    ) -> zbus::Result<(String, OwnedObjectPath)>;

    fn release_session(&self, session_id: &str) -> zbus::Result<()>;

    fn activate_session(&self, session_id: &str) -> zbus::Result<()>;
    fn lock_session(&self, session_id: &str) -> zbus::Result<()>;
    fn unlock_session(&self, session_id: &str) -> zbus::Result<()>;

    fn inhibit(
        &self,
        what: &str,
        who: &str,
        why: &str,
        mode: &str,
    ) -> zbus::Result<zbus::zvariant::OwnedFd>;

    fn is_inhibited(&self, what: &str, mode: &str) -> zbus::Result<(bool, u64)>;

    fn attach_device(&self, seat_id: &str, sysfs_path: &str, override_existing: bool) -> zbus::Result<()>;

    fn flush_devices(&self) -> zbus::Result<()>;

    fn set_user_linger(&self, uid: u32, enable: bool, interactive: bool) -> zbus::Result<()>;

    #[zbus(signal)]
    fn session_new(&self, session_id: &str, object_path: OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn session_removed(&self, session_id: &str, object_path: OwnedObjectPath) -> zbus::Result<()>;
}
