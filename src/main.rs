//! seatwarden - session, seat and user tracking daemon for Linux hosts
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Manager                         │
//! │   devices / seats / sessions / users / inhibitors     │
//! ├───────────────┬───────────────┬───────────────┬───────┤
//! │  udev_adapter │     button    │  cgroup (proc) │  vt   │
//! │  (hot-plug)   │ (lid/power)   │   resolver     │ probe │
//! ├───────────────┴───────────────┴───────────────┴───────┤
//! │      persistence (restore/save)   │   config (TOML)    │
//! ├────────────────────────────────────┴────────────────────┤
//! │            bus (org.seatwarden1 object paths)          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! This binary wires the pieces above together and restores persisted state; the message-bus
//! transport and the full event loop that dispatches hot-plug/button/bus events are out of scope
//! (spec §1) — `bus::ManagerProxy` and the per-module `poll`/`dispatch` methods are the seam a
//! transport layer plugs into.

mod bus;
mod button;
mod cgroup;
mod config;
mod core;
mod daemon;
mod persistence;
mod power;
mod vt;

// Hot-plug and docking/display detection both read sysfs through the `udev` crate, which (like
// `notify` in `config`) is only pulled in on Linux (see Cargo.toml's target-gated dependencies).
#[cfg(target_os = "linux")]
mod drm_display;
#[cfg(target_os = "linux")]
mod udev_adapter;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::cgroup::CgroupProcessResolver;
use crate::config::Config;
use crate::core::ids::SessionId;
use crate::core::manager::Manager;
use crate::core::user::User;

fn main() -> Result<()> {
    env_logger::init();
    info!("seatwardend starting");

    let config = Config::load();
    info!(
        "kill-on-logout={} idle-action={:?} after {}s",
        config.kill.kill_user_processes, config.idle.idle_action, config.idle.idle_action_sec
    );

    let mut manager = Manager::with_resolver(Box::new(CgroupProcessResolver::new()));

    let runtime_dir = persistence::default_runtime_dir();
    restore_state(&mut manager, &runtime_dir);

    #[cfg(target_os = "linux")]
    {
        match udev_adapter::enumerate_existing(&mut manager) {
            Ok(count) => info!("enumerated {count} existing seat device(s)"),
            Err(e) => warn!("cold-boot device enumeration failed: {e:#}"),
        }
    }

    #[cfg(target_os = "linux")]
    let _device_monitor = match udev_adapter::DeviceMonitor::new() {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            warn!("udev hot-plug monitor unavailable: {e:#}");
            None
        }
    };

    let _button_source = match button::ButtonSource::new() {
        Ok(source) => Some(source),
        Err(e) => {
            warn!("button/lid event source unavailable: {e:#}");
            None
        }
    };

    let shutdown = daemon::install_signal_handlers().context("installing signal handlers")?;
    daemon::notify_ready().context("notifying service manager")?;

    info!(
        "ready: {} seat(s), {} session(s), {} user(s)",
        manager.seats.len(),
        manager.sessions.len(),
        manager.users.len()
    );

    // The full event loop (udev monitor, button source, bus method dispatch, idle polling) is
    // the transport layer's job (spec §1); this entrypoint's responsibility ends at bringing the
    // in-memory state to a consistent, restored, ready-notified state and holding it there until
    // asked to stop.
    while !shutdown.get() {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    info!("shutdown requested, exiting");
    Ok(())
}

/// Restore sessions, users and inhibitors left over from a previous run (spec §4.11). Restoration
/// is best-effort: `persistence` already logs and skips any record it can't parse rather than
/// erroring, so nothing here aborts startup.
fn restore_state(manager: &mut Manager, runtime_dir: &std::path::Path) {
    let Ok(entries) = std::fs::read_dir(runtime_dir) else {
        info!("no runtime directory at {}, starting clean", runtime_dir.display());
        return;
    };

    let mut session_ids = Vec::new();
    let mut user_uids = Vec::new();
    let mut inhibitor_ids = Vec::new();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(id) = name.strip_prefix("session-") {
            session_ids.push(SessionId::new(id));
        } else if let Some(uid) = name.strip_prefix("user-") {
            if let Ok(uid) = uid.parse::<u32>() {
                user_uids.push(uid);
            }
        } else if let Some(id) = name.strip_prefix("inhibitor-") {
            inhibitor_ids.push(id.to_string());
        }
    }

    for uid in user_uids {
        if let Some(user) = persistence::load_user(runtime_dir, uid) {
            restore_user(manager, user);
        }
    }
    for id in &session_ids {
        if let Some(session) = persistence::load_session(runtime_dir, id) {
            restore_session(manager, session);
        }
    }
    for id in &inhibitor_ids {
        if let Some(inh) = persistence::load_inhibitor(runtime_dir, id) {
            manager.inhibitors.restore(
                id.clone(),
                inh.what,
                inh.mode,
                inh.who,
                inh.why,
                inh.uid,
                inh.pid,
                inh.since,
            );
        }
    }

    manager.sweep_gc();
    info!(
        "restored {} session(s), {} user(s), {} inhibitor(s)",
        session_ids.len(),
        user_uids.len(),
        inhibitor_ids.len()
    );
}

fn restore_user(manager: &mut Manager, user: User) {
    if manager.users.contains(user.uid) {
        return;
    }
    if let Err(e) = manager.users.upsert(user.uid, user.gid, &user.name) {
        warn!("failed to restore user {}: {e}", user.uid);
        return;
    }
    if let Some(restored) = manager.users.get_mut(user.uid) {
        restored.linger = user.linger;
        for session in &user.sessions {
            restored.sessions.insert(session.clone());
        }
    }
}

fn restore_session(manager: &mut Manager, session: crate::core::session::Session) {
    if manager.sessions.contains(&session.id) {
        return;
    }
    let id = session.id.clone();
    let seat = session.seat.clone();
    if let Err(e) = manager.sessions.insert_restored(session) {
        warn!("failed to restore session {id}: {e}");
        return;
    }
    if let Some(seat_id) = seat {
        match manager.seats.upsert(&seat_id) {
            Ok(seat) => {
                seat.attach_session(id);
                seat.gc_pending = false;
            }
            Err(e) => warn!("failed to re-attach restored session {id} to seat {seat_id}: {e}"),
        }
    }
}
