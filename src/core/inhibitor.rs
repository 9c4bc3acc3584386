//! Inhibitor arbitration engine (spec §3 Inhibitor, §4.4).

use std::collections::HashMap;

use bitflags::bitflags;
use log::info;

bitflags! {
    /// One bit per inhibit category (spec §9: represent as an integer flags type, not a set of
    /// strings, on the hot path).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct What: u32 {
        const SHUTDOWN             = 0b0000_0001;
        const SLEEP                = 0b0000_0010;
        const IDLE                 = 0b0000_0100;
        const HANDLE_POWER_KEY     = 0b0000_1000;
        const HANDLE_SUSPEND_KEY   = 0b0001_0000;
        const HANDLE_HIBERNATE_KEY = 0b0010_0000;
        const HANDLE_LID_SWITCH    = 0b0100_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Block,
    Delay,
}

#[derive(Debug, Clone)]
pub struct Inhibitor {
    pub id: String,
    pub what: What,
    pub mode: Mode,
    pub who: String,
    pub why: String,
    pub uid: u32,
    pub pid: i32,
    /// Monotonic timestamp at which the inhibitor was created; always > 0 (spec §8 invariant).
    pub since: u64,
}

/// Function supplied by the caller to resolve "is this pid's session active/online" for the
/// `ignore_inactive` filter (spec §4.4) — kept generic so the engine has no dependency on the
/// session registry or the cgroup classifier.
pub type SessionActivePredicate<'a> = dyn Fn(i32) -> bool + 'a;

#[derive(Debug, Default)]
pub struct InhibitorEngine {
    inhibitors: HashMap<String, Inhibitor>,
    next_id: u64,
}

impl InhibitorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new inhibitor and return its freshly minted id. `since` must be provided by the
    /// caller (a monotonic clock read) so the engine stays free of wall-clock/test-time coupling.
    pub fn create(
        &mut self,
        what: What,
        mode: Mode,
        who: impl Into<String>,
        why: impl Into<String>,
        uid: u32,
        pid: i32,
        since: u64,
    ) -> String {
        self.next_id += 1;
        let id = format!("{}", self.next_id);
        let who = who.into();
        info!("inhibitor {id} created by {who} (uid={uid}, what={what:?}, mode={mode:?})");
        self.inhibitors.insert(
            id.clone(),
            Inhibitor {
                id: id.clone(),
                what,
                mode,
                who,
                why: why.into(),
                uid,
                pid,
                since,
            },
        );
        id
    }

    /// Re-insert an inhibitor recovered from persisted state (spec §4.11), preserving its
    /// original id rather than minting a new one. Bumps `next_id` past any numeric id so a
    /// subsequent `create` never collides with a restored one.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        &mut self,
        id: String,
        what: What,
        mode: Mode,
        who: String,
        why: String,
        uid: u32,
        pid: i32,
        since: u64,
    ) {
        if let Ok(n) = id.parse::<u64>() {
            self.next_id = self.next_id.max(n);
        }
        info!("inhibitor {id} restored (uid={uid}, what={what:?}, mode={mode:?})");
        self.inhibitors.insert(
            id.clone(),
            Inhibitor {
                id,
                what,
                mode,
                who,
                why,
                uid,
                pid,
                since,
            },
        );
    }

    /// Releasing an inhibitor that doesn't exist (or was already released) is a no-op (spec §8).
    pub fn free(&mut self, id: &str) {
        if self.inhibitors.remove(id).is_some() {
            info!("inhibitor {id} freed");
        }
    }

    pub fn get(&self, id: &str) -> Option<&Inhibitor> {
        self.inhibitors.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inhibitor> {
        self.inhibitors.values()
    }

    pub fn len(&self) -> usize {
        self.inhibitors.len()
    }

    /// Central query (spec §4.4): returns `(true, earliest since)` if any inhibitor matches,
    /// else `(false, 0)`.
    pub fn is_inhibited(
        &self,
        what: What,
        mode: Mode,
        for_uid: Option<u32>,
        ignore_inactive: bool,
        session_active: &SessionActivePredicate<'_>,
    ) -> (bool, u64) {
        let mut earliest: Option<u64> = None;
        for inh in self.inhibitors.values() {
            if !inh.what.intersects(what) {
                continue;
            }
            if inh.mode != mode {
                continue;
            }
            if let Some(uid) = for_uid {
                if inh.uid != uid {
                    continue;
                }
            }
            if ignore_inactive && !session_active(inh.pid) {
                continue;
            }
            earliest = Some(match earliest {
                Some(e) => e.min(inh.since),
                None => inh.since,
            });
        }
        match earliest {
            Some(since) => (true, since),
            None => (false, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_active(_pid: i32) -> bool {
        true
    }

    #[test]
    fn matches_on_overlapping_what_and_exact_mode() {
        let mut eng = InhibitorEngine::new();
        eng.create(
            What::SHUTDOWN | What::SLEEP,
            Mode::Block,
            "app",
            "reason",
            1000,
            42,
            10,
        );
        let (inhibited, since) =
            eng.is_inhibited(What::SHUTDOWN, Mode::Block, None, false, &always_active);
        assert!(inhibited);
        assert_eq!(since, 10);

        let (inhibited, _) = eng.is_inhibited(What::IDLE, Mode::Block, None, false, &always_active);
        assert!(!inhibited);

        let (inhibited, _) =
            eng.is_inhibited(What::SHUTDOWN, Mode::Delay, None, false, &always_active);
        assert!(!inhibited);
    }

    #[test]
    fn free_makes_future_queries_negative() {
        let mut eng = InhibitorEngine::new();
        let id = eng.create(What::SHUTDOWN, Mode::Block, "app", "reason", 1000, 42, 10);
        eng.free(&id);
        let (inhibited, since) =
            eng.is_inhibited(What::SHUTDOWN, Mode::Block, None, false, &always_active);
        assert!(!inhibited);
        assert_eq!(since, 0);
        // freeing an already-freed (or unknown) id is a no-op
        eng.free(&id);
        eng.free("never-existed");
    }

    #[test]
    fn for_uid_filters() {
        let mut eng = InhibitorEngine::new();
        eng.create(What::SHUTDOWN, Mode::Block, "app", "reason", 1000, 42, 10);
        let (inhibited, _) =
            eng.is_inhibited(What::SHUTDOWN, Mode::Block, Some(2000), false, &always_active);
        assert!(!inhibited);
        let (inhibited, _) =
            eng.is_inhibited(What::SHUTDOWN, Mode::Block, Some(1000), false, &always_active);
        assert!(inhibited);
    }

    #[test]
    fn ignore_inactive_filters_by_session_predicate() {
        let mut eng = InhibitorEngine::new();
        eng.create(What::IDLE, Mode::Block, "app", "reason", 1000, 7, 5);
        let (inhibited, _) = eng.is_inhibited(What::IDLE, Mode::Block, None, true, &|pid| pid != 7);
        assert!(!inhibited);
        let (inhibited, _) = eng.is_inhibited(What::IDLE, Mode::Block, None, true, &|pid| pid == 7);
        assert!(inhibited);
    }

    #[test]
    fn restore_preserves_id_and_protects_future_create_ids() {
        let mut eng = InhibitorEngine::new();
        eng.restore(
            "5".to_string(),
            What::SLEEP,
            Mode::Delay,
            "app".to_string(),
            "reason".to_string(),
            1000,
            42,
            99,
        );
        assert_eq!(eng.get("5").unwrap().since, 99);
        let new_id = eng.create(What::IDLE, Mode::Block, "b", "r", 1000, 1, 1);
        assert_ne!(new_id, "5");
        assert!(eng.get(&new_id).is_some());
    }

    #[test]
    fn earliest_since_wins_among_matches() {
        let mut eng = InhibitorEngine::new();
        eng.create(What::SHUTDOWN, Mode::Block, "a", "r", 1000, 1, 20);
        eng.create(What::SHUTDOWN, Mode::Block, "b", "r", 1000, 2, 5);
        let (inhibited, since) =
            eng.is_inhibited(What::SHUTDOWN, Mode::Block, None, false, &always_active);
        assert!(inhibited);
        assert_eq!(since, 5);
    }
}
