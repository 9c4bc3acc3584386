//! Daemon-wide idle-hint aggregator (spec §4.5).

/// Per-session idle report fed into the fold.
#[derive(Debug, Clone, Copy)]
pub struct SessionIdle {
    pub idle: bool,
    pub since: u64,
}

/// Fold the inhibit-idle state and every session's idle report into a single daemon-wide
/// `(idle, since)` pair, per the four-case rule in spec §4.5.
pub fn aggregate(idle_inhibited: bool, sessions: impl IntoIterator<Item = SessionIdle>) -> (bool, u64) {
    let mut idle = !idle_inhibited;
    let mut ts: Option<u64> = None;

    for session in sessions {
        if idle && session.idle {
            // Became fully idle only once the most recently idle session went idle.
            ts = Some(ts.map_or(session.since, |t| t.max(session.since)));
        } else if idle && !session.idle {
            idle = false;
            ts = Some(session.since);
        } else if !idle && !session.idle {
            // Busy since the earliest still-active session.
            ts = Some(ts.map_or(session.since, |t| t.min(session.since)));
        }
        // !idle && session.idle: stays busy, ignore this session's report.
    }

    (idle, ts.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_idle_picks_latest_timestamp() {
        let sessions = [
            SessionIdle { idle: true, since: 10 },
            SessionIdle { idle: true, since: 20 },
        ];
        assert_eq!(aggregate(false, sessions), (true, 20));
    }

    #[test]
    fn one_busy_session_flips_to_busy() {
        let sessions = [
            SessionIdle { idle: true, since: 10 },
            SessionIdle { idle: true, since: 20 },
            SessionIdle { idle: false, since: 15 },
        ];
        assert_eq!(aggregate(false, sessions), (false, 15));
    }

    #[test]
    fn busy_picks_earliest_among_busy_sessions() {
        let sessions = [
            SessionIdle { idle: false, since: 30 },
            SessionIdle { idle: false, since: 12 },
            SessionIdle { idle: true, since: 99 },
        ];
        assert_eq!(aggregate(false, sessions), (false, 12));
    }

    #[test]
    fn idle_inhibited_forces_busy_from_the_start() {
        let sessions = [SessionIdle { idle: true, since: 5 }];
        let (idle, _) = aggregate(true, sessions);
        assert!(!idle);
    }

    #[test]
    fn no_sessions_with_no_inhibitor_is_idle_since_zero() {
        assert_eq!(aggregate(false, []), (true, 0));
    }
}
