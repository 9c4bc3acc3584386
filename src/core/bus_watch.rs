//! Bus-name watch set (spec §4.7).

use std::collections::HashSet;

use log::debug;

use super::session::SessionRegistry;

#[derive(Debug, Default)]
pub struct BusNameWatchSet {
    watched: HashSet<String>,
}

impl BusNameWatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: inserting an already-watched name changes nothing.
    pub fn watch(&mut self, name: &str) {
        if self.watched.insert(name.to_string()) {
            debug!("watching bus name {name}");
        }
    }

    pub fn is_watched(&self, name: &str) -> bool {
        self.watched.contains(name)
    }

    /// Drop the watch on `name` unless some live session still claims it as its controller
    /// (spec §4.7): a peer may control several sessions, so releasing early would leak state.
    pub fn drop(&mut self, name: &str, sessions: &SessionRegistry) -> bool {
        if sessions.find_by_controller(name).is_some() {
            debug!("keeping watch on {name}: still claimed by a session");
            return false;
        }
        let removed = self.watched.remove(name);
        if removed {
            debug!("dropped watch on {name}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::SessionId;

    #[test]
    fn drop_retained_while_a_session_still_controls_the_peer() {
        let mut watch = BusNameWatchSet::new();
        let mut sessions = SessionRegistry::new();
        let id = SessionId::new("c1");
        let sess = sessions.upsert(&id, 1000).unwrap();
        sess.controller = Some(":1.42".to_string());

        watch.watch(":1.42");
        assert!(!watch.drop(":1.42", &sessions));
        assert!(watch.is_watched(":1.42"));

        sessions.free(&id);
        assert!(watch.drop(":1.42", &sessions));
        assert!(!watch.is_watched(":1.42"));
    }

    #[test]
    fn watch_is_idempotent() {
        let mut watch = BusNameWatchSet::new();
        watch.watch(":1.1");
        watch.watch(":1.1");
        assert_eq!(watch.len(), 1);
    }
}
