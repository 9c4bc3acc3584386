//! Device entity and registry (spec §3 Device, §4.1).

use std::collections::HashMap;

use log::{debug, trace};

use super::error::{CoreError, CoreResult};
use super::ids::SeatId;

/// A hot-plugged piece of seat hardware, keyed by its sysfs path.
#[derive(Debug, Clone)]
pub struct Device {
    pub syspath: String,
    /// Monotonic: raised by any upsert that sets it true, never cleared (spec §9 open question).
    pub master: bool,
    pub seat: Option<SeatId>,
    pub gc_pending: bool,
}

impl Device {
    fn new(syspath: String, master: bool) -> Self {
        Device {
            syspath,
            master,
            seat: None,
            gc_pending: false,
        }
    }

    /// OR-fold a freshly observed `master` flag into this device (spec §4.1).
    pub fn raise_master(&mut self, master: bool) {
        if master {
            self.master = true;
        }
    }
}

/// Keyed table of live devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert: returns the existing device if already present (after folding in
    /// `master`), otherwise allocates a new one. Never errors on duplicate.
    pub fn upsert(&mut self, syspath: &str, master: bool) -> CoreResult<&mut Device> {
        if let Some(existing) = self.devices.get_mut(syspath) {
            existing.raise_master(master);
            trace!("device {syspath} upserted (existing, master={master})");
            return Ok(self.devices.get_mut(syspath).expect("just checked"));
        }
        debug!("device {syspath} created (master={master})");
        self.devices
            .insert(syspath.to_string(), Device::new(syspath.to_string(), master));
        Ok(self.devices.get_mut(syspath).expect("just inserted"))
    }

    pub fn get(&self, syspath: &str) -> Option<&Device> {
        self.devices.get(syspath)
    }

    pub fn get_mut(&mut self, syspath: &str) -> Option<&mut Device> {
        self.devices.get_mut(syspath)
    }

    pub fn contains(&self, syspath: &str) -> bool {
        self.devices.contains_key(syspath)
    }

    /// Remove a device unconditionally. Returns it so the caller can detach it from its seat.
    pub fn free(&mut self, syspath: &str) -> Option<Device> {
        let removed = self.devices.remove(syspath);
        if removed.is_some() {
            debug!("device {syspath} freed");
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn require(&self, syspath: &str) -> CoreResult<&Device> {
        self.get(syspath)
            .ok_or_else(|| CoreError::NotFound(format!("device {syspath}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_idempotent() {
        let mut reg = DeviceRegistry::new();
        reg.upsert("/sys/a", false).unwrap();
        reg.upsert("/sys/a", false).unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn master_is_or_folded_never_cleared() {
        let mut reg = DeviceRegistry::new();
        reg.upsert("/sys/a", true).unwrap();
        reg.upsert("/sys/a", false).unwrap();
        assert!(reg.get("/sys/a").unwrap().master);
    }

    #[test]
    fn free_removes_the_record() {
        let mut reg = DeviceRegistry::new();
        reg.upsert("/sys/a", false).unwrap();
        assert!(reg.free("/sys/a").is_some());
        assert!(reg.get("/sys/a").is_none());
        assert!(reg.free("/sys/a").is_none());
    }
}
