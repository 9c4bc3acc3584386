//! Hot-plug dispatcher: routes classified device events onto the device/seat registries
//! (spec §4.2).

use log::warn;

use super::device::DeviceRegistry;
use super::error::CoreResult;
use super::ids::SeatId;
use super::seat::SeatRegistry;

/// udev action, pre-classified by the caller (the dispatcher never inspects `ACTION` strings
/// beyond this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Change,
    Remove,
}

/// A single hot-plug event, already classified as a seat device (the dispatcher receives
/// pre-classified events per spec §4.2).
#[derive(Debug, Clone)]
pub struct SeatDeviceEvent<'a> {
    pub action: Action,
    pub syspath: &'a str,
    /// Raw `ID_SEAT` udev property value, if present.
    pub id_seat: Option<&'a str>,
    pub master_of_seat: bool,
}

/// Result of handling one event: which seat (if any) must be (re)started or GC'd.
#[derive(Debug, Default)]
pub struct HotplugOutcome {
    pub seat_started: Option<SeatId>,
    pub seat_gc_enqueued: Option<SeatId>,
    pub dropped: bool,
}

/// Apply one seat-device hot-plug event to the registries, per the rules in spec §4.2.
pub fn handle_seat_device(
    event: &SeatDeviceEvent<'_>,
    devices: &mut DeviceRegistry,
    seats: &mut SeatRegistry,
) -> CoreResult<HotplugOutcome> {
    if event.action == Action::Remove {
        return Ok(handle_remove(event.syspath, devices, seats));
    }

    let seat_id = match SeatId::from_property(event.id_seat) {
        Ok(id) => id,
        Err(e) => {
            warn!("dropping hot-plug event for {}: {e}", event.syspath);
            return Ok(HotplugOutcome {
                dropped: true,
                ..Default::default()
            });
        }
    };

    let master = event.master_of_seat;
    let seat_known = seats.contains(&seat_id);

    // Refuse to materialize a seat from a non-master device (spec §4.2).
    if !seat_known && !master {
        return Ok(HotplugOutcome {
            dropped: true,
            ..Default::default()
        });
    }

    let device_existed = devices.contains(event.syspath);
    devices.upsert(event.syspath, master)?;

    let seat_creation = seats.upsert(&seat_id);
    if let Err(e) = seat_creation {
        // Rollback: a freshly created device with no prior seat is removed on failure.
        if !device_existed {
            devices.free(event.syspath);
        }
        return Err(e);
    }
    let seat = seat_creation.expect("checked above");
    seat.attach_device(event.syspath);
    seat.gc_pending = false;

    if let Some(device) = devices.get_mut(event.syspath) {
        device.seat = Some(seat_id.clone());
        device.gc_pending = false;
    }

    seats.start(&seat_id)?;

    Ok(HotplugOutcome {
        seat_started: Some(seat_id),
        ..Default::default()
    })
}

fn handle_remove(
    syspath: &str,
    devices: &mut DeviceRegistry,
    seats: &mut SeatRegistry,
) -> HotplugOutcome {
    let Some(device) = devices.free(syspath) else {
        return HotplugOutcome {
            dropped: true,
            ..Default::default()
        };
    };

    let mut outcome = HotplugOutcome::default();
    if let Some(seat_id) = device.seat {
        if let Some(seat) = seats.get_mut(&seat_id) {
            seat.detach_device(syspath);
            if seat.is_empty() {
                seat.gc_pending = true;
                outcome.seat_gc_enqueued = Some(seat_id);
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_device_creates_seat_and_starts_it() {
        let mut devices = DeviceRegistry::new();
        let mut seats = SeatRegistry::new();
        let event = SeatDeviceEvent {
            action: Action::Add,
            syspath: "/sys/class/drm/card0",
            id_seat: Some("seat1"),
            master_of_seat: true,
        };
        let outcome = handle_seat_device(&event, &mut devices, &mut seats).unwrap();
        assert_eq!(outcome.seat_started, Some(SeatId::parse("seat1").unwrap()));
        let seat = seats.get(&SeatId::parse("seat1").unwrap()).unwrap();
        assert_eq!(seat.devices.len(), 1);
        assert!(seat.started);
        assert!(devices.get(event.syspath).unwrap().master);
    }

    #[test]
    fn non_master_device_on_unknown_seat_is_dropped() {
        let mut devices = DeviceRegistry::new();
        let mut seats = SeatRegistry::new();
        let event = SeatDeviceEvent {
            action: Action::Add,
            syspath: "/sys/class/drm/card1",
            id_seat: Some("seatZ"),
            master_of_seat: false,
        };
        let outcome = handle_seat_device(&event, &mut devices, &mut seats).unwrap();
        assert!(outcome.dropped);
        assert!(!seats.contains(&SeatId::parse("seatZ").unwrap()));
        assert!(devices.get(event.syspath).is_none());
    }

    #[test]
    fn invalid_seat_name_is_rejected_without_mutation() {
        let mut devices = DeviceRegistry::new();
        let mut seats = SeatRegistry::new();
        let event = SeatDeviceEvent {
            action: Action::Add,
            syspath: "/sys/class/drm/card2",
            id_seat: Some("../etc"),
            master_of_seat: true,
        };
        let outcome = handle_seat_device(&event, &mut devices, &mut seats).unwrap();
        assert!(outcome.dropped);
        assert_eq!(seats.len(), 0);
        assert_eq!(devices.len(), 0);
    }

    #[test]
    fn remove_detaches_and_enqueues_empty_seat_for_gc() {
        let mut devices = DeviceRegistry::new();
        let mut seats = SeatRegistry::new();
        let add = SeatDeviceEvent {
            action: Action::Add,
            syspath: "/sys/class/drm/card0",
            id_seat: Some("seat1"),
            master_of_seat: true,
        };
        handle_seat_device(&add, &mut devices, &mut seats).unwrap();

        let remove = SeatDeviceEvent {
            action: Action::Remove,
            ..add
        };
        let outcome = handle_seat_device(&remove, &mut devices, &mut seats).unwrap();
        assert_eq!(outcome.seat_gc_enqueued, Some(SeatId::parse("seat1").unwrap()));
        assert!(devices.get(remove.syspath).is_none());
        let seat = seats.get(&SeatId::parse("seat1").unwrap()).unwrap();
        assert!(seat.is_empty());
        assert!(seat.gc_pending);
    }

    #[test]
    fn remove_of_unknown_device_is_a_noop() {
        let mut devices = DeviceRegistry::new();
        let mut seats = SeatRegistry::new();
        let event = SeatDeviceEvent {
            action: Action::Remove,
            syspath: "/sys/class/drm/ghost",
            id_seat: None,
            master_of_seat: false,
        };
        let outcome = handle_seat_device(&event, &mut devices, &mut seats).unwrap();
        assert!(outcome.dropped);
    }
}
