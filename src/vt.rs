//! Virtual terminal busy probe (spec §4.10).
//!
//! `vt_is_busy(n)` is used when allocating a VT for a new graphical session: it opens a VT
//! device, asks the kernel which VTs are currently allocated, and tests bit `n` of that mask.
//! VT 0 is never opened directly — it aliases whichever VT is currently in the foreground, so
//! probing it would answer "is the foreground VT busy" instead of "is VT n busy".

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use nix::ioctl_read_bad;

/// First VT device probed; never VT 0.
const VT_PROBE_DEVICE: &str = "/dev/tty1";

/// Mirrors `struct vt_stat` from `linux/vt.h`: `v_active` is the currently-foreground VT number,
/// `v_state` is a bitmask of allocated VTs (bit `n` set means VT `n` is in use).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct VtStat {
    v_active: libc::c_ushort,
    v_signal: libc::c_ushort,
    v_state: libc::c_ushort,
}

// `VT_GETSTATE` (0x5603, `linux/vt.h`) doesn't follow the `_IOR`/`_IOW` encoding nix's typed
// `ioctl_read!` expects, so it's declared with the `_bad` family, same as the legacy vt ioctls in
// `Smithay-smithay/src/backend/session/direct.rs`.
ioctl_read_bad!(vt_get_state, 0x5603, VtStat);

/// Bit `n` of an in-use mask, per `VT_GETSTATE`'s `v_state` encoding.
fn bit_is_set(mask: u16, n: u32) -> bool {
    n < 16 && (mask & (1 << n)) != 0
}

/// True if VT `n` (`n >= 1`) is currently allocated.
///
/// Opens [`VT_PROBE_DEVICE`] non-controlling (`O_NOCTTY`), read-write, and close-on-exec, issues
/// `VT_GETSTATE`, and tests bit `n` of the returned mask. I/O and kernel errors both surface as
/// `io::Error` rather than `false` — callers get to distinguish "busy" from "couldn't ask".
pub fn vt_is_busy(n: u32) -> std::io::Result<bool> {
    if n == 0 {
        return Ok(true); // VT 0 is never a real allocation target; treat as always busy.
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_CLOEXEC)
        .open(VT_PROBE_DEVICE)?;

    let mut stat = VtStat::default();
    unsafe { vt_get_state(file.as_raw_fd(), &mut stat) }
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;

    Ok(bit_is_set(stat.v_state as u16, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_math_matches_the_scenario_mask() {
        // v_state = 0b0000_1010: VT 1 and VT 3 allocated, VT 2 not.
        let mask: u16 = 0b0000_1010;
        assert!(bit_is_set(mask, 1));
        assert!(bit_is_set(mask, 3));
        assert!(!bit_is_set(mask, 2));
    }

    #[test]
    fn vt_zero_is_always_reported_busy() {
        assert!(vt_is_busy(0).unwrap());
    }

    #[test]
    fn out_of_range_bit_is_never_set() {
        assert!(!bit_is_set(0xffff, 16));
        assert!(!bit_is_set(0xffff, 31));
    }
}
