//! Power operation string selection (spec §1 "Sleep/hibernate execution... out of scope", spec
//! §6's Suspend/Hibernate/HybridSleep State/Mode options).
//!
//! The core's job stops at picking the right `/sys/power/state` and `/sys/power/disk` strings
//! from config; actually writing them is a privileged operation the spec places outside this
//! crate. `PowerBackend` is the seam a real executor plugs into — a trait wrapping privileged I/O
//! so tests can substitute a fake, the same shape used elsewhere in this crate to keep registry
//! logic free of direct syscalls.

use crate::config::Config;

/// A system sleep target the core can ask a backend to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTarget {
    Suspend,
    Hibernate,
    HybridSleep,
}

/// The `/sys/power/state` (or `/sys/power/disk` for hibernate's mode) strings configured for a
/// given sleep target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepStrings {
    /// Value(s) to write to `/sys/power/state`, space-separated fallback list as logind itself
    /// accepts (e.g. `"mem standby freeze"` tries `mem` first).
    pub state: String,
    /// Value(s) to write to `/sys/power/disk`, empty if this target has none.
    pub mode: String,
}

/// Resolve the configured strings for a sleep target, per spec §6's configuration table.
pub fn sleep_strings(config: &Config, target: SleepTarget) -> SleepStrings {
    let states = &config.power_states;
    match target {
        SleepTarget::Suspend => SleepStrings {
            state: states.suspend_state.clone(),
            mode: states.suspend_mode.clone(),
        },
        SleepTarget::Hibernate => SleepStrings {
            state: states.hibernate_state.clone(),
            mode: states.hibernate_mode.clone(),
        },
        SleepTarget::HybridSleep => SleepStrings {
            state: states.hybrid_sleep_state.clone(),
            mode: states.hybrid_sleep_mode.clone(),
        },
    }
}

/// Seam around the actual privileged sleep/hibernate write, out of scope for this crate (spec
/// §1). A production build supplies a backend that writes `strings.mode` to `/sys/power/disk`
/// (if non-empty) and then `strings.state` to `/sys/power/state`; tests substitute a fake that
/// records the call instead.
pub trait PowerBackend {
    fn enter_sleep(&self, target: SleepTarget, strings: &SleepStrings) -> anyhow::Result<()>;
}

/// Backend with no real implementation: every call reports `Unsupported`, matching spec §7's
/// error kind for "hibernate not available" until a privileged helper is wired in.
#[derive(Debug, Default)]
pub struct UnimplementedBackend;

impl PowerBackend for UnimplementedBackend {
    fn enter_sleep(&self, target: SleepTarget, _strings: &SleepStrings) -> anyhow::Result<()> {
        anyhow::bail!("{target:?} execution is outside this crate's scope")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_strings_per_target() {
        let cfg = Config::default();
        let suspend = sleep_strings(&cfg, SleepTarget::Suspend);
        assert_eq!(suspend.state, cfg.power_states.suspend_state);
        let hibernate = sleep_strings(&cfg, SleepTarget::Hibernate);
        assert_eq!(hibernate.mode, cfg.power_states.hibernate_mode);
    }

    #[test]
    fn unimplemented_backend_reports_failure_not_a_panic() {
        let cfg = Config::default();
        let strings = sleep_strings(&cfg, SleepTarget::Suspend);
        let backend = UnimplementedBackend;
        assert!(backend.enter_sleep(SleepTarget::Suspend, &strings).is_err());
    }
}
