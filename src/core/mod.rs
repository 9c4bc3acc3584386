//! In-memory state manager: the four entity registries, the inhibitor arbitration engine, and
//! the hot-plug dispatcher (spec §1 "THE CORE").

pub mod bus_watch;
pub mod device;
pub mod error;
pub mod hotplug;
pub mod idle;
pub mod ids;
pub mod inhibitor;
pub mod manager;
pub mod seat;
pub mod session;
pub mod user;

pub use error::{CoreError, CoreResult};
pub use ids::{SeatId, SessionId};
pub use manager::Manager;
