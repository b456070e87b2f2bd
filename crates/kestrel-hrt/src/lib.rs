//! High-resolution timing substrate for the kestrel driver framework.
//!
//! Everything time-related in the framework runs in one domain: microseconds
//! measured from a process-wide monotonic epoch ([`now_us`]). Periodic driver
//! callbacks are modelled as work items held by a [`WorkMgr`] registry and
//! dispatched by a single high-priority thread ([`HrtWorkQueue`]), so tens of
//! drivers multiplex onto one OS thread instead of one thread each.
//!
//! [`SyncObj`] is the wait/signal primitive shared with the device layer; its
//! generation protocol lets a waiter scan state and then sleep without ever
//! losing a signal delivered in between.

mod clock;
mod error;
mod queue;
mod registry;
mod rt;
mod sync;
mod work_item;

pub use clock::{now_us, Deadline};
pub use error::{HrtError, HrtResult};
pub use queue::HrtWorkQueue;
pub use registry::WorkMgr;
pub use sync::SyncObj;
pub use work_item::{PacingStats, WorkCallback, WorkHandle};
