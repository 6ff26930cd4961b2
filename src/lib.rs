//! Typed wrappers that bind object lifetime to kernel-owned resources
//!
//! The kernel underneath is a preemptive, priority-based RTOS reached through
//! a fixed set of port calls (see the `port` module sources). Each wrapper
//! type owns exactly one kernel handle: constructing the wrapper issues the
//! kernel's create call, dropping it issues the delete call. A refused create
//! is treated as unrecoverable and panics; everything after construction
//! reports success or failure as a plain value, with a timed-out wait being
//! an ordinary failure rather than an error.
//!
//! Two execution contexts are kept apart in the API itself: the blocking
//! operations may only run in task context, while the `*_from_isr` operations
//! require an [`InterruptContext`] token and never accept a wait argument.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

#[cfg(feature = "sim")]
extern crate std;

/// Debug-level log line, compiled out unless the `defmt` feature is on
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
    }};
}

/// Trace-level log line, compiled out unless the `defmt` feature is on
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);
    }};
}

mod isr;
mod mutex;
mod port;
mod queue;
pub mod scheduler;
mod semaphore;
mod task;
mod timer;

pub use isr::InterruptContext;
pub use mutex::{Mutex, MutexOwnership, RecursiveMutex};
pub use port::{RawTaskHandle, RawTimerHandle};
pub use queue::Queue;
pub use semaphore::Semaphore;
pub use task::{Priority, Task, TaskEntry, TaskInfo, TaskState, delay, delay_until, yield_now};
pub use timer::{Timer, TimerCallback};

/// Time expressed in kernel ticks
///
/// The duration of one tick is a build-time property of the kernel; see
/// [`scheduler::TICK_RATE_HZ`].
pub type Ticks = u32;

/// The longest expressible wait
///
/// Passing this as a timeout asks the kernel to block until the awaited
/// event occurs, with no deadline.
pub const MAX_DELAY: Ticks = Ticks::MAX;

/// Longest display name stored wrapper-side, in bytes
pub const MAX_NAME_LEN: usize = 16;

/// Bounded display name for tasks, queues and timers
pub(crate) type Name = heapless::String<MAX_NAME_LEN>;

/// Copy a name into bounded storage, truncating past [`MAX_NAME_LEN`]
pub(crate) fn clamp_name(name: &str) -> Name {
    let mut out = Name::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(feature = "defmt")]
defmt::timestamp!("{=u32:010}", crate::port::tick_count());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_name_keeps_short_names() {
        let n = clamp_name("sensor");
        assert_eq!(n.as_str(), "sensor");
    }

    #[test]
    fn clamp_name_truncates_long_names() {
        let n = clamp_name("a-very-long-resource-name");
        assert_eq!(n.len(), MAX_NAME_LEN);
        assert_eq!(n.as_str(), "a-very-long-reso");
    }
}

// End of File
