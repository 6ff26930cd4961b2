//! Mutual exclusion with priority inheritance
//!
//! [`Mutex`] is a binary take/give primitive the kernel creates with
//! priority inheritance enabled: while a higher-priority task waits on the
//! holder, the holder runs at the waiter's priority, so a middle-priority
//! task cannot starve them both. [`RecursiveMutex`] additionally lets the
//! holding task re-take without deadlocking itself, tracked by a kernel-side
//! depth counter.
//!
//! Neither type has interrupt-context operations: priority inheritance is
//! meaningless in an interrupt handler, and the kernel forbids mutex use
//! there outright.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::port::{self, RawTaskHandle};
use crate::semaphore::RawSemaphore;
use crate::Ticks;

/// Ownership query for mutex-kind primitives
///
/// Orthogonal to take/give so each capability can be tested on its own.
pub trait MutexOwnership {
    /// The task currently holding the mutex, if any
    ///
    /// Only reliable when the caller is itself the holder: any other task's
    /// answer may be stale by the time it is read.
    fn holder(&self) -> Option<RawTaskHandle>;
}

/// A mutual-exclusion primitive with priority inheritance
///
/// At most one task holds it at a time; the holder must be the one to give
/// it back. Take and give are task-context only.
pub struct Mutex {
    raw: RawSemaphore,
}

impl Mutex {
    /// Create a mutex, initially free
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the mutex.
    pub fn new() -> Mutex {
        let Some(handle) = port::sem_create_mutex() else {
            panic!("kernel refused to create mutex");
        };
        log_debug!("mutex created");
        Mutex {
            raw: RawSemaphore::from_handle(handle, 1),
        }
    }

    /// Acquire the mutex, waiting up to the default block time
    pub fn take(&self) -> bool {
        self.raw.take()
    }

    /// Acquire the mutex, waiting up to `timeout` ticks
    ///
    /// While the caller waits, the current holder inherits the caller's
    /// priority if it is the higher one.
    pub fn take_for(&self, timeout: Ticks) -> bool {
        self.raw.take_for(timeout)
    }

    /// Release the mutex
    ///
    /// Fails if the calling task is not the holder.
    pub fn give(&self) -> bool {
        self.raw.give()
    }

    /// 1 if the mutex is free, 0 if held
    pub fn count(&self) -> u32 {
        self.raw.count()
    }

    /// The wait used by [`take`](Mutex::take), in ticks
    pub fn default_block_time(&self) -> Ticks {
        self.raw.default_block_time()
    }

    /// Change the wait used by [`take`](Mutex::take)
    pub fn set_default_block_time(&self, ticks: Ticks) {
        self.raw.set_default_block_time(ticks);
    }
}

impl Default for Mutex {
    fn default() -> Mutex {
        Mutex::new()
    }
}

impl MutexOwnership for Mutex {
    fn holder(&self) -> Option<RawTaskHandle> {
        self.raw.holder()
    }
}

/// A mutex its holder may re-take without deadlocking itself
///
/// The kernel counts the holder's takes; the mutex only becomes free again
/// once gives have balanced them. A give from any other task, or past zero
/// depth, fails.
pub struct RecursiveMutex {
    raw: RawSemaphore,
}

impl RecursiveMutex {
    /// Create a recursive mutex, initially free
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the mutex.
    pub fn new() -> RecursiveMutex {
        let Some(handle) = port::sem_create_recursive_mutex() else {
            panic!("kernel refused to create mutex");
        };
        log_debug!("recursive mutex created");
        RecursiveMutex {
            raw: RawSemaphore::from_handle(handle, 1),
        }
    }

    /// Acquire or re-acquire the mutex, waiting up to the default block time
    pub fn take(&self) -> bool {
        self.take_for(self.raw.default_block_time())
    }

    /// Acquire or re-acquire the mutex, waiting up to `timeout` ticks
    ///
    /// Succeeds immediately when the caller already holds the mutex,
    /// deepening the recursion by one.
    pub fn take_for(&self, timeout: Ticks) -> bool {
        self.raw.take_recursive_for(timeout)
    }

    /// Undo one take by the holding task
    ///
    /// The mutex becomes available to others only when every take has been
    /// balanced. Fails for a non-holder or at zero depth.
    pub fn give(&self) -> bool {
        self.raw.give_recursive()
    }

    /// 1 if the mutex is free, 0 if held at any depth
    pub fn count(&self) -> u32 {
        self.raw.count()
    }

    /// The wait used by [`take`](RecursiveMutex::take), in ticks
    pub fn default_block_time(&self) -> Ticks {
        self.raw.default_block_time()
    }

    /// Change the wait used by [`take`](RecursiveMutex::take)
    pub fn set_default_block_time(&self, ticks: Ticks) {
        self.raw.set_default_block_time(ticks);
    }
}

impl Default for RecursiveMutex {
    fn default() -> RecursiveMutex {
        RecursiveMutex::new()
    }
}

impl MutexOwnership for RecursiveMutex {
    fn holder(&self) -> Option<RawTaskHandle> {
        self.raw.holder()
    }
}

#[cfg(test)]
mod tests {
    use core::ffi::c_void;

    use super::*;
    use crate::port::sim;
    use crate::task::{Priority, Task};

    extern "C" fn spin(_arg: *mut c_void) {}

    #[test]
    fn take_and_give() {
        let mutex = Mutex::new();
        assert_eq!(mutex.count(), 1);
        assert!(mutex.take());
        assert_eq!(mutex.count(), 0);
        assert!(mutex.give());
        assert_eq!(mutex.count(), 1);
    }

    #[test]
    fn holder_is_the_taking_task() {
        let mutex = Mutex::new();
        assert_eq!(mutex.holder(), None);
        assert!(mutex.take());
        assert_eq!(mutex.holder(), Some(sim::current_task()));
        assert!(mutex.give());
        assert_eq!(mutex.holder(), None);
    }

    #[test]
    fn give_by_a_non_holder_fails() {
        let mutex = Mutex::new();
        assert!(mutex.take());
        let other = Task::new(spin, "other", 128, Priority::NORMAL);
        let me = sim::switch_to(other.raw_handle());
        assert!(!mutex.give());
        sim::switch_to(me);
        assert!(mutex.give());
    }

    #[test]
    fn re_taking_a_plain_mutex_times_out() {
        let mutex = Mutex::new();
        assert!(mutex.take());
        // The holder asking again would deadlock; it reports failure instead
        assert!(!mutex.take_for(0));
        assert!(mutex.give());
    }

    #[test]
    fn contended_holder_inherits_priority() {
        let mutex = Mutex::new();
        let low = Task::new(spin, "low", 128, Priority::LOW);

        let me = sim::switch_to(low.raw_handle());
        assert!(mutex.take());
        sim::switch_to(me);

        // We run at NORMAL and fail to take: the holder is boosted to ours
        assert!(!mutex.take_for(0));
        assert_eq!(low.priority(), Priority::NORMAL);

        sim::switch_to(low.raw_handle());
        assert!(mutex.give());
        sim::switch_to(me);
        assert_eq!(low.priority(), Priority::LOW);
    }

    #[test]
    fn recursive_takes_need_balanced_gives() {
        let mutex = RecursiveMutex::new();
        assert!(mutex.take());
        assert!(mutex.take());
        assert_eq!(mutex.count(), 0);

        let third_party = Task::new(spin, "3rd", 128, Priority::NORMAL);
        let me = sim::switch_to(third_party.raw_handle());
        assert!(!mutex.take_for(0));
        sim::switch_to(me);

        assert!(mutex.give());
        // One give down, still held
        let me = sim::switch_to(third_party.raw_handle());
        assert!(!mutex.take_for(0));
        sim::switch_to(me);

        assert!(mutex.give());
        // Balanced; now a third party can have it
        let me = sim::switch_to(third_party.raw_handle());
        assert!(mutex.take_for(0));
        assert!(mutex.give());
        sim::switch_to(me);
    }

    #[test]
    fn recursive_give_at_zero_depth_fails() {
        let mutex = RecursiveMutex::new();
        assert!(!mutex.give());
        assert_eq!(mutex.count(), 1);
    }

    #[test]
    fn recursive_holder_query() {
        let mutex = RecursiveMutex::new();
        assert!(mutex.take());
        assert_eq!(mutex.holder(), Some(sim::current_task()));
        assert!(mutex.give());
        assert_eq!(mutex.holder(), None);
    }
}

// End of File
