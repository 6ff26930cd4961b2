//! Counting and binary semaphores
//!
//! [`RawSemaphore`] is the shared core every semaphore-kind primitive in
//! this crate composes: it owns the kernel handle, the maximum count and the
//! configurable default block time. [`Semaphore`] is the plain signalling
//! primitive; the mutex types in [`crate::mutex`] wrap the same core with
//! ownership semantics.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicU32, Ordering};

use crate::port::{self, RawTaskHandle};
use crate::{InterruptContext, Ticks};

/// Owns one kernel semaphore handle, of whatever flavour
///
/// Exactly one wrapper object owns the handle; dropping it issues the
/// kernel's single delete call. Deleting a semaphore other tasks are blocked
/// on has no defined outcome and is the caller's responsibility to avoid.
pub(crate) struct RawSemaphore {
    handle: port::SemRef,
    max_count: u32,
    /// Wait used by the no-timeout operations; initially zero (non-blocking)
    default_block_time: AtomicU32,
}

// SAFETY: the handle is an opaque token only the kernel dereferences, under
// its own critical sections; sharing a semaphore between tasks is the whole
// point of the primitive.
unsafe impl Send for RawSemaphore {}
unsafe impl Sync for RawSemaphore {}

impl RawSemaphore {
    pub(crate) fn from_handle(handle: port::SemRef, max_count: u32) -> RawSemaphore {
        RawSemaphore {
            handle,
            max_count,
            default_block_time: AtomicU32::new(0),
        }
    }

    pub(crate) fn max_count(&self) -> u32 {
        self.max_count
    }

    pub(crate) fn default_block_time(&self) -> Ticks {
        self.default_block_time.load(Ordering::Relaxed)
    }

    pub(crate) fn set_default_block_time(&self, ticks: Ticks) {
        self.default_block_time.store(ticks, Ordering::Relaxed);
    }

    pub(crate) fn take_for(&self, timeout: Ticks) -> bool {
        port::sem_take(self.handle, timeout)
    }

    pub(crate) fn take(&self) -> bool {
        self.take_for(self.default_block_time())
    }

    pub(crate) fn take_from_isr(&self) -> bool {
        port::sem_take_from_isr(self.handle)
    }

    pub(crate) fn give(&self) -> bool {
        port::sem_give(self.handle)
    }

    pub(crate) fn give_from_isr(&self) -> bool {
        port::sem_give_from_isr(self.handle)
    }

    pub(crate) fn take_recursive_for(&self, timeout: Ticks) -> bool {
        port::sem_take_recursive(self.handle, timeout)
    }

    pub(crate) fn give_recursive(&self) -> bool {
        port::sem_give_recursive(self.handle)
    }

    pub(crate) fn count(&self) -> u32 {
        port::sem_count(self.handle)
    }

    pub(crate) fn holder(&self) -> Option<RawTaskHandle> {
        port::sem_holder(self.handle)
    }
}

impl Drop for RawSemaphore {
    fn drop(&mut self) {
        port::sem_delete(self.handle);
    }
}

/// A binary or counting signalling primitive
///
/// `take` claims a count (blocking up to a timeout in task context), `give`
/// returns one. Timeouts are ordinary `false` results. The no-timeout forms
/// use a per-object default block time, initially zero.
pub struct Semaphore {
    raw: RawSemaphore,
}

impl Semaphore {
    /// Create a binary semaphore, pre-loaded to "available"
    ///
    /// A fresh binary semaphore can be taken exactly once before someone
    /// must give it back.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the semaphore.
    pub fn binary() -> Semaphore {
        let Some(handle) = port::sem_create_binary() else {
            panic!("kernel refused to create semaphore");
        };
        log_debug!("binary semaphore created");
        let sem = Semaphore {
            raw: RawSemaphore::from_handle(handle, 1),
        };
        // The kernel creates binary semaphores empty; load the single count
        sem.raw.give();
        sem
    }

    /// Create a counting semaphore holding `initial` of `max_count` counts
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the semaphore.
    pub fn counting(max_count: u32, initial: u32) -> Semaphore {
        let Some(handle) = port::sem_create_counting(max_count, initial) else {
            panic!("kernel refused to create semaphore");
        };
        log_debug!("counting semaphore created, {=u32}/{=u32}", initial, max_count);
        Semaphore {
            raw: RawSemaphore::from_handle(handle, max_count),
        }
    }

    /// Claim a count, waiting up to the default block time
    ///
    /// Task context only. Returns `false` if no count became available in
    /// time.
    pub fn take(&self) -> bool {
        self.raw.take()
    }

    /// Claim a count, waiting up to `timeout` ticks
    ///
    /// Task context only; a suspension point when the semaphore is empty and
    /// `timeout` is non-zero.
    pub fn take_for(&self, timeout: Ticks) -> bool {
        self.raw.take_for(timeout)
    }

    /// Interrupt-context take; never waits
    pub fn take_from_isr(&self, _isr: &InterruptContext) -> bool {
        self.raw.take_from_isr()
    }

    /// Return a count
    ///
    /// Fails when the semaphore is already at its maximum count.
    pub fn give(&self) -> bool {
        self.raw.give()
    }

    /// Interrupt-context give; never waits
    pub fn give_from_isr(&self, _isr: &InterruptContext) -> bool {
        self.raw.give_from_isr()
    }

    /// The current count: 1/0 for binary, 0..=max for counting
    pub fn count(&self) -> u32 {
        self.raw.count()
    }

    /// The maximum count this semaphore can hold
    pub fn max_count(&self) -> u32 {
        self.raw.max_count()
    }

    /// The wait used by [`take`](Semaphore::take), in ticks
    pub fn default_block_time(&self) -> Ticks {
        self.raw.default_block_time()
    }

    /// Change the wait used by [`take`](Semaphore::take)
    pub fn set_default_block_time(&self, ticks: Ticks) {
        self.raw.set_default_block_time(ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_binary_semaphore_is_available_once() {
        let sem = Semaphore::binary();
        assert_eq!(sem.count(), 1);
        assert!(sem.take());
        assert_eq!(sem.count(), 0);
        assert!(!sem.take_for(0));
    }

    #[test]
    fn binary_semaphore_cycles() {
        let sem = Semaphore::binary();
        assert!(sem.take());
        assert!(sem.give());
        assert!(sem.take());
        // Overfilling a binary semaphore fails once it holds its count
        assert!(sem.give());
        assert!(!sem.give());
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn counting_semaphore_arithmetic() {
        let sem = Semaphore::counting(5, 2);
        assert_eq!(sem.count(), 2);
        assert!(sem.take());
        assert!(sem.take());
        assert_eq!(sem.count(), 0);
        assert!(!sem.take_for(0));
        assert!(sem.give());
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn counting_semaphore_respects_max() {
        let sem = Semaphore::counting(3, 3);
        assert!(!sem.give());
        assert_eq!(sem.count(), 3);
        assert_eq!(sem.max_count(), 3);
    }

    #[test]
    fn default_block_time_is_configurable() {
        let sem = Semaphore::binary();
        assert_eq!(sem.default_block_time(), 0);
        sem.set_default_block_time(10);
        assert_eq!(sem.default_block_time(), 10);
        assert!(sem.take());
        // Empty now; the default wait expires and the take fails
        assert!(!sem.take());
    }

    #[test]
    fn isr_variants_never_wait() {
        let sem = Semaphore::binary();
        // SAFETY: exercising the interrupt-context path from a host test
        let isr = unsafe { InterruptContext::new() };
        assert!(sem.take_from_isr(&isr));
        assert!(!sem.take_from_isr(&isr));
        assert!(sem.give_from_isr(&isr));
        assert_eq!(sem.count(), 1);
    }
}

// End of File
