//! Contains the [`Timer`] type: named, deferred callbacks

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicU32, Ordering};

use crate::port::{self, RawTimerHandle};
use crate::{Name, Ticks, clamp_name};

/// A timer's expiry callback
///
/// Runs in the kernel's single timer-service context: never concurrently
/// with another timer callback, but concurrently with ordinary tasks. It
/// must not block, and it receives the raw handle of the timer that expired.
pub type TimerCallback = extern "C" fn(timer: RawTimerHandle);

/// A one-shot or periodic deferred callback
///
/// A dormant timer does nothing until started; a running timer fires its
/// callback after its period, then either re-arms itself (auto-reload) or
/// goes dormant again (one-shot).
///
/// Every mutating operation here is an asynchronous command: it is queued to
/// the timer-service context and takes effect when that context processes
/// it. The block time bounds only the wait to *submit* the command, not its
/// execution; the no-timeout forms use a per-object default, initially zero.
pub struct Timer {
    handle: port::TimerRef,
    name: Name,
    callback: TimerCallback,
    default_block_time: AtomicU32,
}

// SAFETY: the handle is an opaque token only the kernel dereferences, under
// its own critical sections; the remaining fields are immutable or atomic.
unsafe impl Send for Timer {}
unsafe impl Sync for Timer {}

impl Timer {
    /// Create a dormant timer with id 0
    ///
    /// `auto_reload` selects periodic (true) or one-shot (false) expiry.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the timer.
    pub fn new(name: &str, period: Ticks, auto_reload: bool, callback: TimerCallback) -> Timer {
        Timer::new_with_id(name, period, auto_reload, 0, callback)
    }

    /// Create a dormant timer carrying an opaque caller-defined id
    ///
    /// The timer engine never interprets the id; it exists so one callback
    /// function can serve several timers.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the timer.
    pub fn new_with_id(
        name: &str,
        period: Ticks,
        auto_reload: bool,
        id: usize,
        callback: TimerCallback,
    ) -> Timer {
        let stored = clamp_name(name);
        let Some(handle) = port::timer_create(stored.as_str(), period, auto_reload, id, callback)
        else {
            panic!("kernel refused to create timer");
        };
        log_debug!("timer {=str} created, period {=u32}", stored.as_str(), period);
        Timer {
            handle,
            name: stored,
            callback,
            default_block_time: AtomicU32::new(0),
        }
    }

    /// Whether the timer is running (started and not yet expired/stopped)
    pub fn is_active(&self) -> bool {
        port::timer_is_active(self.handle)
    }

    /// Start the timer; it will fire one period from when the command lands
    pub fn start(&self) -> bool {
        self.start_for(self.default_block_time())
    }

    /// [`start`](Timer::start) with an explicit command-submission wait
    pub fn start_for(&self, block_time: Ticks) -> bool {
        log_trace!("start timer {=str}", self.name.as_str());
        port::timer_start(self.handle, block_time)
    }

    /// Stop the timer; it goes dormant without firing
    pub fn stop(&self) -> bool {
        self.stop_for(self.default_block_time())
    }

    /// [`stop`](Timer::stop) with an explicit command-submission wait
    pub fn stop_for(&self, block_time: Ticks) -> bool {
        log_trace!("stop timer {=str}", self.name.as_str());
        port::timer_stop(self.handle, block_time)
    }

    /// Restart the timer from now; a running timer's expiry moves out
    pub fn reset(&self) -> bool {
        self.reset_for(self.default_block_time())
    }

    /// [`reset`](Timer::reset) with an explicit command-submission wait
    pub fn reset_for(&self, block_time: Ticks) -> bool {
        port::timer_reset(self.handle, block_time)
    }

    /// Change the period and (re)start the timer with it
    ///
    /// A dormant timer starts running when its period changes; this mirrors
    /// the wrapped kernel's behaviour.
    pub fn set_period(&self, new_period: Ticks) -> bool {
        self.set_period_for(new_period, self.default_block_time())
    }

    /// [`set_period`](Timer::set_period) with an explicit submission wait
    pub fn set_period_for(&self, new_period: Ticks, block_time: Ticks) -> bool {
        port::timer_change_period(self.handle, new_period, block_time)
    }

    /// The current period, in ticks
    pub fn period(&self) -> Ticks {
        port::timer_period(self.handle)
    }

    /// Replace the opaque caller-defined id
    pub fn set_id(&self, id: usize) {
        port::timer_set_id(self.handle, id);
    }

    /// The opaque caller-defined id
    pub fn id(&self) -> usize {
        port::timer_id(self.handle)
    }

    /// The timer's display name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The callback this timer was created with
    pub fn callback(&self) -> TimerCallback {
        self.callback
    }

    /// The underlying kernel handle, as passed to the callback
    pub fn raw_handle(&self) -> RawTimerHandle {
        RawTimerHandle(self.handle)
    }

    /// The command-submission wait used by the no-timeout operations
    pub fn default_block_time(&self) -> Ticks {
        self.default_block_time.load(Ordering::Relaxed)
    }

    /// Change the command-submission wait used by the no-timeout operations
    pub fn set_default_block_time(&self, ticks: Ticks) {
        self.default_block_time.store(ticks, Ordering::Relaxed);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log_debug!("timer {=str} deleted", self.name.as_str());
        let deleted = port::timer_delete(self.handle, self.default_block_time());
        // The kernel failing to honour a delete command within its block
        // time leaves a dangling callback registration; that is unrecoverable
        assert!(deleted, "kernel refused to delete timer");
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::task::delay;

    extern "C" fn count_one_shot(_timer: RawTimerHandle) {
        ONE_SHOT_FIRES.fetch_add(1, Ordering::Relaxed);
    }
    static ONE_SHOT_FIRES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn count_reload(_timer: RawTimerHandle) {
        RELOAD_FIRES.fetch_add(1, Ordering::Relaxed);
    }
    static RELOAD_FIRES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn count_reset(_timer: RawTimerHandle) {
        RESET_FIRES.fetch_add(1, Ordering::Relaxed);
    }
    static RESET_FIRES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn ignore(_timer: RawTimerHandle) {}

    #[test]
    fn one_shot_fires_once_per_start() {
        let timer = Timer::new("once", 10, false, count_one_shot);
        assert!(!timer.is_active());

        assert!(timer.start());
        assert!(timer.is_active());
        let before = ONE_SHOT_FIRES.load(Ordering::Relaxed);
        delay(35);
        assert_eq!(ONE_SHOT_FIRES.load(Ordering::Relaxed), before + 1);
        assert!(!timer.is_active());

        assert!(timer.start());
        delay(10);
        assert_eq!(ONE_SHOT_FIRES.load(Ordering::Relaxed), before + 2);
    }

    #[test]
    fn auto_reload_fires_until_stopped() {
        let timer = Timer::new("tick", 10, true, count_reload);
        assert!(timer.start());
        let before = RELOAD_FIRES.load(Ordering::Relaxed);
        delay(35);
        assert_eq!(RELOAD_FIRES.load(Ordering::Relaxed), before + 3);
        assert!(timer.is_active());

        assert!(timer.stop());
        assert!(!timer.is_active());
        delay(50);
        assert_eq!(RELOAD_FIRES.load(Ordering::Relaxed), before + 3);
    }

    #[test]
    fn reset_pushes_the_expiry_out() {
        let timer = Timer::new("reset", 10, false, count_reset);
        assert!(timer.start());
        let before = RESET_FIRES.load(Ordering::Relaxed);
        delay(5);
        assert!(timer.reset());
        delay(5);
        // Ten ticks since start, but only five since the reset
        assert_eq!(RESET_FIRES.load(Ordering::Relaxed), before);
        delay(5);
        assert_eq!(RESET_FIRES.load(Ordering::Relaxed), before + 1);
    }

    #[test]
    fn set_period_restarts_even_a_dormant_timer() {
        let timer = Timer::new("period", 10, false, ignore);
        assert_eq!(timer.period(), 10);
        assert!(!timer.is_active());
        assert!(timer.set_period(25));
        assert_eq!(timer.period(), 25);
        assert!(timer.is_active());
        assert!(timer.stop());
    }

    #[test]
    fn id_is_an_opaque_tag() {
        let timer = Timer::new_with_id("tagged", 10, false, 7, ignore);
        assert_eq!(timer.id(), 7);
        timer.set_id(99);
        assert_eq!(timer.id(), 99);
    }

    #[test]
    fn names_and_defaults() {
        let timer = Timer::new("heartbeat", 100, true, ignore);
        assert_eq!(timer.name(), "heartbeat");
        assert_eq!(timer.default_block_time(), 0);
        timer.set_default_block_time(4);
        assert_eq!(timer.default_block_time(), 4);
    }
}

// End of File
