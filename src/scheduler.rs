//! Process-wide scheduler control and tick arithmetic

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::time::Duration;

use crate::{Ticks, port};

/// Scheduler tick frequency, fixed when the kernel is built
///
/// All timeouts and timer periods in this crate are multiples of
/// `1 / TICK_RATE_HZ` seconds.
pub const TICK_RATE_HZ: u32 = 1_000;

/// Milliseconds per tick, the unit [`duration_from_ticks`] reports in
const TICK_PERIOD_MS: u64 = 1_000 / TICK_RATE_HZ as u64;

/// Hand control to the kernel's scheduler
///
/// On a real port this call does not return while the system runs normally;
/// the calling context becomes the kernel's. The simulated kernel merely
/// marks the scheduler live and returns, since the host test keeps control.
pub fn start_scheduler() {
    log_debug!("scheduler start");
    port::scheduler_start();
}

/// Stop the scheduler and return control to the caller of
/// [`start_scheduler`]
pub fn end_scheduler() {
    log_debug!("scheduler end");
    port::scheduler_end();
}

/// Pause all task switching
///
/// Interrupts stay live. Individually suspended tasks are unaffected; this
/// stops the scheduler itself from moving between tasks. Calls nest.
pub fn suspend_all() {
    port::scheduler_suspend_all();
}

/// Undo one [`suspend_all`]
///
/// Returns `true` once task switching is actually live again, i.e. the
/// suspension nesting reached zero. It does not resume tasks that were
/// suspended one at a time.
pub fn resume_all() -> bool {
    port::scheduler_resume_all()
}

/// Convert a duration to kernel ticks, truncating
///
/// Integer division: any part of the duration smaller than one tick is
/// dropped, so a sub-tick duration converts to zero ticks. Callers that need
/// "at least this long" should add one tick themselves.
pub const fn ticks_from_duration(duration: Duration) -> Ticks {
    (duration.as_millis() as u64 / TICK_PERIOD_MS) as Ticks
}

/// Convert kernel ticks to a duration, at millisecond resolution
pub const fn duration_from_ticks(ticks: Ticks) -> Duration {
    Duration::from_millis(ticks as u64 * TICK_PERIOD_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_round_trip() {
        for ticks in [0, 1, 7, 250, 1_000, 86_400_000] {
            assert_eq!(ticks_from_duration(duration_from_ticks(ticks)), ticks);
        }
    }

    #[test]
    fn calendar_units_convert() {
        assert_eq!(ticks_from_duration(Duration::from_millis(250)), 250);
        assert_eq!(ticks_from_duration(Duration::from_secs(2)), 2 * TICK_RATE_HZ);
        assert_eq!(
            ticks_from_duration(Duration::from_secs(3 * 60)),
            3 * 60 * TICK_RATE_HZ
        );
        assert_eq!(
            ticks_from_duration(Duration::from_secs(2 * 60 * 60)),
            2 * 60 * 60 * TICK_RATE_HZ
        );
    }

    #[test]
    fn sub_tick_durations_truncate_to_zero() {
        assert_eq!(ticks_from_duration(Duration::from_micros(999)), 0);
    }

    #[test]
    fn suspend_resume_nesting() {
        suspend_all();
        suspend_all();
        assert!(!resume_all());
        assert!(resume_all());
    }

    #[test]
    fn scheduler_start_returns_under_simulation() {
        start_scheduler();
        end_scheduler();
    }
}

// End of File
