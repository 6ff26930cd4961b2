//! Holds the [`Task`] type and the ambient operations on the calling task

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ffi::c_void;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::port::{self, RawTaskHandle};
use crate::{MAX_NAME_LEN, Name, Ticks, clamp_name};

/// A task's entry function
///
/// Entry functions are handed to the kernel, so they use the C ABI. An entry
/// function must not return: loop forever, or arrange for the task to be
/// deleted.
pub type TaskEntry = extern "C" fn(arg: *mut c_void);

/// Task priority; a larger value outranks a smaller one
///
/// The wrapped kernel schedules whichever ready task has the highest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u32);

impl Priority {
    /// Background work, only runs when nothing else is ready
    pub const IDLE: Priority = Priority(0);
    /// Housekeeping, logging, telemetry
    pub const LOW: Priority = Priority(1);
    /// Ordinary application tasks
    pub const NORMAL: Priority = Priority(2);
    /// Control loops and deadline-sensitive work
    pub const HIGH: Priority = Priority(3);
    /// Reserved for the most urgent task in the system
    pub const CRITICAL: Priority = Priority(4);
}

/// What the scheduler is doing with a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Runnable, waiting its turn
    Ready,
    /// Executing right now
    Running,
    /// Waiting on a timeout or a primitive
    Blocked,
    /// Removed from scheduling until resumed
    Suspended,
    /// Deleted; the handle is a tombstone
    Deleted,
}

impl TaskState {
    const fn as_str(self) -> &'static str {
        match self {
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Blocked => "blocked",
            TaskState::Suspended => "suspended",
            TaskState::Deleted => "deleted",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskState {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=str}", self.as_str());
    }
}

impl core::fmt::Display for TaskState {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// One status snapshot of a task
///
/// `state` is `None` when the snapshot came from [`Task::info`], which skips
/// the scheduler-level state lookup for speed.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub handle: RawTaskHandle,
    pub name: heapless::String<MAX_NAME_LEN>,
    pub priority: Priority,
    pub state: Option<TaskState>,
    /// Stack headroom low-water mark, in words
    pub free_stack_words: u32,
}

/// Delay the calling task for at least `ticks`
///
/// A suspension point: the scheduler runs other tasks until the delay ends.
/// The actual time asleep rounds up to the scheduler's tick granularity.
pub fn delay(ticks: Ticks) {
    port::task_delay(ticks);
}

/// Delay the calling task until `last_wake + period`
///
/// For jitter-free periodic work: the wake time advances by exactly `period`
/// each call, independent of how long the loop body took. The caller owns
/// `last_wake` and should initialise it from the current tick count before
/// the first call. [`Task::delay_until`] keeps the value internally instead.
pub fn delay_until(last_wake: &mut Ticks, period: Ticks) {
    port::task_delay_until(last_wake, period);
}

/// Give up the rest of this time slice
///
/// The calling task goes back on the ready queue at its current priority.
pub fn yield_now() {
    port::task_yield();
}

/// A schedulable unit of execution owned by the kernel
///
/// Creating a `Task` hands the kernel an entry function, a stack budget and
/// a priority; the kernel allocates the execution context and schedules it.
/// Dropping the `Task` deletes the kernel task. Creation failure is a
/// panic: an embedded target that cannot allocate a task context has no
/// useful way to continue.
pub struct Task {
    handle: port::TaskRef,
    name: Name,
    entry: TaskEntry,
    stack_words: u32,
    /// Last tick count sampled by `update_tick_count`; doubles as the
    /// last-wake reference for the internal form of `delay_until`
    cached_ticks: AtomicU32,
}

// SAFETY: the handle is an opaque token that only the kernel dereferences,
// under its own critical sections; the remaining fields are immutable or
// atomic.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    /// Create a task with no entry argument
    ///
    /// `stack_words` is the stack budget in words, not bytes. The name is
    /// for humans and debug tooling only; it is never used for lookup.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the task, e.g. because it is
    /// out of memory. See the crate docs on fatal construction.
    pub fn new(entry: TaskEntry, name: &str, stack_words: u32, priority: Priority) -> Task {
        Task::new_with_arg(entry, name, stack_words, core::ptr::null_mut(), priority)
    }

    /// Create a task whose entry function receives `arg`
    ///
    /// Whatever `arg` points at is owned by the caller and must stay valid
    /// for as long as the task may run.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the task.
    pub fn new_with_arg(
        entry: TaskEntry,
        name: &str,
        stack_words: u32,
        arg: *mut c_void,
        priority: Priority,
    ) -> Task {
        let stored = clamp_name(name);
        let Some(handle) = port::task_create(entry, arg, stored.as_str(), stack_words, priority.0)
        else {
            panic!("kernel refused to create task");
        };
        log_debug!("task {=str} created", stored.as_str());
        Task {
            handle,
            name: stored,
            entry,
            stack_words,
            cached_ticks: AtomicU32::new(port::tick_count()),
        }
    }

    /// Delay this task until one period past its previous wake time
    ///
    /// Like the free [`delay_until`], but the last-wake value lives inside
    /// the object (it shares the cached tick-count cell, so it starts from
    /// the last `update_tick_count` sample, or from creation time).
    pub fn delay_until(&self, period: Ticks) {
        let mut last_wake = self.cached_ticks.load(Ordering::Relaxed);
        port::task_delay_until(&mut last_wake, period);
        self.cached_ticks.store(last_wake, Ordering::Relaxed);
    }

    /// The task's live, kernel-assigned priority
    ///
    /// May be higher than the value it was created with while the task holds
    /// a contended mutex (priority inheritance).
    pub fn priority(&self) -> Priority {
        Priority(port::task_priority(self.handle))
    }

    /// Change the task's priority
    pub fn set_priority(&self, priority: Priority) {
        port::task_set_priority(self.handle, priority.0);
    }

    /// Remove the task from scheduling entirely, whatever its priority
    ///
    /// Suspensions do not nest: however many times a task was suspended, one
    /// resume makes it runnable again.
    pub fn suspend(&self) {
        log_trace!("suspend task {=str}", self.name.as_str());
        port::task_suspend(self.handle);
    }

    /// Make a suspended task runnable again
    pub fn resume(&self) {
        log_trace!("resume task {=str}", self.name.as_str());
        port::task_resume(self.handle);
    }

    /// Interrupt-context [`resume`](Task::resume)
    ///
    /// Returns `true` if the task was actually suspended and is now ready.
    pub fn resume_from_isr(&self, _isr: &crate::InterruptContext) -> bool {
        port::task_resume_from_isr(self.handle)
    }

    /// Status snapshot without the scheduler-level state lookup
    ///
    /// Cheaper than [`info_with_state`](Task::info_with_state); the
    /// snapshot's `state` field is `None`.
    pub fn info(&self) -> TaskInfo {
        self.fill_info(false)
    }

    /// Status snapshot including the task state
    ///
    /// Obtaining the state is not a simple field read for the kernel, so
    /// this form is slower; prefer [`info`](Task::info) when the state does
    /// not matter.
    pub fn info_with_state(&self) -> TaskInfo {
        self.fill_info(true)
    }

    fn fill_info(&self, query_state: bool) -> TaskInfo {
        let raw = port::task_info(self.handle, query_state);
        TaskInfo {
            handle: RawTaskHandle(self.handle),
            name: self.name.clone(),
            priority: Priority(raw.priority),
            state: raw.state,
            free_stack_words: raw.free_stack_words,
        }
    }

    /// Stack headroom low-water mark, in words, from a fresh snapshot
    pub fn free_stack_words(&self) -> u32 {
        self.info().free_stack_words
    }

    /// Direct state query, without building a full snapshot
    pub fn state(&self) -> TaskState {
        port::task_state(self.handle)
    }

    /// The tick count as last sampled by an `update_tick_count` call
    pub fn tick_count(&self) -> Ticks {
        self.cached_ticks.load(Ordering::Relaxed)
    }

    /// Sample the kernel's tick counter and cache it
    ///
    /// Task context only; use
    /// [`update_tick_count_from_isr`](Task::update_tick_count_from_isr)
    /// inside interrupt handlers.
    pub fn update_tick_count(&self) -> Ticks {
        let now = port::tick_count();
        self.cached_ticks.store(now, Ordering::Relaxed);
        now
    }

    /// Interrupt-context [`update_tick_count`](Task::update_tick_count)
    pub fn update_tick_count_from_isr(&self, _isr: &crate::InterruptContext) -> Ticks {
        let now = port::tick_count_from_isr();
        self.cached_ticks.store(now, Ordering::Relaxed);
        now
    }

    /// The task's display name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The entry function this task was created with
    pub fn entry(&self) -> TaskEntry {
        self.entry
    }

    /// The stack budget this task was created with, in words
    pub fn stack_words(&self) -> u32 {
        self.stack_words
    }

    /// The underlying kernel handle, for comparisons and display
    pub fn raw_handle(&self) -> RawTaskHandle {
        RawTaskHandle(self.handle)
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        log_debug!("task {=str} deleted", self.name.as_str());
        port::task_delete(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::*;
    use crate::port::sim;

    extern "C" fn spin(_arg: *mut c_void) {}

    #[test]
    fn new_task_is_ready() {
        let task = Task::new(spin, "worker", 256, Priority::NORMAL);
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(task.name(), "worker");
        assert_eq!(task.priority(), Priority::NORMAL);
        assert_eq!(task.stack_words(), 256);
    }

    #[test]
    fn long_names_are_truncated() {
        let task = Task::new(spin, "a-task-with-a-very-long-name", 256, Priority::LOW);
        assert_eq!(task.name().len(), crate::MAX_NAME_LEN);
    }

    #[test]
    fn priority_can_be_changed() {
        let task = Task::new(spin, "worker", 256, Priority::LOW);
        task.set_priority(Priority::HIGH);
        assert_eq!(task.priority(), Priority::HIGH);
    }

    #[test]
    fn suspends_do_not_nest() {
        let task = Task::new(spin, "worker", 256, Priority::NORMAL);
        task.suspend();
        task.suspend();
        assert_eq!(task.state(), TaskState::Suspended);
        task.resume();
        assert_eq!(task.state(), TaskState::Ready);
    }

    #[test]
    fn resume_from_isr_reports_whether_it_resumed() {
        let task = Task::new(spin, "worker", 256, Priority::NORMAL);
        // SAFETY: exercising the interrupt-context path from a host test
        let isr = unsafe { crate::InterruptContext::new() };
        assert!(!task.resume_from_isr(&isr));
        task.suspend();
        assert!(task.resume_from_isr(&isr));
        assert_eq!(task.state(), TaskState::Ready);
    }

    #[test]
    fn running_state_tracks_the_scheduled_task() {
        let task = Task::new(spin, "worker", 256, Priority::NORMAL);
        let previous = sim::switch_to(task.raw_handle());
        assert_eq!(task.state(), TaskState::Running);
        sim::switch_to(previous);
        assert_eq!(task.state(), TaskState::Ready);
    }

    #[test]
    fn delay_advances_the_tick_counter() {
        let task = Task::new(spin, "worker", 256, Priority::NORMAL);
        let before = task.update_tick_count();
        delay(5);
        let after = task.update_tick_count();
        assert!(after >= before + 5);
        assert_eq!(task.tick_count(), after);
    }

    #[test]
    fn delay_until_is_jitter_free() {
        let mut last_wake = crate::port::tick_count();
        let start = last_wake;
        delay_until(&mut last_wake, 10);
        delay_until(&mut last_wake, 10);
        assert_eq!(last_wake, start + 20);
        assert_eq!(crate::port::tick_count(), last_wake);
    }

    #[test]
    fn object_delay_until_tracks_its_own_wake_time() {
        let task = Task::new(spin, "periodic", 256, Priority::NORMAL);
        let start = task.update_tick_count();
        task.delay_until(7);
        task.delay_until(7);
        assert_eq!(task.tick_count(), start + 14);
    }

    #[test]
    fn info_fills_the_snapshot() {
        let task = Task::new(spin, "worker", 300, Priority::HIGH);
        let info = task.info();
        assert_eq!(info.handle, task.raw_handle());
        assert_eq!(info.name.as_str(), "worker");
        assert_eq!(info.priority, Priority::HIGH);
        assert_eq!(info.state, None);
        assert_eq!(info.free_stack_words, 300);
    }

    #[test]
    fn info_with_state_queries_the_state() {
        let task = Task::new(spin, "worker", 300, Priority::HIGH);
        let info = task.info_with_state();
        assert_eq!(info.state, Some(TaskState::Ready));
        assert_eq!(task.free_stack_words(), 300);
    }

    #[test]
    fn task_state_displays_as_text() {
        assert_eq!(TaskState::Ready.to_string(), "ready");
        assert_eq!(TaskState::Suspended.to_string(), "suspended");
    }

    #[test]
    fn yield_now_is_callable() {
        yield_now();
    }
}

// End of File
