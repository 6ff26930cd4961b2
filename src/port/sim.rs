//! Deterministic simulated kernel
//!
//! A stand-in for the real kernel so the wrapper layer builds and tests on
//! any host. It models what the external kernel promises through the
//! port calls: handle slots, semaphore counts, mutex ownership with priority
//! inheritance, recursion depth, bounded queues with front insertion, and a
//! software-timer service driven by a virtual tick clock.
//!
//! It is *not* a scheduler. Nothing here context-switches on its own; the
//! running task only changes when a test asks for it. A blocking wait that
//! cannot be satisfied immediately consumes its timeout from the virtual
//! clock (firing any software timers that fall due along the way) and then
//! reports failure. An unbounded wait that cannot be satisfied immediately
//! reports failure at once, because the simulation refuses to sleep forever.
//!
//! All state is thread-local: parallel host tests each see a private kernel.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use std::cell::RefCell;
use std::collections::VecDeque;
use std::string::{String, ToString};
use std::vec::Vec;

use super::{QueuePosition, RawTaskHandle, RawTaskInfo, RawTimerHandle};
use crate::task::{TaskEntry, TaskState};
use crate::timer::TimerCallback;
use crate::{MAX_DELAY, Ticks};

pub(crate) type TaskRef = usize;
pub(crate) type SemRef = usize;
pub(crate) type QueueRef = usize;
pub(crate) type TimerRef = usize;

struct Tcb {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    entry: Option<TaskEntry>,
    #[allow(dead_code)]
    arg: *mut core::ffi::c_void,
    priority: u32,
    /// Priority before any inheritance boost
    base_priority: u32,
    stack_words: u32,
    state: TaskState,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SemKind {
    Binary,
    Counting,
    Mutex,
    RecursiveMutex,
}

struct Sem {
    kind: SemKind,
    count: u32,
    max: u32,
    holder: Option<TaskRef>,
    depth: u32,
    deleted: bool,
}

struct Qcb {
    capacity: usize,
    item_size: usize,
    items: VecDeque<Vec<u8>>,
    registry_name: Option<String>,
    deleted: bool,
}

struct Tmr {
    #[allow(dead_code)]
    name: String,
    period: Ticks,
    auto_reload: bool,
    id: usize,
    callback: TimerCallback,
    active: bool,
    /// Absolute expiry on the virtual clock, valid while active
    expiry: u64,
    deleted: bool,
}

struct KernelState {
    now: u64,
    #[allow(dead_code)]
    running: bool,
    suspend_nesting: u32,
    current: TaskRef,
    tasks: Vec<Tcb>,
    sems: Vec<Sem>,
    queues: Vec<Qcb>,
    timers: Vec<Tmr>,
}

impl KernelState {
    fn boot() -> KernelState {
        // Slot 0 is the implicit task the host test itself runs as
        KernelState {
            now: 0,
            running: false,
            suspend_nesting: 0,
            current: 0,
            tasks: Vec::from([Tcb {
                name: "main".to_string(),
                entry: None,
                arg: core::ptr::null_mut(),
                priority: 2,
                base_priority: 2,
                stack_words: 0,
                state: TaskState::Ready,
            }]),
            sems: Vec::new(),
            queues: Vec::new(),
            timers: Vec::new(),
        }
    }
}

std::thread_local! {
    static KERNEL: RefCell<KernelState> = RefCell::new(KernelState::boot());
}

fn with<R>(f: impl FnOnce(&mut KernelState) -> R) -> R {
    KERNEL.with(|k| f(&mut k.borrow_mut()))
}

/// Advance the virtual clock, firing software timers as they fall due
///
/// Timers fire in expiry order and outside the state borrow, so a callback
/// may itself call back into the kernel.
fn advance(ticks: Ticks) {
    let target = with(|k| k.now + u64::from(ticks));
    loop {
        let due = with(|k| {
            k.timers
                .iter()
                .enumerate()
                .filter(|(_, t)| !t.deleted && t.active && t.expiry <= target)
                .min_by_key(|(_, t)| t.expiry)
                .map(|(i, t)| (i, t.expiry, t.callback))
        });
        let Some((idx, expiry, callback)) = due else {
            break;
        };
        with(|k| {
            k.now = expiry;
            let t = &mut k.timers[idx];
            if t.auto_reload {
                t.expiry = expiry + u64::from(t.period.max(1));
            } else {
                t.active = false;
            }
        });
        callback(RawTimerHandle(idx));
    }
    with(|k| k.now = target);
}

/// Burn a failed wait's timeout, unless it was unbounded
fn consume_timeout(ticks: Ticks) {
    if ticks != MAX_DELAY && ticks > 0 {
        advance(ticks);
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub(crate) fn task_create(
    entry: TaskEntry,
    arg: *mut core::ffi::c_void,
    name: &str,
    stack_words: u32,
    priority: u32,
) -> Option<TaskRef> {
    Some(with(|k| {
        k.tasks.push(Tcb {
            name: name.to_string(),
            entry: Some(entry),
            arg,
            priority,
            base_priority: priority,
            stack_words,
            state: TaskState::Ready,
        });
        k.tasks.len() - 1
    }))
}

pub(crate) fn task_delete(t: TaskRef) {
    with(|k| k.tasks[t].state = TaskState::Deleted);
}

pub(crate) fn task_delay(ticks: Ticks) {
    advance(ticks);
}

pub(crate) fn task_delay_until(last_wake: &mut Ticks, period: Ticks) {
    let target = last_wake.wrapping_add(period);
    let now = with(|k| k.now as Ticks);
    if target > now {
        advance(target - now);
    }
    *last_wake = target;
}

pub(crate) fn task_priority(t: TaskRef) -> u32 {
    with(|k| k.tasks[t].priority)
}

pub(crate) fn task_set_priority(t: TaskRef, priority: u32) {
    with(|k| {
        let tcb = &mut k.tasks[t];
        tcb.priority = priority;
        tcb.base_priority = priority;
    });
}

pub(crate) fn task_suspend(t: TaskRef) {
    with(|k| {
        if k.tasks[t].state != TaskState::Deleted {
            k.tasks[t].state = TaskState::Suspended;
        }
    });
}

pub(crate) fn task_resume(t: TaskRef) {
    with(|k| {
        if k.tasks[t].state == TaskState::Suspended {
            k.tasks[t].state = TaskState::Ready;
        }
    });
}

pub(crate) fn task_resume_from_isr(t: TaskRef) -> bool {
    with(|k| {
        if k.tasks[t].state == TaskState::Suspended {
            k.tasks[t].state = TaskState::Ready;
            true
        } else {
            false
        }
    })
}

pub(crate) fn task_yield() {
    // Immediate requeue at the same priority; with no competing runnable
    // task model there is nothing further to do.
}

pub(crate) fn task_state(t: TaskRef) -> TaskState {
    with(|k| {
        let tcb = &k.tasks[t];
        if tcb.state == TaskState::Ready && k.current == t {
            TaskState::Running
        } else {
            tcb.state
        }
    })
}

pub(crate) fn task_info(t: TaskRef, query_state: bool) -> RawTaskInfo {
    let state = query_state.then(|| task_state(t));
    with(|k| {
        let tcb = &k.tasks[t];
        RawTaskInfo {
            priority: tcb.priority,
            state,
            // Sim task stacks are never consumed, so the high-water mark is
            // the whole budget
            free_stack_words: tcb.stack_words,
        }
    })
}

pub(crate) fn tick_count() -> Ticks {
    with(|k| k.now as Ticks)
}

pub(crate) fn tick_count_from_isr() -> Ticks {
    tick_count()
}

// ---------------------------------------------------------------------------
// Scheduler control
// ---------------------------------------------------------------------------

pub(crate) fn scheduler_start() {
    with(|k| k.running = true);
}

pub(crate) fn scheduler_end() {
    with(|k| k.running = false);
}

pub(crate) fn scheduler_suspend_all() {
    with(|k| k.suspend_nesting += 1);
}

pub(crate) fn scheduler_resume_all() -> bool {
    with(|k| {
        k.suspend_nesting = k.suspend_nesting.saturating_sub(1);
        k.suspend_nesting == 0
    })
}

// ---------------------------------------------------------------------------
// Semaphores and mutexes
// ---------------------------------------------------------------------------

fn sem_push(kind: SemKind, count: u32, max: u32) -> Option<SemRef> {
    Some(with(|k| {
        k.sems.push(Sem {
            kind,
            count,
            max,
            holder: None,
            depth: 0,
            deleted: false,
        });
        k.sems.len() - 1
    }))
}

pub(crate) fn sem_create_binary() -> Option<SemRef> {
    sem_push(SemKind::Binary, 0, 1)
}

pub(crate) fn sem_create_counting(max: u32, initial: u32) -> Option<SemRef> {
    assert!(initial <= max, "initial semaphore count above maximum");
    sem_push(SemKind::Counting, initial, max)
}

pub(crate) fn sem_create_mutex() -> Option<SemRef> {
    sem_push(SemKind::Mutex, 1, 1)
}

pub(crate) fn sem_create_recursive_mutex() -> Option<SemRef> {
    sem_push(SemKind::RecursiveMutex, 1, 1)
}

pub(crate) fn sem_delete(s: SemRef) {
    with(|k| k.sems[s].deleted = true);
}

/// Boost a mutex holder blocked on by a higher-priority contender
fn inherit_priority(k: &mut KernelState, holder: TaskRef) {
    let contender = k.tasks[k.current].priority;
    if contender > k.tasks[holder].priority {
        k.tasks[holder].priority = contender;
    }
}

/// Undo any inheritance boost when the holder lets go
fn restore_priority(k: &mut KernelState, holder: TaskRef) {
    k.tasks[holder].priority = k.tasks[holder].base_priority;
}

fn sem_try_take(k: &mut KernelState, s: SemRef) -> bool {
    let current = k.current;
    assert!(!k.sems[s].deleted, "semaphore used after delete");
    let kind = k.sems[s].kind;
    match kind {
        SemKind::Binary | SemKind::Counting => {
            let sem = &mut k.sems[s];
            if sem.count > 0 {
                sem.count -= 1;
                true
            } else {
                false
            }
        }
        SemKind::Mutex | SemKind::RecursiveMutex => {
            let holder = k.sems[s].holder;
            match holder {
                None => {
                    let sem = &mut k.sems[s];
                    sem.holder = Some(current);
                    sem.depth = 1;
                    sem.count = 0;
                    true
                }
                Some(h) if h == current && kind == SemKind::RecursiveMutex => {
                    k.sems[s].depth += 1;
                    true
                }
                Some(h) if h != current => {
                    inherit_priority(k, h);
                    false
                }
                // A plain mutex re-taken by its holder deadlocks on the real
                // kernel; the sim turns that into a timeout failure
                Some(_) => false,
            }
        }
    }
}

pub(crate) fn sem_take(s: SemRef, ticks: Ticks) -> bool {
    let ok = with(|k| sem_try_take(k, s));
    if !ok {
        consume_timeout(ticks);
    }
    ok
}

pub(crate) fn sem_take_from_isr(s: SemRef) -> bool {
    with(|k| sem_try_take(k, s))
}

pub(crate) fn sem_take_recursive(s: SemRef, ticks: Ticks) -> bool {
    sem_take(s, ticks)
}

fn sem_try_give(k: &mut KernelState, s: SemRef) -> bool {
    let current = k.current;
    assert!(!k.sems[s].deleted, "semaphore used after delete");
    let kind = k.sems[s].kind;
    match kind {
        SemKind::Binary | SemKind::Counting => {
            let sem = &mut k.sems[s];
            if sem.count < sem.max {
                sem.count += 1;
                true
            } else {
                false
            }
        }
        SemKind::Mutex | SemKind::RecursiveMutex => {
            let holder = k.sems[s].holder;
            match holder {
                Some(h) if h == current => {
                    let released = {
                        let sem = &mut k.sems[s];
                        sem.depth -= 1;
                        if sem.depth == 0 {
                            sem.holder = None;
                            sem.count = 1;
                            true
                        } else {
                            false
                        }
                    };
                    if released {
                        restore_priority(k, h);
                    }
                    true
                }
                // Giving a mutex you do not hold is rejected
                _ => false,
            }
        }
    }
}

pub(crate) fn sem_give(s: SemRef) -> bool {
    with(|k| sem_try_give(k, s))
}

pub(crate) fn sem_give_from_isr(s: SemRef) -> bool {
    with(|k| sem_try_give(k, s))
}

pub(crate) fn sem_give_recursive(s: SemRef) -> bool {
    with(|k| sem_try_give(k, s))
}

pub(crate) fn sem_count(s: SemRef) -> u32 {
    with(|k| {
        let sem = &k.sems[s];
        match sem.kind {
            SemKind::Binary | SemKind::Counting => sem.count,
            SemKind::Mutex | SemKind::RecursiveMutex => {
                if sem.holder.is_none() {
                    1
                } else {
                    0
                }
            }
        }
    })
}

pub(crate) fn sem_holder(s: SemRef) -> Option<RawTaskHandle> {
    with(|k| k.sems[s].holder.map(RawTaskHandle))
}

// ---------------------------------------------------------------------------
// Queues
// ---------------------------------------------------------------------------

pub(crate) fn queue_create(capacity: u32, item_size: usize) -> Option<QueueRef> {
    assert!(capacity > 0, "queue capacity must be non-zero");
    Some(with(|k| {
        k.queues.push(Qcb {
            capacity: capacity as usize,
            item_size,
            items: VecDeque::new(),
            registry_name: None,
            deleted: false,
        });
        k.queues.len() - 1
    }))
}

pub(crate) fn queue_delete(q: QueueRef) {
    with(|k| k.queues[q].deleted = true);
}

pub(crate) fn queue_add_to_registry(q: QueueRef, name: &str) {
    with(|k| k.queues[q].registry_name = Some(name.to_string()));
}

fn queue_try_send(k: &mut KernelState, q: QueueRef, item: *const u8, len: usize, pos: QueuePosition) -> bool {
    let qcb = &mut k.queues[q];
    assert!(!qcb.deleted, "queue used after delete");
    assert_eq!(len, qcb.item_size, "item size does not match the queue");
    if qcb.items.len() >= qcb.capacity {
        return false;
    }
    // SAFETY: the caller passes a pointer to a live item of exactly
    // `item_size` bytes; the bytes are copied out before the call returns.
    let bytes = unsafe { core::slice::from_raw_parts(item, len) }.to_vec();
    match pos {
        QueuePosition::Back => qcb.items.push_back(bytes),
        QueuePosition::Front => qcb.items.push_front(bytes),
    }
    true
}

pub(crate) fn queue_send(
    q: QueueRef,
    item: *const u8,
    item_size: usize,
    pos: QueuePosition,
    ticks: Ticks,
) -> bool {
    let ok = with(|k| queue_try_send(k, q, item, item_size, pos));
    if !ok {
        consume_timeout(ticks);
    }
    ok
}

pub(crate) fn queue_send_from_isr(
    q: QueueRef,
    item: *const u8,
    item_size: usize,
    pos: QueuePosition,
) -> bool {
    with(|k| queue_try_send(k, q, item, item_size, pos))
}

fn queue_try_receive(k: &mut KernelState, q: QueueRef, out: *mut u8, len: usize) -> bool {
    let qcb = &mut k.queues[q];
    assert!(!qcb.deleted, "queue used after delete");
    assert_eq!(len, qcb.item_size, "item size does not match the queue");
    match qcb.items.pop_front() {
        Some(bytes) => {
            // SAFETY: the caller passes a writable buffer of exactly
            // `item_size` bytes, and every stored item is that long.
            unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), out, len) };
            true
        }
        None => false,
    }
}

pub(crate) fn queue_receive(q: QueueRef, out: *mut u8, item_size: usize, ticks: Ticks) -> bool {
    let ok = with(|k| queue_try_receive(k, q, out, item_size));
    if !ok {
        consume_timeout(ticks);
    }
    ok
}

pub(crate) fn queue_receive_from_isr(q: QueueRef, out: *mut u8, item_size: usize) -> bool {
    with(|k| queue_try_receive(k, q, out, item_size))
}

pub(crate) fn queue_reset(q: QueueRef) -> bool {
    with(|k| {
        k.queues[q].items.clear();
        true
    })
}

pub(crate) fn queue_messages_waiting(q: QueueRef) -> u32 {
    with(|k| k.queues[q].items.len() as u32)
}

pub(crate) fn queue_messages_waiting_from_isr(q: QueueRef) -> u32 {
    queue_messages_waiting(q)
}

pub(crate) fn queue_spaces_available(q: QueueRef) -> u32 {
    with(|k| (k.queues[q].capacity - k.queues[q].items.len()) as u32)
}

// ---------------------------------------------------------------------------
// Software timers
// ---------------------------------------------------------------------------

pub(crate) fn timer_create(
    name: &str,
    period: Ticks,
    auto_reload: bool,
    id: usize,
    callback: TimerCallback,
) -> Option<TimerRef> {
    assert!(period > 0, "timer period must be non-zero");
    Some(with(|k| {
        k.timers.push(Tmr {
            name: name.to_string(),
            period,
            auto_reload,
            id,
            callback,
            active: false,
            expiry: 0,
            deleted: false,
        });
        k.timers.len() - 1
    }))
}

pub(crate) fn timer_delete(t: TimerRef, _block: Ticks) -> bool {
    with(|k| {
        k.timers[t].deleted = true;
        k.timers[t].active = false;
        true
    })
}

pub(crate) fn timer_start(t: TimerRef, _block: Ticks) -> bool {
    with(|k| {
        let now = k.now;
        let tmr = &mut k.timers[t];
        assert!(!tmr.deleted, "timer used after delete");
        tmr.active = true;
        tmr.expiry = now + u64::from(tmr.period);
        true
    })
}

pub(crate) fn timer_stop(t: TimerRef, _block: Ticks) -> bool {
    with(|k| {
        k.timers[t].active = false;
        true
    })
}

pub(crate) fn timer_reset(t: TimerRef, block: Ticks) -> bool {
    timer_start(t, block)
}

pub(crate) fn timer_change_period(t: TimerRef, new_period: Ticks, _block: Ticks) -> bool {
    assert!(new_period > 0, "timer period must be non-zero");
    with(|k| {
        let now = k.now;
        let tmr = &mut k.timers[t];
        assert!(!tmr.deleted, "timer used after delete");
        // Changing the period (re)starts the timer from now, dormant or not
        tmr.period = new_period;
        tmr.active = true;
        tmr.expiry = now + u64::from(new_period);
        true
    })
}

pub(crate) fn timer_is_active(t: TimerRef) -> bool {
    with(|k| k.timers[t].active)
}

pub(crate) fn timer_period(t: TimerRef) -> Ticks {
    with(|k| k.timers[t].period)
}

pub(crate) fn timer_set_id(t: TimerRef, id: usize) {
    with(|k| k.timers[t].id = id);
}

pub(crate) fn timer_id(t: TimerRef) -> usize {
    with(|k| k.timers[t].id)
}

// ---------------------------------------------------------------------------
// Test controls: deterministic context selection
// ---------------------------------------------------------------------------

/// The task the simulation believes is executing right now
#[cfg(test)]
pub(crate) fn current_task() -> RawTaskHandle {
    RawTaskHandle(with(|k| k.current))
}

/// Make `t` the running task; returns the task that was running before
///
/// The simulated kernel never context-switches on its own, so tests use this
/// to play the part of the scheduler.
#[cfg(test)]
pub(crate) fn switch_to(t: RawTaskHandle) -> RawTaskHandle {
    RawTaskHandle(with(|k| {
        let previous = k.current;
        k.current = t.0;
        previous
    }))
}

/// Registry name recorded for a queue, if any
#[cfg(test)]
pub(crate) fn queue_registry_name(q: QueueRef) -> Option<String> {
    with(|k| k.queues[q].registry_name.clone())
}

// End of File
