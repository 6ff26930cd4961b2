//! C-ABI binding to the real kernel
//!
//! The integrator implements the `leash_port_*` shim over the kernel that
//! actually runs the board, one symbol per capability. Status returns are
//! `0` for failure and non-zero for success; a null handle from a create
//! call means the kernel refused.
//!
//! The from-ISR give/send/resume paths report through `out_woken` whether a
//! higher-priority task became runnable; when one did, we pend a context
//! switch the same way the tick handler does, so the woken task runs as soon
//! as the interrupt unwinds.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ffi::c_void;

use super::{QueuePosition, RawTaskHandle, RawTaskInfo};
use crate::task::{TaskEntry, TaskState};
use crate::timer::TimerCallback;
use crate::Ticks;

pub(crate) type TaskRef = *mut c_void;
pub(crate) type SemRef = *mut c_void;
pub(crate) type QueueRef = *mut c_void;
pub(crate) type TimerRef = *mut c_void;

unsafe extern "C" {
    fn leash_port_task_create(
        entry: TaskEntry,
        arg: *mut c_void,
        name: *const u8,
        name_len: usize,
        stack_words: u32,
        priority: u32,
    ) -> TaskRef;
    fn leash_port_task_delete(task: TaskRef);
    fn leash_port_task_delay(ticks: Ticks);
    fn leash_port_task_delay_until(last_wake: *mut Ticks, period: Ticks);
    fn leash_port_task_priority(task: TaskRef) -> u32;
    fn leash_port_task_set_priority(task: TaskRef, priority: u32);
    fn leash_port_task_suspend(task: TaskRef);
    fn leash_port_task_resume(task: TaskRef);
    fn leash_port_task_resume_from_isr(task: TaskRef, out_woken: *mut u32) -> u32;
    fn leash_port_task_yield();
    fn leash_port_task_state(task: TaskRef) -> u32;
    fn leash_port_task_info(
        task: TaskRef,
        query_state: u32,
        out_priority: *mut u32,
        out_state: *mut u32,
        out_free_stack_words: *mut u32,
    );
    fn leash_port_tick_count() -> Ticks;
    fn leash_port_tick_count_from_isr() -> Ticks;

    fn leash_port_scheduler_start();
    fn leash_port_scheduler_end();
    fn leash_port_scheduler_suspend_all();
    fn leash_port_scheduler_resume_all() -> u32;

    fn leash_port_sem_create_binary() -> SemRef;
    fn leash_port_sem_create_counting(max: u32, initial: u32) -> SemRef;
    fn leash_port_sem_create_mutex() -> SemRef;
    fn leash_port_sem_create_recursive_mutex() -> SemRef;
    fn leash_port_sem_delete(sem: SemRef);
    fn leash_port_sem_take(sem: SemRef, ticks: Ticks) -> u32;
    fn leash_port_sem_take_from_isr(sem: SemRef, out_woken: *mut u32) -> u32;
    fn leash_port_sem_give(sem: SemRef) -> u32;
    fn leash_port_sem_give_from_isr(sem: SemRef, out_woken: *mut u32) -> u32;
    fn leash_port_sem_take_recursive(sem: SemRef, ticks: Ticks) -> u32;
    fn leash_port_sem_give_recursive(sem: SemRef) -> u32;
    fn leash_port_sem_count(sem: SemRef) -> u32;
    fn leash_port_sem_holder(sem: SemRef) -> TaskRef;

    fn leash_port_queue_create(capacity: u32, item_size: usize) -> QueueRef;
    fn leash_port_queue_delete(queue: QueueRef);
    fn leash_port_queue_add_to_registry(queue: QueueRef, name: *const u8, name_len: usize);
    fn leash_port_queue_send(
        queue: QueueRef,
        item: *const u8,
        item_size: usize,
        to_front: u32,
        ticks: Ticks,
    ) -> u32;
    fn leash_port_queue_send_from_isr(
        queue: QueueRef,
        item: *const u8,
        item_size: usize,
        to_front: u32,
        out_woken: *mut u32,
    ) -> u32;
    fn leash_port_queue_receive(
        queue: QueueRef,
        out_item: *mut u8,
        item_size: usize,
        ticks: Ticks,
    ) -> u32;
    fn leash_port_queue_receive_from_isr(
        queue: QueueRef,
        out_item: *mut u8,
        item_size: usize,
        out_woken: *mut u32,
    ) -> u32;
    fn leash_port_queue_reset(queue: QueueRef) -> u32;
    fn leash_port_queue_messages_waiting(queue: QueueRef) -> u32;
    fn leash_port_queue_messages_waiting_from_isr(queue: QueueRef) -> u32;
    fn leash_port_queue_spaces_available(queue: QueueRef) -> u32;

    fn leash_port_timer_create(
        name: *const u8,
        name_len: usize,
        period: Ticks,
        auto_reload: u32,
        id: usize,
        callback: TimerCallback,
    ) -> TimerRef;
    fn leash_port_timer_delete(timer: TimerRef, block: Ticks) -> u32;
    fn leash_port_timer_start(timer: TimerRef, block: Ticks) -> u32;
    fn leash_port_timer_stop(timer: TimerRef, block: Ticks) -> u32;
    fn leash_port_timer_reset(timer: TimerRef, block: Ticks) -> u32;
    fn leash_port_timer_change_period(timer: TimerRef, new_period: Ticks, block: Ticks) -> u32;
    fn leash_port_timer_is_active(timer: TimerRef) -> u32;
    fn leash_port_timer_period(timer: TimerRef) -> Ticks;
    fn leash_port_timer_set_id(timer: TimerRef, id: usize);
    fn leash_port_timer_id(timer: TimerRef) -> usize;
}

/// Pend a context switch after an interrupt woke a higher-priority task
///
/// Same mechanism the scheduler tick uses: set PendSV, flush the pipeline so
/// it is taken as soon as the active interrupt returns.
fn yield_from_isr(woken: u32) {
    if woken == 0 {
        return;
    }
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    {
        cortex_m::peripheral::SCB::set_pendsv();
        cortex_m::asm::isb();
    }
}

fn state_from_raw(raw: u32) -> TaskState {
    match raw {
        0 => TaskState::Ready,
        1 => TaskState::Running,
        2 => TaskState::Blocked,
        3 => TaskState::Suspended,
        _ => TaskState::Deleted,
    }
}

pub(crate) fn task_create(
    entry: TaskEntry,
    arg: *mut c_void,
    name: &str,
    stack_words: u32,
    priority: u32,
) -> Option<TaskRef> {
    let handle = unsafe {
        leash_port_task_create(entry, arg, name.as_ptr(), name.len(), stack_words, priority)
    };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn task_delete(t: TaskRef) {
    unsafe { leash_port_task_delete(t) }
}

pub(crate) fn task_delay(ticks: Ticks) {
    unsafe { leash_port_task_delay(ticks) }
}

pub(crate) fn task_delay_until(last_wake: &mut Ticks, period: Ticks) {
    unsafe { leash_port_task_delay_until(last_wake, period) }
}

pub(crate) fn task_priority(t: TaskRef) -> u32 {
    unsafe { leash_port_task_priority(t) }
}

pub(crate) fn task_set_priority(t: TaskRef, priority: u32) {
    unsafe { leash_port_task_set_priority(t, priority) }
}

pub(crate) fn task_suspend(t: TaskRef) {
    unsafe { leash_port_task_suspend(t) }
}

pub(crate) fn task_resume(t: TaskRef) {
    unsafe { leash_port_task_resume(t) }
}

pub(crate) fn task_resume_from_isr(t: TaskRef) -> bool {
    let mut woken = 0;
    let ok = unsafe { leash_port_task_resume_from_isr(t, &mut woken) } != 0;
    yield_from_isr(woken);
    ok
}

pub(crate) fn task_yield() {
    unsafe { leash_port_task_yield() }
}

pub(crate) fn task_state(t: TaskRef) -> TaskState {
    state_from_raw(unsafe { leash_port_task_state(t) })
}

pub(crate) fn task_info(t: TaskRef, query_state: bool) -> RawTaskInfo {
    let mut priority = 0;
    let mut state = u32::MAX;
    let mut free_stack_words = 0;
    unsafe {
        leash_port_task_info(
            t,
            u32::from(query_state),
            &mut priority,
            &mut state,
            &mut free_stack_words,
        );
    }
    RawTaskInfo {
        priority,
        state: query_state.then(|| state_from_raw(state)),
        free_stack_words,
    }
}

pub(crate) fn tick_count() -> Ticks {
    unsafe { leash_port_tick_count() }
}

pub(crate) fn tick_count_from_isr() -> Ticks {
    unsafe { leash_port_tick_count_from_isr() }
}

pub(crate) fn scheduler_start() {
    unsafe { leash_port_scheduler_start() }
}

pub(crate) fn scheduler_end() {
    unsafe { leash_port_scheduler_end() }
}

pub(crate) fn scheduler_suspend_all() {
    unsafe { leash_port_scheduler_suspend_all() }
}

pub(crate) fn scheduler_resume_all() -> bool {
    unsafe { leash_port_scheduler_resume_all() != 0 }
}

pub(crate) fn sem_create_binary() -> Option<SemRef> {
    let handle = unsafe { leash_port_sem_create_binary() };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn sem_create_counting(max: u32, initial: u32) -> Option<SemRef> {
    let handle = unsafe { leash_port_sem_create_counting(max, initial) };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn sem_create_mutex() -> Option<SemRef> {
    let handle = unsafe { leash_port_sem_create_mutex() };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn sem_create_recursive_mutex() -> Option<SemRef> {
    let handle = unsafe { leash_port_sem_create_recursive_mutex() };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn sem_delete(s: SemRef) {
    unsafe { leash_port_sem_delete(s) }
}

pub(crate) fn sem_take(s: SemRef, ticks: Ticks) -> bool {
    unsafe { leash_port_sem_take(s, ticks) != 0 }
}

pub(crate) fn sem_take_from_isr(s: SemRef) -> bool {
    let mut woken = 0;
    let ok = unsafe { leash_port_sem_take_from_isr(s, &mut woken) } != 0;
    yield_from_isr(woken);
    ok
}

pub(crate) fn sem_give(s: SemRef) -> bool {
    unsafe { leash_port_sem_give(s) != 0 }
}

pub(crate) fn sem_give_from_isr(s: SemRef) -> bool {
    let mut woken = 0;
    let ok = unsafe { leash_port_sem_give_from_isr(s, &mut woken) } != 0;
    yield_from_isr(woken);
    ok
}

pub(crate) fn sem_take_recursive(s: SemRef, ticks: Ticks) -> bool {
    unsafe { leash_port_sem_take_recursive(s, ticks) != 0 }
}

pub(crate) fn sem_give_recursive(s: SemRef) -> bool {
    unsafe { leash_port_sem_give_recursive(s) != 0 }
}

pub(crate) fn sem_count(s: SemRef) -> u32 {
    unsafe { leash_port_sem_count(s) }
}

pub(crate) fn sem_holder(s: SemRef) -> Option<RawTaskHandle> {
    let holder = unsafe { leash_port_sem_holder(s) };
    (!holder.is_null()).then_some(RawTaskHandle(holder))
}

pub(crate) fn queue_create(capacity: u32, item_size: usize) -> Option<QueueRef> {
    let handle = unsafe { leash_port_queue_create(capacity, item_size) };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn queue_delete(q: QueueRef) {
    unsafe { leash_port_queue_delete(q) }
}

pub(crate) fn queue_add_to_registry(q: QueueRef, name: &str) {
    unsafe { leash_port_queue_add_to_registry(q, name.as_ptr(), name.len()) }
}

pub(crate) fn queue_send(
    q: QueueRef,
    item: *const u8,
    item_size: usize,
    pos: QueuePosition,
    ticks: Ticks,
) -> bool {
    let to_front = u32::from(pos == QueuePosition::Front);
    unsafe { leash_port_queue_send(q, item, item_size, to_front, ticks) != 0 }
}

pub(crate) fn queue_send_from_isr(
    q: QueueRef,
    item: *const u8,
    item_size: usize,
    pos: QueuePosition,
) -> bool {
    let to_front = u32::from(pos == QueuePosition::Front);
    let mut woken = 0;
    let ok = unsafe { leash_port_queue_send_from_isr(q, item, item_size, to_front, &mut woken) } != 0;
    yield_from_isr(woken);
    ok
}

pub(crate) fn queue_receive(q: QueueRef, out: *mut u8, item_size: usize, ticks: Ticks) -> bool {
    unsafe { leash_port_queue_receive(q, out, item_size, ticks) != 0 }
}

pub(crate) fn queue_receive_from_isr(q: QueueRef, out: *mut u8, item_size: usize) -> bool {
    let mut woken = 0;
    let ok = unsafe { leash_port_queue_receive_from_isr(q, out, item_size, &mut woken) } != 0;
    yield_from_isr(woken);
    ok
}

pub(crate) fn queue_reset(q: QueueRef) -> bool {
    unsafe { leash_port_queue_reset(q) != 0 }
}

pub(crate) fn queue_messages_waiting(q: QueueRef) -> u32 {
    unsafe { leash_port_queue_messages_waiting(q) }
}

pub(crate) fn queue_messages_waiting_from_isr(q: QueueRef) -> u32 {
    unsafe { leash_port_queue_messages_waiting_from_isr(q) }
}

pub(crate) fn queue_spaces_available(q: QueueRef) -> u32 {
    unsafe { leash_port_queue_spaces_available(q) }
}

pub(crate) fn timer_create(
    name: &str,
    period: Ticks,
    auto_reload: bool,
    id: usize,
    callback: TimerCallback,
) -> Option<TimerRef> {
    let handle = unsafe {
        leash_port_timer_create(
            name.as_ptr(),
            name.len(),
            period,
            u32::from(auto_reload),
            id,
            callback,
        )
    };
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn timer_delete(t: TimerRef, block: Ticks) -> bool {
    unsafe { leash_port_timer_delete(t, block) != 0 }
}

pub(crate) fn timer_start(t: TimerRef, block: Ticks) -> bool {
    unsafe { leash_port_timer_start(t, block) != 0 }
}

pub(crate) fn timer_stop(t: TimerRef, block: Ticks) -> bool {
    unsafe { leash_port_timer_stop(t, block) != 0 }
}

pub(crate) fn timer_reset(t: TimerRef, block: Ticks) -> bool {
    unsafe { leash_port_timer_reset(t, block) != 0 }
}

pub(crate) fn timer_change_period(t: TimerRef, new_period: Ticks, block: Ticks) -> bool {
    unsafe { leash_port_timer_change_period(t, new_period, block) != 0 }
}

pub(crate) fn timer_is_active(t: TimerRef) -> bool {
    unsafe { leash_port_timer_is_active(t) != 0 }
}

pub(crate) fn timer_period(t: TimerRef) -> Ticks {
    unsafe { leash_port_timer_period(t) }
}

pub(crate) fn timer_set_id(t: TimerRef, id: usize) {
    unsafe { leash_port_timer_set_id(t, id) }
}

pub(crate) fn timer_id(t: TimerRef) -> usize {
    unsafe { leash_port_timer_id(t) }
}

// End of File
