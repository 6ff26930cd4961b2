//! Cross-component coordination, driven through the public API only
//!
//! A software timer plays the producer, feeding a queue and signalling a
//! semaphore the way an application's timer callbacks feed its worker tasks.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::OnceLock;

use leash::{
    InterruptContext, MAX_DELAY, Mutex, MutexOwnership, Queue, RawTimerHandle, RecursiveMutex,
    Semaphore, Timer, delay, scheduler,
};

static SAMPLES: OnceLock<Queue<u32>> = OnceLock::new();
static SAMPLE_COUNT: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

extern "C" fn sample_tick(_timer: RawTimerHandle) {
    let n = SAMPLE_COUNT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let queue = SAMPLES.get().unwrap();
    queue.send_to_back_for(n, 0);
}

#[test]
fn timer_feeds_a_queue_of_samples() {
    SAMPLES.get_or_init(|| Queue::new(16));
    scheduler::start_scheduler();

    let timer = Timer::new("sampler", 10, true, sample_tick);
    assert!(timer.start());
    delay(45);
    assert!(timer.stop());

    let queue = SAMPLES.get().unwrap();
    assert_eq!(queue.messages_waiting(), 4);
    let first = queue.receive_for(0).unwrap();
    for expected in first + 1..first + 4 {
        assert_eq!(queue.receive_for(0), Some(expected));
    }
    assert_eq!(queue.receive_for(0), None);

    scheduler::end_scheduler();
}

static EVENTS: OnceLock<Queue<u8>> = OnceLock::new();

#[test]
fn interrupt_handler_hands_work_to_a_task() {
    let queue = EVENTS.get_or_init(|| Queue::with_registry_name(4, "events"));
    let ready = Semaphore::binary();
    assert!(ready.take());

    // An interrupt handler would run this with a real token
    // SAFETY: exercising the interrupt-context path from a host test
    let isr = unsafe { InterruptContext::new() };
    assert!(queue.send_to_back_from_isr(0x42, &isr));
    assert!(queue.send_to_front_from_isr(0x01, &isr));
    assert!(ready.give_from_isr(&isr));

    // Task side: the signal is up and the urgent event arrives first
    assert!(ready.take_for(10));
    assert_eq!(queue.receive_for(0), Some(0x01));
    assert_eq!(queue.receive_for(0), Some(0x42));
    assert_eq!(queue.name(), Some("events"));
}

#[test]
fn mutexes_guard_a_shared_region() {
    let gate = Mutex::new();
    assert!(gate.take_for(MAX_DELAY));
    assert!(gate.holder().is_some());
    assert!(gate.give());
    assert!(gate.holder().is_none());

    let reentrant = RecursiveMutex::new();
    assert!(reentrant.take());
    assert!(reentrant.take());
    assert!(reentrant.give());
    assert!(reentrant.give());
    assert!(!reentrant.give());
}

#[test]
fn timeouts_convert_and_round_trip() {
    let ticks = scheduler::ticks_from_duration(core::time::Duration::from_millis(250));
    assert_eq!(scheduler::duration_from_ticks(ticks).as_millis(), 250);
}

// End of File
