//! Contains the [`Queue`] type: a bounded, by-value message channel

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::port::{self, QueuePosition};
use crate::{InterruptContext, MAX_DELAY, Name, Ticks, clamp_name};

/// A fixed-capacity channel of fixed-size items
///
/// Items are copied into kernel-owned storage on send and copied out on
/// receive, so producer and consumer never alias each other's memory; the
/// `T: Copy` bound is the trivially-copyable requirement this implies.
///
/// `send_to_back` and `receive` form a strict FIFO. `send_to_front` exists
/// for urgent items and deliberately breaks that ordering: a front insertion
/// is served before everything already queued. Do not mix front and back
/// sends on one queue if the consumer relies on arrival order.
///
/// The no-timeout send uses a configurable default wait that starts at zero
/// (try, don't block); the no-timeout receive starts at [`MAX_DELAY`]
/// (consumers usually want to sleep until work arrives).
pub struct Queue<T: Copy> {
    handle: port::QueueRef,
    capacity: u32,
    name: Option<Name>,
    default_send_block: AtomicU32,
    default_receive_block: AtomicU32,
    _items: PhantomData<T>,
}

// SAFETY: the handle is an opaque token only the kernel dereferences, under
// its own critical sections. Items cross task boundaries by value, hence the
// `T: Send` requirement.
unsafe impl<T: Copy + Send> Send for Queue<T> {}
unsafe impl<T: Copy + Send> Sync for Queue<T> {}

impl<T: Copy> Queue<T> {
    /// Create a queue holding at most `capacity` items of type `T`
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the queue, e.g. because it
    /// cannot allocate `capacity * size_of::<T>()` bytes of item storage.
    pub fn new(capacity: u32) -> Queue<T> {
        Self::build(capacity, None)
    }

    /// Create a queue and record `name` in the kernel's debug registry
    ///
    /// The registry is read by external inspection tooling only; the name
    /// has no effect on runtime behaviour.
    ///
    /// # Panics
    ///
    /// Panics if the kernel refuses to create the queue.
    pub fn with_registry_name(capacity: u32, name: &str) -> Queue<T> {
        Self::build(capacity, Some(clamp_name(name)))
    }

    fn build(capacity: u32, name: Option<Name>) -> Queue<T> {
        let Some(handle) = port::queue_create(capacity, size_of::<T>()) else {
            panic!("kernel refused to create queue");
        };
        if let Some(name) = &name {
            port::queue_add_to_registry(handle, name.as_str());
            log_debug!("queue {=str} created, {=u32} slots", name.as_str(), capacity);
        } else {
            log_debug!("queue created, {=u32} slots", capacity);
        }
        Queue {
            handle,
            capacity,
            name,
            default_send_block: AtomicU32::new(0),
            default_receive_block: AtomicU32::new(MAX_DELAY),
            _items: PhantomData,
        }
    }

    fn send(&self, item: &T, pos: QueuePosition, timeout: Ticks) -> bool {
        port::queue_send(
            self.handle,
            core::ptr::from_ref(item).cast(),
            size_of::<T>(),
            pos,
            timeout,
        )
    }

    /// Enqueue at the tail, waiting up to the default send block time
    pub fn send_to_back(&self, item: T) -> bool {
        self.send_to_back_for(item, self.default_send_block_time())
    }

    /// Enqueue at the tail, waiting up to `timeout` ticks for a free slot
    ///
    /// Task context only; a suspension point when the queue is full and
    /// `timeout` is non-zero. Returns `false` if no slot opened in time.
    pub fn send_to_back_for(&self, item: T, timeout: Ticks) -> bool {
        self.send(&item, QueuePosition::Back, timeout)
    }

    /// Enqueue at the head: the next receive returns this item
    ///
    /// Waits up to the default send block time.
    pub fn send_to_front(&self, item: T) -> bool {
        self.send_to_front_for(item, self.default_send_block_time())
    }

    /// Enqueue at the head, waiting up to `timeout` ticks for a free slot
    pub fn send_to_front_for(&self, item: T, timeout: Ticks) -> bool {
        self.send(&item, QueuePosition::Front, timeout)
    }

    /// Interrupt-context tail enqueue; never waits
    pub fn send_to_back_from_isr(&self, item: T, _isr: &InterruptContext) -> bool {
        port::queue_send_from_isr(
            self.handle,
            core::ptr::from_ref(&item).cast(),
            size_of::<T>(),
            QueuePosition::Back,
        )
    }

    /// Interrupt-context head enqueue; never waits
    pub fn send_to_front_from_isr(&self, item: T, _isr: &InterruptContext) -> bool {
        port::queue_send_from_isr(
            self.handle,
            core::ptr::from_ref(&item).cast(),
            size_of::<T>(),
            QueuePosition::Front,
        )
    }

    /// Dequeue from the head, waiting up to the default receive block time
    ///
    /// The default starts at [`MAX_DELAY`], so a bare `receive()` sleeps
    /// until an item arrives.
    pub fn receive(&self) -> Option<T> {
        self.receive_for(self.default_receive_block_time())
    }

    /// Dequeue from the head, waiting up to `timeout` ticks for an item
    ///
    /// Task context only; a suspension point when the queue is empty and
    /// `timeout` is non-zero. `None` means the wait timed out, a normal
    /// outcome rather than an error.
    pub fn receive_for(&self, timeout: Ticks) -> Option<T> {
        let mut slot = MaybeUninit::<T>::uninit();
        let ok = port::queue_receive(
            self.handle,
            slot.as_mut_ptr().cast(),
            size_of::<T>(),
            timeout,
        );
        // SAFETY: on success the kernel copied exactly size_of::<T>() bytes
        // of a previously sent T into the slot
        ok.then(|| unsafe { slot.assume_init() })
    }

    /// Interrupt-context dequeue; never waits
    pub fn receive_from_isr(&self, _isr: &InterruptContext) -> Option<T> {
        let mut slot = MaybeUninit::<T>::uninit();
        let ok = port::queue_receive_from_isr(self.handle, slot.as_mut_ptr().cast(), size_of::<T>());
        // SAFETY: as in `receive_for`
        ok.then(|| unsafe { slot.assume_init() })
    }

    /// Atomically discard everything queued
    ///
    /// Tasks blocked sending are not handed the freed slots retroactively;
    /// the queue is simply empty afterwards.
    pub fn reset(&self) -> bool {
        port::queue_reset(self.handle)
    }

    /// How many items are queued right now
    pub fn messages_waiting(&self) -> u32 {
        port::queue_messages_waiting(self.handle)
    }

    /// Interrupt-context [`messages_waiting`](Queue::messages_waiting)
    pub fn messages_waiting_from_isr(&self, _isr: &InterruptContext) -> u32 {
        port::queue_messages_waiting_from_isr(self.handle)
    }

    /// How many more items fit: `capacity - messages_waiting`
    pub fn spaces_available(&self) -> u32 {
        port::queue_spaces_available(self.handle)
    }

    /// The fixed capacity this queue was created with
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The debug-registry name, if one was set at creation
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The wait used by the no-timeout sends, in ticks
    pub fn default_send_block_time(&self) -> Ticks {
        self.default_send_block.load(Ordering::Relaxed)
    }

    /// Change the wait used by the no-timeout sends
    pub fn set_default_send_block_time(&self, ticks: Ticks) {
        self.default_send_block.store(ticks, Ordering::Relaxed);
    }

    /// The wait used by the no-timeout receive, in ticks
    pub fn default_receive_block_time(&self) -> Ticks {
        self.default_receive_block.load(Ordering::Relaxed)
    }

    /// Change the wait used by the no-timeout receive
    pub fn set_default_receive_block_time(&self, ticks: Ticks) {
        self.default_receive_block.store(ticks, Ordering::Relaxed);
    }
}

impl<T: Copy> Drop for Queue<T> {
    fn drop(&mut self) {
        port::queue_delete(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::sim;

    #[test]
    fn back_sends_and_receives_are_fifo() {
        let queue = Queue::new(8);
        for i in 0..5u32 {
            assert!(queue.send_to_back(i));
        }
        assert_eq!(queue.messages_waiting(), 5);
        for i in 0..5u32 {
            assert_eq!(queue.receive_for(0), Some(i));
        }
        assert_eq!(queue.messages_waiting(), 0);
    }

    #[test]
    fn a_full_queue_rejects_a_zero_wait_send() {
        let queue = Queue::new(3);
        assert!(queue.send_to_back(1u32));
        assert!(queue.send_to_back(2u32));
        assert!(queue.send_to_back(3u32));
        assert!(!queue.send_to_back_for(4u32, 0));
        assert_eq!(queue.messages_waiting(), 3);
        assert_eq!(queue.spaces_available(), 0);
    }

    #[test]
    fn an_empty_queue_times_out_a_bounded_receive() {
        let queue = Queue::<u32>::new(4);
        assert_eq!(queue.receive_for(10), None);
    }

    #[test]
    fn front_sends_jump_the_line() {
        let queue = Queue::new(8);
        assert!(queue.send_to_back(1u32));
        assert!(queue.send_to_back(2u32));
        assert!(queue.send_to_front(99u32));
        assert_eq!(queue.receive_for(0), Some(99));
        assert_eq!(queue.receive_for(0), Some(1));
        assert_eq!(queue.receive_for(0), Some(2));
    }

    #[test]
    fn spaces_available_complements_messages_waiting() {
        let queue = Queue::new(4);
        assert_eq!(queue.spaces_available(), 4);
        queue.send_to_back(7u8);
        queue.send_to_back(8u8);
        assert_eq!(queue.messages_waiting(), 2);
        assert_eq!(queue.spaces_available(), 2);
    }

    #[test]
    fn reset_discards_pending_items() {
        let queue = Queue::new(4);
        queue.send_to_back(1u16);
        queue.send_to_back(2u16);
        assert!(queue.reset());
        assert_eq!(queue.messages_waiting(), 0);
        assert_eq!(queue.receive_for(0), None);
    }

    #[test]
    fn isr_variants_never_wait() {
        let queue = Queue::new(2);
        // SAFETY: exercising the interrupt-context path from a host test
        let isr = unsafe { InterruptContext::new() };
        assert!(queue.send_to_back_from_isr(10u32, &isr));
        assert!(queue.send_to_front_from_isr(20u32, &isr));
        assert!(!queue.send_to_back_from_isr(30u32, &isr));
        assert_eq!(queue.messages_waiting_from_isr(&isr), 2);
        assert_eq!(queue.receive_from_isr(&isr), Some(20));
        assert_eq!(queue.receive_from_isr(&isr), Some(10));
        assert_eq!(queue.receive_from_isr(&isr), None);
    }

    #[test]
    fn structs_travel_by_value() {
        #[derive(Clone, Copy, PartialEq, Debug)]
        struct Reading {
            channel: u8,
            value: i32,
        }
        let queue = Queue::new(2);
        let sent = Reading {
            channel: 3,
            value: -1500,
        };
        assert!(queue.send_to_back(sent));
        assert_eq!(queue.receive_for(0), Some(sent));
    }

    #[test]
    fn registry_name_is_recorded() {
        let queue = Queue::<u32>::with_registry_name(4, "telemetry");
        assert_eq!(queue.name(), Some("telemetry"));
        assert_eq!(
            sim::queue_registry_name(queue.handle).as_deref(),
            Some("telemetry")
        );
        let anonymous = Queue::<u32>::new(4);
        assert_eq!(anonymous.name(), None);
        assert_eq!(sim::queue_registry_name(anonymous.handle), None);
    }

    #[test]
    fn default_block_times_are_configurable() {
        let queue = Queue::<u32>::new(1);
        assert_eq!(queue.default_send_block_time(), 0);
        assert_eq!(queue.default_receive_block_time(), MAX_DELAY);
        queue.set_default_send_block_time(5);
        queue.set_default_receive_block_time(5);
        assert_eq!(queue.default_send_block_time(), 5);
        assert_eq!(queue.default_receive_block_time(), 5);
        // Bare receive now times out instead of sleeping forever
        assert_eq!(queue.receive(), None);
    }
}

// End of File
