//! Contains the [`InterruptContext`] token

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Proof that the caller is executing inside an interrupt handler
///
/// Every `*_from_isr` operation in this crate demands a reference to one of
/// these, so the interrupt-safe, never-blocking operation set is a visibly
/// separate API: task code without a token cannot call it by accident, and
/// none of its operations accepts a wait argument. The blocking operations
/// take no token and must never be reached from an interrupt handler.
///
/// The token is zero-sized and free to construct; the cost is the `unsafe`
/// claim at the top of the handler:
///
/// ```ignore
/// extern "C" fn uart_irq() {
///     // SAFETY: this function is only ever invoked as an interrupt handler
///     let isr = unsafe { InterruptContext::new() };
///     RX_QUEUE.send_to_back_from_isr(read_byte(), &isr);
/// }
/// ```
pub struct InterruptContext {
    _not_send: core::marker::PhantomData<*mut ()>,
}

impl InterruptContext {
    /// Assert that we are running in interrupt context
    ///
    /// # Safety
    ///
    /// The caller must genuinely be inside an interrupt handler, and the
    /// token must not outlive that handler invocation. Using it from task
    /// context routes non-blocking kernel calls through interrupt entry
    /// points, which the kernel does not defend against.
    #[must_use]
    pub unsafe fn new() -> InterruptContext {
        InterruptContext {
            _not_send: core::marker::PhantomData,
        }
    }
}

// End of File
