//! The fixed capability set this crate requires of the kernel
//!
//! Exactly one backend is compiled in. The default `sim` feature selects a
//! deterministic simulated kernel so the crate builds and tests on any host;
//! with the feature disabled the capability calls resolve to the C-ABI port
//! shim (`leash_port_*` symbols) that an integrator implements over the real
//! kernel.
//!
//! Every backend exposes the same function set: create/delete per entity
//! kind, take/give and their interrupt-context variants, queue send/receive
//! in both positions, timer command submission, scheduler control, and tick
//! sampling. Wrapper modules call these functions and nothing else.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(feature = "sim")]
pub(crate) mod sim;

#[cfg(feature = "sim")]
pub(crate) use sim::*;

#[cfg(not(feature = "sim"))]
mod ffi;

#[cfg(not(feature = "sim"))]
pub(crate) use ffi::*;

use crate::task::TaskState;

/// Opaque kernel handle for a task
///
/// Owned by a [`Task`](crate::Task); copies of the raw handle are identity
/// tokens for comparison and display, never for lifetime management.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct RawTaskHandle(pub(crate) TaskRef);

/// Opaque kernel handle for a software timer
///
/// Passed to timer callbacks so they can tell which timer expired.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct RawTimerHandle(pub(crate) TimerRef);

// SAFETY: a raw handle is an opaque token. Nothing on this side of the port
// ever dereferences it; the kernel guards its own control blocks with
// critical sections.
unsafe impl Send for RawTaskHandle {}
unsafe impl Sync for RawTaskHandle {}
unsafe impl Send for RawTimerHandle {}
unsafe impl Sync for RawTimerHandle {}

/// Where a queue send places the item
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum QueuePosition {
    Back,
    Front,
}

/// One task status snapshot as the kernel reports it
///
/// `state` is `None` when the caller skipped the (slow) scheduler-level
/// state lookup.
pub(crate) struct RawTaskInfo {
    pub(crate) priority: u32,
    pub(crate) state: Option<TaskState>,
    pub(crate) free_stack_words: u32,
}

// End of File
