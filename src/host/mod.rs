//! Interfaces to the external collaborators the tracker runs against.
//!
//! The tracker core never talks to a real guest. Everything it needs from
//! the outside world (instruction counts, address translation, process
//! introspection, and the taint engine itself) comes in through the two
//! traits defined here. The instrumentation host provides production
//! implementations; [`replay`] provides in-memory ones for the replay driver
//! and the test suite.

pub mod replay;

use std::collections::BTreeSet;

use crate::types::{AddressSpaceId, Handle, Label, ProcessRecord};

/// View into the running guest supplied by the instrumentation host.
///
/// All methods are non-blocking and may be called from any event handler.
/// `None` returns mean "not resolvable right now" and are expected on hot
/// paths; they are never fatal.
pub trait GuestInspector {
    /// Number of guest instructions executed so far.
    fn instruction_count(&self) -> u64;

    /// Whether the guest is currently executing in kernel mode.
    fn in_kernel(&self) -> bool;

    /// Translates a guest virtual address to a physical address.
    ///
    /// Returns `None` when the page is not mapped; the caller skips that
    /// byte and keeps going.
    fn virt_to_phys(&self, asid: AddressSpaceId, vaddr: u64) -> Option<u64>;

    /// Latest process metadata for the given address space, if known.
    fn current_process(&self, asid: AddressSpaceId) -> Option<ProcessRecord>;

    /// Path currently bound to `handle` inside the given process.
    fn handle_path(&self, process: &ProcessRecord, handle: Handle) -> Option<String>;
}

/// Byte-granularity taint engine consumed by the tracker.
///
/// The tracker only ever enables the engine (never disables it) and only
/// labels/queries single physical bytes; range iteration and all activation
/// policy live on the tracker side.
pub trait TaintEngine {
    /// Whether taint propagation is currently running.
    fn is_active(&self) -> bool;

    /// Turns taint propagation on. Idempotent.
    fn enable(&mut self);

    /// Attaches `label` to the byte at the given physical address.
    fn label_byte(&mut self, paddr: u64, label: Label);

    /// Labels currently attached to the byte at the given physical address.
    ///
    /// Returns the empty set for untainted bytes.
    fn query_byte(&self, paddr: u64) -> BTreeSet<Label>;
}
