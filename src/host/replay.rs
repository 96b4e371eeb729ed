//! In-memory collaborator implementations for replay and tests.
//!
//! [`ReplayInspector`] is a scriptable stand-in for the instrumentation host:
//! the replay driver advances its instruction counter and privilege flag from
//! the event stream, and tests pre-load translation holes, process tables,
//! and handle→path bindings. [`InMemoryTaint`] is a direct map-backed taint
//! engine with the same label-set semantics as the real one.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::types::{AddressSpaceId, Handle, Label, ProcessRecord};

use super::{GuestInspector, TaintEngine};

/// Scriptable guest view backed by plain maps.
///
/// Translation is identity (`vaddr == paddr`) except for addresses poked into
/// the unmapped set, which mirrors how translation failures surface in a real
/// guest without needing a page-table model.
#[derive(Debug, Default)]
pub struct ReplayInspector {
    instruction_count: u64,
    in_kernel: bool,
    unmapped: HashSet<u64>,
    processes: HashMap<AddressSpaceId, ProcessRecord>,
    handle_paths: HashMap<(u32, Handle), String>,
}

impl ReplayInspector {
    /// Creates an empty inspector at instruction zero, user mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reported instruction count.
    pub fn set_instruction_count(&mut self, instr: u64) {
        self.instruction_count = instr;
    }

    /// Sets the reported privilege level.
    pub fn set_in_kernel(&mut self, in_kernel: bool) {
        self.in_kernel = in_kernel;
    }

    /// Marks a single virtual address as unmapped (translation will fail).
    pub fn poke_unmapped(&mut self, vaddr: u64) {
        self.unmapped.insert(vaddr);
    }

    /// Installs the process record introspection will report for `asid`.
    pub fn set_process(&mut self, asid: AddressSpaceId, record: ProcessRecord) {
        self.processes.insert(asid, record);
    }

    /// Binds a path to a handle within the process identified by `pid`.
    pub fn bind_handle_path(&mut self, pid: u32, handle: Handle, path: impl Into<String>) {
        self.handle_paths.insert((pid, handle), path.into());
    }
}

impl GuestInspector for ReplayInspector {
    fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    fn in_kernel(&self) -> bool {
        self.in_kernel
    }

    fn virt_to_phys(&self, _asid: AddressSpaceId, vaddr: u64) -> Option<u64> {
        if self.unmapped.contains(&vaddr) {
            None
        } else {
            Some(vaddr)
        }
    }

    fn current_process(&self, asid: AddressSpaceId) -> Option<ProcessRecord> {
        self.processes.get(&asid).cloned()
    }

    fn handle_path(&self, process: &ProcessRecord, handle: Handle) -> Option<String> {
        self.handle_paths.get(&(process.pid, handle)).cloned()
    }
}

/// Map-backed taint engine.
///
/// Stores the label set per physical byte. Inactive until [`enable`] is
/// called; labeling before that point is silently dropped, matching the real
/// engine's behavior of only tracking while running.
///
/// [`enable`]: TaintEngine::enable
#[derive(Debug, Default)]
pub struct InMemoryTaint {
    active: bool,
    labels: HashMap<u64, BTreeSet<Label>>,
}

impl InMemoryTaint {
    /// Creates an inactive engine with no labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical bytes carrying at least one label.
    pub fn labeled_bytes(&self) -> usize {
        self.labels.len()
    }
}

impl TaintEngine for InMemoryTaint {
    fn is_active(&self) -> bool {
        self.active
    }

    fn enable(&mut self) {
        self.active = true;
    }

    fn label_byte(&mut self, paddr: u64, label: Label) {
        if self.active {
            self.labels.entry(paddr).or_default().insert(label);
        }
    }

    fn query_byte(&self, paddr: u64) -> BTreeSet<Label> {
        if !self.active {
            return BTreeSet::new();
        }
        self.labels.get(&paddr).cloned().unwrap_or_default()
    }
}
