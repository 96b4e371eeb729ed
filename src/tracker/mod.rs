//! The taint-decision engine.
//!
//! One [`Tracker`] instance is created at startup and driven synchronously by
//! the instrumentation host's callbacks: system-call returns, block-translate
//! boundaries, and block-execute boundaries. Handlers run to completion
//! before the guest resumes, so the tracker holds all state without locking.
//!
//! The flow per event is: resolve the handle to a stable endpoint, classify
//! it against the catalogs, then either label the touched bytes (source
//! read), query them and bank the evidence (sink write), or drop the event
//! (the overwhelmingly common case).

pub mod aggregator;
pub mod catalog;
pub mod gate;
pub mod resolver;
pub mod taint;

use tracing::{debug, info};

pub use aggregator::{DependencyAggregator, FlowSummary, SinkReport, SourceRef};
pub use catalog::{Classification, TargetCatalog};
pub use gate::TaintGate;
pub use resolver::{HandleResolver, ResolveError};

use crate::host::{GuestInspector, TaintEngine};
use crate::types::{AddressSpaceId, Handle, Label, Target};

/// Which resolver strategy an event is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    /// Socket-only calls (send/recv): network table only.
    Network,
    /// Generic read/write: network table first, file introspection fallback.
    Any,
}

/// The tracker context: catalogs, resolver tables, gate, and evidence.
///
/// Owns its two collaborators for the lifetime of the run. Initialize once,
/// feed events, then read the [`FlowSummary`] at teardown.
pub struct Tracker<G, T> {
    guest: G,
    engine: T,
    catalog: TargetCatalog,
    resolver: HandleResolver,
    gate: TaintGate,
    aggregator: DependencyAggregator,
}

impl<G: GuestInspector, T: TaintEngine> Tracker<G, T> {
    /// Creates a tracker over the given catalogs and collaborators.
    pub fn new(catalog: TargetCatalog, guest: G, engine: T) -> Self {
        Self {
            guest,
            engine,
            catalog,
            resolver: HandleResolver::new(),
            gate: TaintGate::new(),
            aggregator: DependencyAggregator::new(),
        }
    }

    /// Block-translate boundary: sample the instruction counter.
    ///
    /// This is where deferred taint activation actually happens.
    pub fn on_block_translate(&mut self, instr: u64) {
        self.gate.observe_instruction_count(instr, &mut self.engine);
    }

    /// Block-execute boundary: refresh process metadata.
    ///
    /// Only acted on while the guest runs privileged; user-mode samples carry
    /// no usable process state.
    pub fn on_block_execute(&mut self, asid: AddressSpaceId) {
        if !self.guest.in_kernel() {
            return;
        }
        if let Some(record) = self.guest.current_process(asid) {
            self.resolver.update_process(asid, record);
        }
    }

    /// Connect-system-call return.
    ///
    /// Learns the (address space, handle) → endpoint binding and, when the
    /// endpoint is catalogued in either direction, arms the taint gate at the
    /// current instruction count: a tracked read or write on this handle is
    /// now imminent.
    pub fn on_connect_return(&mut self, asid: AddressSpaceId, handle: Handle, sockaddr: &[u8]) {
        let Some(target) = self.resolver.record_connect(asid, handle, sockaddr) else {
            return;
        };
        debug!(%asid, %handle, %target, "connect");

        match self.catalog.classify(&target) {
            Classification::Source(index) => {
                info!(%target, index, "saw connect to source target");
                self.gate.arm(self.guest.instruction_count());
            }
            Classification::Sink(index) => {
                info!(%target, index, "saw connect to sink target");
                self.gate.arm(self.guest.instruction_count());
            }
            Classification::Neither => {}
        }
    }

    /// Generic read return (`read` and positioned `pread` are unified).
    pub fn on_read_return(&mut self, asid: AddressSpaceId, handle: Handle, buf: u64, len: u64) {
        self.handle_read(Endpoint::Any, asid, handle, buf, len);
    }

    /// Positioned read return. The file offset does not affect taint
    /// decisions; only the memory range matters.
    pub fn on_pread_return(
        &mut self,
        asid: AddressSpaceId,
        handle: Handle,
        buf: u64,
        len: u64,
        _offset: u64,
    ) {
        self.handle_read(Endpoint::Any, asid, handle, buf, len);
    }

    /// Socket receive return: network handles only.
    pub fn on_recv_return(&mut self, asid: AddressSpaceId, handle: Handle, buf: u64, len: u64) {
        self.handle_read(Endpoint::Network, asid, handle, buf, len);
    }

    /// Generic write return (`write` and positioned `pwrite` are unified).
    pub fn on_write_return(&mut self, asid: AddressSpaceId, handle: Handle, buf: u64, len: u64) {
        self.handle_write(Endpoint::Any, asid, handle, buf, len);
    }

    /// Positioned write return.
    pub fn on_pwrite_return(
        &mut self,
        asid: AddressSpaceId,
        handle: Handle,
        buf: u64,
        len: u64,
        _offset: u64,
    ) {
        self.handle_write(Endpoint::Any, asid, handle, buf, len);
    }

    /// Socket send return: network handles only.
    pub fn on_send_return(&mut self, asid: AddressSpaceId, handle: Handle, buf: u64, len: u64) {
        self.handle_write(Endpoint::Network, asid, handle, buf, len);
    }

    /// The final report. Call at host teardown.
    pub fn summary(&self) -> FlowSummary {
        self.aggregator.summary(&self.catalog)
    }

    /// The loaded catalogs.
    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// The guest view, for drivers that advance replayed host state.
    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.guest
    }

    /// The taint engine.
    pub fn engine(&self) -> &T {
        &self.engine
    }

    fn resolve(
        &self,
        endpoint: Endpoint,
        asid: AddressSpaceId,
        handle: Handle,
    ) -> Result<Target, ResolveError> {
        match endpoint {
            Endpoint::Network => self
                .resolver
                .network_target(asid, handle)
                .ok_or(ResolveError::UnknownHandle { asid, handle }),
            Endpoint::Any => self.resolver.any_target(&self.guest, asid, handle),
        }
    }

    fn handle_read(
        &mut self,
        endpoint: Endpoint,
        asid: AddressSpaceId,
        handle: Handle,
        buf: u64,
        len: u64,
    ) {
        let target = match self.resolve(endpoint, asid, handle) {
            Ok(target) => target,
            Err(e) => {
                debug!(%asid, %handle, error = %e, "read on unresolved handle, dropped");
                return;
            }
        };

        let Some(index) = self.catalog.source_index(&target) else {
            debug!(%asid, %handle, %target, "read of untracked endpoint");
            return;
        };

        info!(%target, index, "saw read of source target");
        self.aggregator.note_source_read();
        #[allow(clippy::cast_possible_truncation)]
        let label = index as Label;
        taint::label_range(&self.guest, &mut self.engine, asid, buf, len, label);
    }

    fn handle_write(
        &mut self,
        endpoint: Endpoint,
        asid: AddressSpaceId,
        handle: Handle,
        buf: u64,
        len: u64,
    ) {
        let target = match self.resolve(endpoint, asid, handle) {
            Ok(target) => target,
            Err(e) => {
                debug!(%asid, %handle, error = %e, "write on unresolved handle, dropped");
                return;
            }
        };

        let Some(index) = self.catalog.sink_index(&target) else {
            debug!(%asid, %handle, %target, "write to untracked endpoint");
            return;
        };

        info!(%target, index, "saw write of sink target");
        self.aggregator.note_sink_write(index);
        let labels = taint::query_range(&self.guest, &self.engine, asid, buf, len);
        let tainted = labels.values().filter(|set| !set.is_empty()).count();
        if tainted > 0 {
            info!(%target, tainted, "tainted bytes written to sink");
        }
        self.aggregator.record(index, &labels);
    }
}
