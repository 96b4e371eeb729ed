//! Range-level policy over the byte-granularity taint engine.
//!
//! The tracker only ever touches the engine through the two operations here.
//! Both iterate a guest virtual range byte by byte, translating each address
//! individually: buffers regularly straddle unmapped pages, and a failed
//! translation skips that single byte rather than aborting the range.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::host::{GuestInspector, TaintEngine};
use crate::types::{AddressSpaceId, Label};

/// Per-offset label sets produced by a range query.
///
/// Keys are byte offsets into the queried range. Offsets whose translation
/// failed are absent, not present with an empty set.
pub type LabelMap = BTreeMap<u64, BTreeSet<Label>>;

/// Labels every translatable byte of `[vaddr, vaddr + len)` with `label`.
///
/// No-op while the engine is inactive. Returns the number of bytes actually
/// labeled.
pub fn label_range(
    guest: &dyn GuestInspector,
    engine: &mut dyn TaintEngine,
    asid: AddressSpaceId,
    vaddr: u64,
    len: u64,
    label: Label,
) -> usize {
    if !engine.is_active() {
        return 0;
    }

    let mut labeled = 0usize;
    for i in 0..len {
        let addr = vaddr.saturating_add(i);
        match guest.virt_to_phys(asid, addr) {
            Some(paddr) => {
                engine.label_byte(paddr, label);
                labeled = labeled.saturating_add(1);
            }
            None => trace!(vaddr = addr, "translation failed, byte not labeled"),
        }
    }

    debug!(vaddr, len, label, labeled, "labeled buffer range");
    labeled
}

/// Queries the label set of every translatable byte of `[vaddr, vaddr + len)`.
///
/// Empty map while the engine is inactive. Untainted but translatable bytes
/// appear with an empty set; untranslatable bytes are omitted entirely.
pub fn query_range(
    guest: &dyn GuestInspector,
    engine: &dyn TaintEngine,
    asid: AddressSpaceId,
    vaddr: u64,
    len: u64,
) -> LabelMap {
    let mut map = LabelMap::new();
    if !engine.is_active() {
        return map;
    }

    for i in 0..len {
        let addr = vaddr.saturating_add(i);
        match guest.virt_to_phys(asid, addr) {
            Some(paddr) => {
                map.insert(i, engine.query_byte(paddr));
            }
            None => trace!(vaddr = addr, "translation failed, byte not queried"),
        }
    }

    debug!(vaddr, len, queried = map.len(), "queried buffer range");
    map
}
