//! Lazy activation control for the taint engine.
//!
//! Running taint propagation for a whole execution is prohibitively
//! expensive, so the engine stays off until a connection to a catalogued
//! endpoint makes a tracked read/write imminent. Activation is then deferred
//! to the next block boundary rather than taking effect mid-block, trading a
//! small window of missed taint for throughput.

use tracing::info;

use crate::host::TaintEngine;

/// One-way activation threshold over the guest instruction counter.
///
/// `Inactive` until the first instruction-count sample strictly greater than
/// the armed threshold; `Active` forever after. Unarmed means never activate.
#[derive(Debug, Default)]
pub struct TaintGate {
    threshold: Option<u64>,
    active: bool,
}

impl TaintGate {
    /// Creates an unarmed, inactive gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the activation threshold.
    ///
    /// Only the most recent call has effect; arming is an overwrite, not an
    /// accumulation. Ignored once the gate is active.
    pub fn arm(&mut self, instr: u64) {
        if self.active {
            return;
        }
        self.threshold = Some(instr);
    }

    /// Feeds one instruction-count sample, taken at a block boundary.
    ///
    /// Enables `engine` exactly once, at the first sample exceeding the
    /// armed threshold. The engine is never disabled afterwards.
    pub fn observe_instruction_count(&mut self, instr: u64, engine: &mut dyn TaintEngine) {
        if self.active {
            return;
        }
        let Some(threshold) = self.threshold else {
            return;
        };
        if instr > threshold {
            info!(instr, threshold, "activating taint engine");
            engine.enable();
            self.active = true;
        }
    }

    /// Whether the gate has fired.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The currently armed threshold, if any.
    pub fn threshold(&self) -> Option<u64> {
        self.threshold
    }
}
