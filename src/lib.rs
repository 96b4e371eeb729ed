//! Taintflow: whole-system dynamic information-flow tracking core.
//!
//! Observes a guest program's I/O at the system-call boundary and decides
//! whether bytes read from configured *source* endpoints ever reach
//! configured *sink* endpoints, using byte-granularity taint labels supplied
//! by an external instrumentation engine.
//!
//! The crate is the decision core only: handle classification, source/sink
//! matching, lazy taint activation, label/query policy, and per-sink
//! provenance evidence. Guest execution, address translation, and the taint
//! engine itself are external collaborators behind the [`host`] traits.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod host;
pub mod logging;
pub mod trace;
pub mod tracker;
pub mod types;
