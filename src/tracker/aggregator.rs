//! Per-sink provenance evidence, accumulated until shutdown.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::types::{Label, Target};

use super::catalog::TargetCatalog;
use super::taint::LabelMap;

/// Evidence accumulated for one sink.
#[derive(Debug, Default, Clone)]
struct SinkEvidence {
    tainted_bytes: u64,
    sources: BTreeSet<Label>,
}

/// Monotonic accumulator of which sources reached which sinks.
///
/// Evidence only ever grows; nothing is retracted. Read once at teardown via
/// [`DependencyAggregator::summary`].
#[derive(Debug, Default)]
pub struct DependencyAggregator {
    saw_source_read: bool,
    saw_sink_write: bool,
    evidence: BTreeMap<usize, SinkEvidence>,
}

impl DependencyAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks that a read from some catalogued source was observed.
    pub fn note_source_read(&mut self) {
        self.saw_source_read = true;
    }

    /// Marks that a write to the given catalogued sink was observed.
    pub fn note_sink_write(&mut self, sink_index: usize) {
        self.saw_sink_write = true;
        self.evidence.entry(sink_index).or_default();
    }

    /// Folds one write's query result into the sink's evidence.
    ///
    /// Every offset carrying a non-empty label set contributes its labels to
    /// the sink's source set and one byte to its tainted-byte count.
    pub fn record(&mut self, sink_index: usize, labels: &LabelMap) {
        let evidence = self.evidence.entry(sink_index).or_default();
        for set in labels.values() {
            if set.is_empty() {
                continue;
            }
            evidence.tainted_bytes = evidence.tainted_bytes.saturating_add(1);
            evidence.sources.extend(set.iter().copied());
        }
    }

    /// Whether any sink has at least one contributing source.
    pub fn dependency_found(&self) -> bool {
        self.evidence.values().any(|e| !e.sources.is_empty())
    }

    /// Builds the final report, joining evidence with catalog targets.
    pub fn summary(&self, catalog: &TargetCatalog) -> FlowSummary {
        let sinks = self
            .evidence
            .iter()
            .map(|(&index, evidence)| SinkReport {
                index,
                target: catalog.sinks().get(index).map(|s| s.target.clone()),
                tainted_bytes: evidence.tainted_bytes,
                sources: evidence
                    .sources
                    .iter()
                    .map(|&label| SourceRef {
                        index: label,
                        target: usize::try_from(label)
                            .ok()
                            .and_then(|i| catalog.sources().get(i))
                            .map(|s| s.target.clone()),
                    })
                    .collect(),
            })
            .collect();

        FlowSummary {
            saw_source_read: self.saw_source_read,
            saw_sink_write: self.saw_sink_write,
            dependency: self.dependency_found(),
            sinks,
        }
    }
}

/// One contributing source in a sink report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    /// Source catalog index (equal to its taint label).
    pub index: Label,
    /// The source's endpoint, when the index is still in catalog range.
    pub target: Option<Target>,
}

/// Final evidence for one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    /// Sink catalog index.
    pub index: usize,
    /// The sink's endpoint, when the index is still in catalog range.
    pub target: Option<Target>,
    /// Number of tainted bytes observed across all writes to this sink.
    pub tainted_bytes: u64,
    /// Sources whose bytes ever reached this sink.
    pub sources: Vec<SourceRef>,
}

/// The tracker's sole externally meaningful output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowSummary {
    /// A read from some catalogued source was observed.
    pub saw_source_read: bool,
    /// A write to some catalogued sink was observed.
    pub saw_sink_write: bool,
    /// Some sink received at least one byte traceable to a source.
    pub dependency: bool,
    /// Per-sink breakdown, in sink-index order.
    pub sinks: Vec<SinkReport>,
}

impl FlowSummary {
    /// Renders the human-readable shutdown report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("saw read of source?  {}\n", self.saw_source_read));
        out.push_str(&format!("saw write of sink?   {}\n", self.saw_sink_write));
        out.push_str(&format!("dependency found?    {}\n", self.dependency));
        for sink in &self.sinks {
            let name = sink
                .target
                .as_ref()
                .map_or_else(|| format!("sink #{}", sink.index), ToString::to_string);
            out.push_str(&format!(
                "  {name}: {} tainted bytes from {} source(s)\n",
                sink.tainted_bytes,
                sink.sources.len()
            ));
            for source in &sink.sources {
                let sname = source
                    .target
                    .as_ref()
                    .map_or_else(|| format!("source #{}", source.index), ToString::to_string);
                out.push_str(&format!("    <- {sname}\n"));
            }
        }
        out
    }
}
