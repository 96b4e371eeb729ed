//! Source/sink catalogs and target classification.

use serde::Serialize;

use crate::types::{Sink, Source, Target};

/// How a target relates to the configured catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    /// Matches the source catalog at the given index.
    Source(usize),
    /// Matches the sink catalog at the given index.
    Sink(usize),
    /// Matches neither catalog; the common case for most guest I/O.
    Neither,
}

/// The configured sources and sinks, fixed after load.
///
/// Catalogs are expected to stay small (tens of entries), so lookups are
/// ordered linear scans and the first matching entry wins.
#[derive(Debug, Default)]
pub struct TargetCatalog {
    sources: Vec<Source>,
    sinks: Vec<Sink>,
}

impl TargetCatalog {
    /// Builds the catalogs, assigning zero-based indices in load order.
    ///
    /// The source index is the taint label used for bytes read from that
    /// source, so index assignment must be stable for the process lifetime.
    pub fn load(sources: Vec<Target>, sinks: Vec<Target>) -> Self {
        let sources = sources
            .into_iter()
            .enumerate()
            .map(|(index, target)| Source { target, index })
            .collect();
        let sinks = sinks
            .into_iter()
            .enumerate()
            .map(|(index, target)| Sink { target, index })
            .collect();
        Self { sources, sinks }
    }

    /// Classifies a target against both catalogs.
    ///
    /// Sources are probed before sinks, so a target present in both catalogs
    /// classifies as a source. That precedence is load-bearing for callers
    /// that branch on the result and is pinned by a regression test.
    pub fn classify(&self, target: &Target) -> Classification {
        if let Some(index) = self.source_index(target) {
            return Classification::Source(index);
        }
        if let Some(index) = self.sink_index(target) {
            return Classification::Sink(index);
        }
        Classification::Neither
    }

    /// Index of the first source entry equal to `target`, if any.
    pub fn source_index(&self, target: &Target) -> Option<usize> {
        self.sources
            .iter()
            .find(|s| s.target == *target)
            .map(|s| s.index)
    }

    /// Index of the first sink entry equal to `target`, if any.
    pub fn sink_index(&self, target: &Target) -> Option<usize> {
        self.sinks
            .iter()
            .find(|s| s.target == *target)
            .map(|s| s.index)
    }

    /// All configured sources, in index order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// All configured sinks, in index order.
    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// True when neither catalog has any entry.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.sinks.is_empty()
    }
}
