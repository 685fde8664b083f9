//! Search statistics and optional trace capture.

use serde::Serialize;

/// Outcome class of one candidate evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceReason {
    /// The candidate won its search round or was committed directly.
    Accepted,
    /// The probed output stopped being a prefix of the target.
    PrefixMismatch,
    /// The candidate reached a state already explored for this byte.
    RepeatedState,
    /// A known-dead candidate served entirely from the snapshot cache.
    CacheHit,
}

/// One record per candidate evaluation, captured when tracing is enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    /// Expansion depth; 0 for randomized-extension draws.
    pub depth: usize,
    pub parent_fingerprint: String,
    /// The construction symbol appended to the parent.
    pub symbol: char,
    pub reason: TraceReason,
    /// Output bytes accumulated by the evaluated state.
    pub output_length: usize,
    pub fingerprint: String,
}

/// Aggregate counters for one generation run.
///
/// `duration_ns` is the only field exempt from the determinism guarantee.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    /// Candidates materialized, including pruned ones.
    pub evaluations: u64,
    /// Snapshot cache hits across construction and probe steps.
    pub cache_hits: u64,
    /// Candidates rejected by the prefix or repeated-state rules.
    pub pruned: u64,
    /// Subset of `pruned` due to the repeated-state rule.
    pub repeated_state_pruned: u64,
    /// Wall clock from start to verified success.
    pub duration_ns: u128,
    /// Number of captured trace events (0 when tracing is off).
    pub trace_length: usize,
    pub pruned_ratio: f64,
    pub repeated_state_ratio: f64,
}

impl GenerationStats {
    /// Fills the derived fields once the search has finished.
    pub(crate) fn finalize(&mut self, duration_ns: u128, trace_length: usize) {
        self.duration_ns = duration_ns;
        self.trace_length = trace_length;
        let denominator = self.evaluations.max(1) as f64;
        self.pruned_ratio = self.pruned as f64 / denominator;
        self.repeated_state_ratio = self.repeated_state_pruned as f64 / denominator;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_computes_ratios() {
        let mut stats = GenerationStats {
            evaluations: 10,
            pruned: 8,
            repeated_state_pruned: 2,
            ..GenerationStats::default()
        };
        stats.finalize(1234, 10);

        assert_eq!(stats.duration_ns, 1234);
        assert_eq!(stats.trace_length, 10);
        assert!((stats.pruned_ratio - 0.8).abs() < f64::EPSILON);
        assert!((stats.repeated_state_ratio - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn finalize_handles_zero_evaluations() {
        let mut stats = GenerationStats::default();
        stats.finalize(1, 0);
        assert_eq!(stats.pruned_ratio, 0.0);
        assert_eq!(stats.repeated_state_ratio, 0.0);
    }

    #[test]
    fn stats_serialize_with_stable_field_names() {
        let stats = GenerationStats::default();
        let json = serde_json::to_value(&stats).unwrap();
        for field in [
            "evaluations",
            "cache_hits",
            "pruned",
            "repeated_state_pruned",
            "duration_ns",
            "trace_length",
            "pruned_ratio",
            "repeated_state_ratio",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn trace_reason_serializes_snake_case() {
        let json = serde_json::to_string(&TraceReason::PrefixMismatch).unwrap();
        assert_eq!(json, "\"prefix_mismatch\"");
    }
}
