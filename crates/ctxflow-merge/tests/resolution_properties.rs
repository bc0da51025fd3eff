//! Property tests for merge resolution

use ctxflow_merge::{BranchRecorder, MergeResolver};
use ctxflow_model::{EdgeKind, MergeKind, MergeStrategy, Realm, Snapshot, VariableRegistry};
use proptest::prelude::*;
use std::sync::Arc;

fn kind_strategy() -> impl Strategy<Value = EdgeKind> {
    prop_oneof![Just(EdgeKind::Solid), Just(EdgeKind::Dotted)]
}

proptest! {
    #[test]
    fn prop_source_graph_reads_first_solid(
        first in any::<i64>(),
        rest in proptest::collection::vec((kind_strategy(), any::<i64>()), 0..16)
    ) {
        let realm = Realm::bootstrapped(Arc::new(VariableRegistry::new()));
        let initial = realm.initial_snapshot().unwrap();
        let v = realm
            .registry()
            .declare_typed::<i64>("v", None, MergeStrategy::SourceGraph)
            .unwrap();
        let recorder = BranchRecorder::new();

        let token = recorder.record_branch(&v.derive(&initial, first), None, EdgeKind::Solid);
        for (kind, value) in rest {
            recorder.record_branch(&v.derive(&initial, value), Some(&token), kind);
        }

        let merged = MergeResolver::new(Arc::clone(&realm))
            .resolve(&token, MergeKind::ResolutionThenInvoke)
            .unwrap();
        prop_assert_eq!(v.get_cloned(&merged), Some(first));
    }

    #[test]
    fn prop_execution_flow_without_chains(
        edges in proptest::collection::vec((kind_strategy(), any::<i64>()), 1..16)
    ) {
        let realm = Realm::bootstrapped(Arc::new(VariableRegistry::new()));
        let initial = realm.initial_snapshot().unwrap();
        let v = realm
            .registry()
            .declare_typed::<i64>("v", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let recorder = BranchRecorder::new();

        let token = recorder.open();
        for (kind, value) in &edges {
            recorder.record_branch(&v.derive(&initial, *value), Some(&token), *kind);
        }

        let expected = edges
            .iter()
            .rev()
            .find(|(kind, _)| kind.is_solid())
            .or_else(|| edges.last())
            .map(|(_, value)| *value);

        let merged = MergeResolver::new(Arc::clone(&realm))
            .resolve(&token, MergeKind::TimerFire)
            .unwrap();
        prop_assert_eq!(v.get_cloned(&merged), expected);
    }

    #[test]
    fn prop_resolution_is_deterministic(
        edges in proptest::collection::vec((kind_strategy(), any::<i64>()), 0..12)
    ) {
        let realm = Realm::bootstrapped(Arc::new(VariableRegistry::new()));
        let initial = realm.initial_snapshot().unwrap();
        let flow = realm
            .registry()
            .declare_typed::<i64>("flow", None, MergeStrategy::ExecutionFlow)
            .unwrap();
        let graph = realm
            .registry()
            .declare_typed::<i64>("graph", None, MergeStrategy::SourceGraph)
            .unwrap();
        let recorder = BranchRecorder::new();
        let resolver = MergeResolver::new(Arc::clone(&realm));

        let snapshots: Vec<Snapshot> = edges
            .iter()
            .map(|(_, value)| graph.derive(&flow.derive(&initial, *value), value.wrapping_neg()))
            .collect();
        let build = || {
            let token = recorder.open();
            for ((kind, _), snapshot) in edges.iter().zip(&snapshots) {
                recorder.record_branch(snapshot, Some(&token), *kind);
            }
            token
        };

        let one = resolver.resolve(&build(), MergeKind::TimerFire).unwrap();
        let two = resolver.resolve(&build(), MergeKind::TimerFire).unwrap();
        prop_assert!(one.same_values(&two));
    }
}
