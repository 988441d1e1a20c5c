//! Scenario S3: two `Add` blocks wired into a cycle, neither stateful,
//! is rejected with `E_CYCLE_DETECTED` rather than silently accepted.

mod common;

use patchgraph_core::compile;
use patchgraph_core::errors::{DiagnosticCode, TargetRef};
use patchgraph_core::ids::BlockId;

#[test]
fn pure_cycle_is_rejected() {
    let registry = common::registry();
    let patch = common::patch(
        vec![
            common::time_root("t0"),
            common::const_float("c1", 1.0),
            common::const_float("c2", 2.0),
            common::binary_op("a", "Add"),
            common::binary_op("b", "Add"),
        ],
        vec![
            common::edge("e1", "c1", "out", "a", "b"),
            common::edge("e2", "c2", "out", "b", "b"),
            common::edge("e3", "a", "out", "b", "a"),
            common::edge("e4", "b", "out", "a", "a"),
        ],
    );

    let outcome = compile(&patch, &registry, 1);
    assert!(outcome.program.is_none());

    let cycle_diag = outcome
        .diagnostics
        .iter()
        .find(|d| d.code == DiagnosticCode::ECycleDetected)
        .expect("a cycle diagnostic should be present");

    match &cycle_diag.primary_target {
        TargetRef::GraphSpan { block_ids, span_kind } => {
            let mut ids = block_ids.clone();
            ids.sort();
            assert_eq!(ids, vec![BlockId("a".to_owned()), BlockId("b".to_owned())]);
            assert_eq!(span_kind.as_deref(), Some("cycle"));
        }
        other => panic!("expected a graphSpan target, got {other:?}"),
    }
}
