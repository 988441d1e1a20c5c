//! Scenario S2: a patch with no `InfiniteTimeRoot` block is blocked from
//! compiling and reports exactly one diagnostic for the attempted revision.

mod common;

use patchgraph_core::compile;
use patchgraph_core::errors::{DiagnosticCode, TargetRef};
use patchgraph_core::Engine;

#[test]
fn missing_time_root_blocks_compile_with_a_single_diagnostic() {
    let registry = common::registry();
    let patch = common::patch(vec![common::const_float("freq", 2.0)], vec![]);

    let outcome = compile(&patch, &registry, 1);

    assert!(outcome.program.is_none());
    assert_eq!(outcome.diagnostics.len(), 1);
    let diag = &outcome.diagnostics[0];
    assert_eq!(diag.code, DiagnosticCode::ETimeRootMissing);
    assert_eq!(diag.primary_target, TargetRef::GraphSpan { block_ids: vec![], span_kind: None });
}

#[test]
fn engine_records_exactly_one_diagnostic_for_the_failed_revision() {
    let registry = common::registry();
    let patch = common::patch(vec![common::const_float("freq", 2.0)], vec![]);

    let mut engine = Engine::new(registry, patchgraph_core::schedule::TimeModel::default());
    engine.graph_committed(&patch);
    let outcome = engine.compile(&patch, 1);
    assert!(outcome.program.is_none());

    let recorded = engine.hub().get_by_revision(1);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].code, DiagnosticCode::ETimeRootMissing);
}
