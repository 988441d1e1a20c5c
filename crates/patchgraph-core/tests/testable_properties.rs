//! Cross-cutting testable properties that aren't tied to one scenario:
//! determinism across repeated compiles, and diagnostic-id stability.

mod common;

use patchgraph_core::compile;
use patchgraph_core::errors::{generate_diagnostic_id, DiagnosticCode, TargetRef};

fn accumulator_patch() -> patchgraph_core::Patch {
    common::patch(
        vec![common::time_root("t0"), common::const_float("step", 1.0), common::binary_op("sum", "Add"), common::delay("d0", 0.0)],
        vec![
            common::edge("e0", "d0", "out", "sum", "a"),
            common::edge("e1", "step", "out", "sum", "b"),
            common::edge("e2", "sum", "out", "d0", "in"),
        ],
    )
}

#[test]
fn compiling_the_same_patch_twice_is_bit_for_bit_identical() {
    let registry = common::registry();
    let patch = accumulator_patch();

    let a = compile(&patch, &registry, 1).program.expect("first compile should succeed");
    let b = compile(&patch, &registry, 1).program.expect("second compile should succeed");

    assert_eq!(a.value_exprs.nodes, b.value_exprs.nodes);
    assert_eq!(a.schedule.steps, b.schedule.steps);
    assert_eq!(a.schedule.instances, b.schedule.instances);
    assert_eq!(a.schedule.state_mappings, b.schedule.state_mappings);
    assert_eq!(a.schedule.state_slot_count, b.schedule.state_slot_count);
    assert_eq!(a.slot_meta, b.slot_meta);
}

#[test]
fn diagnostic_ids_are_stable_and_revision_sensitive() {
    let target = TargetRef::Block { block: patchgraph_core::ids::BlockId("b0".to_owned()) };
    let first = generate_diagnostic_id(DiagnosticCode::EUnitMismatch, &target, 1, None);
    let again = generate_diagnostic_id(DiagnosticCode::EUnitMismatch, &target, 1, None);
    assert_eq!(first, again);

    let next_revision = generate_diagnostic_id(DiagnosticCode::EUnitMismatch, &target, 2, None);
    assert_ne!(first, next_revision);
}

#[test]
fn graph_span_target_ids_are_independent_of_block_order() {
    let forward = TargetRef::GraphSpan {
        block_ids: vec![patchgraph_core::ids::BlockId("a".to_owned()), patchgraph_core::ids::BlockId("b".to_owned())],
        span_kind: Some("cycle".to_owned()),
    };
    let reversed = TargetRef::GraphSpan {
        block_ids: vec![patchgraph_core::ids::BlockId("b".to_owned()), patchgraph_core::ids::BlockId("a".to_owned())],
        span_kind: Some("cycle".to_owned()),
    };
    assert_eq!(forward.canonical_str(), reversed.canonical_str());
}

#[test]
fn missing_required_input_is_reported_per_port() {
    let registry = common::registry();
    let patch = common::patch(
        vec![common::time_root("t0"), common::binary_op("orphan", "Add")],
        vec![],
    );

    let outcome = compile(&patch, &registry, 1);
    assert!(outcome.program.is_none());
    let missing: Vec<_> = outcome.diagnostics.iter().filter(|d| d.code == DiagnosticCode::EMissingInput).collect();
    assert_eq!(missing.len(), 2, "both unconnected Add inputs should each be reported");
}
