//! Scenario S5: a successful fast-path constant patch rewrites only the
//! targeted `Const` node, leaving the rest of the compiled program untouched.

mod common;

use patchgraph_core::fastpath::PatchChange;
use patchgraph_core::ir::{ConstValue, ValueExpr};
use patchgraph_core::schedule::TimeModel;
use patchgraph_core::Engine;

#[test]
fn patching_a_const_float_rewrites_only_that_node() {
    let registry = common::registry();
    let patch = common::patch(
        vec![common::time_root("t0"), common::const_float("FreqConst", 2.0), common::phasor("p0", 0.0)],
        vec![common::edge("e0", "FreqConst", "out", "p0", "freq")],
    );

    let mut engine = Engine::new(registry, TimeModel::default());
    engine.graph_committed(&patch);
    let outcome = engine.compile(&patch, 1);
    assert!(outcome.program.is_some());
    assert!(engine.swap(1, 0.0));

    let original = engine.active_program().expect("a program is active after swap").clone();

    let patched = engine
        .try_fast_patch(&[PatchChange::Constant { key: "FreqConst:value".to_owned(), raw: serde_json::json!(4.0) }])
        .expect("a leaf constant's value should fast-patch");

    assert_eq!(patched.value_exprs.nodes.len(), original.value_exprs.nodes.len());

    let mut changed_indices = Vec::new();
    for (idx, (before, after)) in original.value_exprs.nodes.iter().zip(patched.value_exprs.nodes.iter()).enumerate() {
        if before != after {
            changed_indices.push(idx);
        }
    }
    assert_eq!(changed_indices.len(), 1, "exactly one node should differ after the patch");
    match &patched.value_exprs.nodes[changed_indices[0]] {
        ValueExpr::Const(ConstValue::Float(v), _) => assert!((*v - 4.0).abs() < f64::EPSILON),
        other => panic!("expected the patched node to remain a float Const, got {other:?}"),
    }

    assert_eq!(patched.schedule.steps, original.schedule.steps);
    assert_eq!(patched.schedule.state_mappings, original.schedule.state_mappings);
    assert_eq!(patched.schedule.state_slot_count, original.schedule.state_slot_count);
    assert_eq!(patched.schedule.instances, original.schedule.instances);
}

#[test]
fn patching_an_undeclared_key_falls_back_to_full_recompile() {
    let registry = common::registry();
    let patch = common::patch(
        vec![common::time_root("t0"), common::const_float("FreqConst", 2.0), common::phasor("p0", 0.0)],
        vec![common::edge("e0", "FreqConst", "out", "p0", "freq")],
    );

    let mut engine = Engine::new(registry, TimeModel::default());
    engine.graph_committed(&patch);
    engine.compile(&patch, 1);
    assert!(engine.swap(1, 0.0));

    let result = engine.try_fast_patch(&[PatchChange::Constant { key: "NoSuchBlock:value".to_owned(), raw: serde_json::json!(1.0) }]);
    assert!(result.is_none());
}
