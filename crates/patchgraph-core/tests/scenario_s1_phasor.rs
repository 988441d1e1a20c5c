//! Scenario S1: a `Phasor` driven by a constant frequency compiles to one
//! state slot and a `wrap01(prev + freq*dt/1000)` state-write step.

mod common;

use patchgraph_core::bind::BoundStep;
use patchgraph_core::compile;
use patchgraph_core::ids::StableStateId;
use patchgraph_core::ir::{OpCode, ValueExpr};
use patchgraph_core::schedule::StateMapping;
use patchgraph_core::Engine;

#[test]
fn phasor_compiles_with_one_state_slot_and_wrap01_step() {
    let registry = common::registry();
    let patch = common::patch(
        vec![common::time_root("t0"), common::const_float("freq", 2.0), common::phasor("p0", 0.0)],
        vec![common::edge("e0", "freq", "out", "p0", "freq")],
    );

    let outcome = compile(&patch, &registry, 1);
    assert!(outcome.diagnostics.is_empty(), "unexpected diagnostics: {:?}", outcome.diagnostics);

    let program = outcome.program.expect("compile should succeed");
    assert!(program.check_invariants().is_empty());
    assert_eq!(program.schedule.state_slot_count, 1);
    assert_eq!(program.schedule.state_mappings.len(), 1);

    match &program.schedule.state_mappings[0] {
        StateMapping::Primitive { key, .. } => assert_eq!(*key, StableStateId::new("p0", "phase")),
        StateMapping::Field { .. } => panic!("phase state should be primitive, not per-lane"),
    }

    let state_write = program
        .schedule
        .steps
        .iter()
        .find_map(|s| match &s.step {
            BoundStep::StateWrite { value, .. } => Some(*value),
            _ => None,
        })
        .expect("exactly one StateWrite step");

    match &program.value_exprs.nodes[state_write.0 as usize] {
        ValueExpr::Op(OpCode::Wrap01, inputs, _) => assert_eq!(inputs.len(), 1),
        other => panic!("expected the phase write to wrap01 its sum, got {other:?}"),
    }
}

#[test]
fn engine_has_no_active_diagnostics_for_a_clean_graph() {
    let registry = common::registry();
    let patch = common::patch(
        vec![common::time_root("t0"), common::const_float("freq", 2.0), common::phasor("p0", 0.0)],
        vec![common::edge("e0", "freq", "out", "p0", "freq")],
    );

    let mut engine = Engine::new(registry, patchgraph_core::schedule::TimeModel::default());
    engine.graph_committed(&patch);
    let outcome = engine.compile(&patch, 1);
    assert!(outcome.diagnostics.is_empty());
    assert!(engine.hub().get_active().is_empty());
}
