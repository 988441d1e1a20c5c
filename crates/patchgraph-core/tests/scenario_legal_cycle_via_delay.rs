//! A structural cycle routed entirely through a `Delay` (a stateful
//! boundary) is legal: `Delay`'s output is last tick's state, never its own
//! current-tick input, so the three-phase SCC lowering can resolve it.

mod common;

use patchgraph_core::bind::BoundStep;
use patchgraph_core::compile;
use patchgraph_core::ids::StableStateId;
use patchgraph_core::ir::{OpCode, ValueExpr};
use patchgraph_core::schedule::StateMapping;

#[test]
fn accumulator_cycle_through_delay_compiles() {
    let registry = common::registry();
    let patch = common::patch(
        vec![common::time_root("t0"), common::const_float("step", 1.0), common::binary_op("sum", "Add"), common::delay("d0", 0.0)],
        vec![
            common::edge("e0", "d0", "out", "sum", "a"),
            common::edge("e1", "step", "out", "sum", "b"),
            common::edge("e2", "sum", "out", "d0", "in"),
        ],
    );

    let outcome = compile(&patch, &registry, 1);
    assert!(outcome.diagnostics.is_empty(), "a cycle through a stateful Delay must be legal: {:?}", outcome.diagnostics);

    let program = outcome.program.expect("compile should succeed");
    assert!(program.check_invariants().is_empty());
    assert_eq!(program.schedule.state_slot_count, 1);

    match &program.schedule.state_mappings[0] {
        StateMapping::Primitive { key, .. } => assert_eq!(*key, StableStateId::new("d0", "prev")),
        StateMapping::Field { .. } => panic!("delay state should be primitive"),
    }

    let state_write_value = program
        .schedule
        .steps
        .iter()
        .find_map(|s| match &s.step {
            BoundStep::StateWrite { value, .. } => Some(*value),
            _ => None,
        })
        .expect("exactly one StateWrite step for the delay");

    // The re-lowered delay's write must reference the real sum, not the
    // phase-1 bootstrap placeholder: an `Op(Add, ...)` whose operands are a
    // `StateRead` (the delay's own prior value) and the step constant.
    match &program.value_exprs.nodes[state_write_value.0 as usize] {
        ValueExpr::Op(OpCode::Add, inputs, _) => {
            assert_eq!(inputs.len(), 2);
            let has_state_read = inputs
                .iter()
                .any(|id| matches!(program.value_exprs.nodes[id.0 as usize], ValueExpr::StateRead(..)));
            assert!(has_state_read, "the accumulator's sum must read the delay's own prior state");
        }
        other => panic!("expected the delay's write to be the real sum expression, got {other:?}"),
    }
}
