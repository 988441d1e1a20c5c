//! Scenario S6: patching an `Array`'s instance count succeeds when no
//! per-lane field state references that instance, and is hard-gated to a
//! full recompile the moment one does.

mod common;

use patchgraph_core::fastpath::{patch_program_constants, PatchChange};
use patchgraph_core::ids::{StableStateId, StateSlot};
use patchgraph_core::ir::ConstValue;
use patchgraph_core::schedule::{StateMapping, TimeModel};
use patchgraph_core::Engine;

#[test]
fn instance_count_patch_succeeds_without_field_state() {
    let registry = common::registry();
    let patch = common::patch(vec![common::time_root("t0"), common::array("arr", 100, Some(200))], vec![]);

    let mut engine = Engine::new(registry, TimeModel::default());
    engine.graph_committed(&patch);
    let outcome = engine.compile(&patch, 1);
    assert!(outcome.program.is_some());
    assert!(engine.swap(1, 0.0));

    let original = engine.active_program().expect("a program is active after swap").clone();
    assert_eq!(original.schedule.state_slot_count, 0);

    let patched = engine
        .try_fast_patch(&[PatchChange::InstanceCount { key: "arr:count".to_owned(), raw: serde_json::json!(50) }])
        .expect("a pointwise array's count should fast-patch");

    let instance_id = original.instance_count_provenance.get("arr:count").expect("count provenance recorded").instance_id;
    assert_eq!(patched.schedule.instances.get(&instance_id).map(|d| d.count), Some(50));
    assert_eq!(patched.schedule.state_slot_count, original.schedule.state_slot_count);
}

#[test]
fn instance_count_patch_is_gated_by_per_lane_field_state() {
    let registry = common::registry();
    let patch = common::patch(vec![common::time_root("t0"), common::array("arr", 100, Some(200))], vec![]);

    let mut engine = Engine::new(registry, TimeModel::default());
    engine.graph_committed(&patch);
    engine.compile(&patch, 1);
    assert!(engine.swap(1, 0.0));

    let mut with_field_state = engine.active_program().expect("a program is active after swap").clone();
    let instance_id = with_field_state.instance_count_provenance.get("arr:count").expect("count provenance recorded").instance_id;

    // No built-in block declares per-lane state over an `Array` instance;
    // simulate one the way a future stateful-per-lane block would, to
    // exercise the hard gate on its own terms.
    with_field_state.schedule.state_mappings.push(StateMapping::Field {
        key: StableStateId::new("arr", "simulatedLaneState"),
        slot: StateSlot(0),
        stride: 1,
        instance_id,
        initial_value: ConstValue::Float(0.0),
    });
    with_field_state.schedule.state_slot_count = 1;

    let result = patch_program_constants(
        &with_field_state,
        &[PatchChange::InstanceCount { key: "arr:count".to_owned(), raw: serde_json::json!(50) }],
    );
    assert!(result.is_none(), "a field-state instance must never fast-patch its count");
}

#[test]
fn instance_count_patch_rejects_exceeding_max_count() {
    let registry = common::registry();
    let patch = common::patch(vec![common::time_root("t0"), common::array("arr", 100, Some(200))], vec![]);

    let mut engine = Engine::new(registry, TimeModel::default());
    engine.graph_committed(&patch);
    engine.compile(&patch, 1);
    assert!(engine.swap(1, 0.0));

    let result = engine.try_fast_patch(&[PatchChange::InstanceCount { key: "arr:count".to_owned(), raw: serde_json::json!(500) }]);
    assert!(result.is_none(), "a count beyond maxCount must fall back to a full recompile");
}
