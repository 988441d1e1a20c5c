//! Binder: pure, deterministic allocation of state slots and value slots.
//!
//! The binder makes no side-effecting calls outside its returned data,
//! except allocation requests to a [`SlotBuilder`] which is itself
//! deterministic given the same input order.

use std::collections::BTreeMap;

use crate::errors::BindError;
use crate::ids::{BlockId, PortId, StableStateId, StateSlot, ValueExprId, ValueSlot};
use crate::ir::{LowerEffects, StepRequest};
use crate::types::CanonicalType;

/// Capacity-query seam the binder allocates through. A single concrete
/// implementation backs the whole compile — no dynamic dispatch needed,
/// since there is exactly one binder per compile.
#[derive(Default)]
pub struct SlotBuilder {
    next_value_slot: u32,
    next_state_slot: u32,
    pub slot_types: BTreeMap<ValueSlot, CanonicalType>,
    pub slot_debug_labels: BTreeMap<ValueSlot, String>,
}

impl SlotBuilder {
    /// Allocates a fresh typed value slot with a debug label.
    pub fn alloc_typed_slot(&mut self, ty: CanonicalType, debug_label: &str) -> ValueSlot {
        let slot = ValueSlot(self.next_value_slot);
        self.next_value_slot += 1;
        self.slot_types.insert(slot, ty);
        self.slot_debug_labels.insert(slot, debug_label.to_owned());
        slot
    }

    /// Allocates a fresh state slot.
    pub fn alloc_state_slot(&mut self) -> StateSlot {
        let slot = StateSlot(self.next_state_slot);
        self.next_state_slot += 1;
        slot
    }

    /// Total state slots allocated so far, for `ScheduleIr::state_slot_count`.
    #[must_use]
    pub const fn state_slot_count(&self) -> u32 {
        self.next_state_slot
    }
}

/// Input to one binder pass: the effects collected from lowering, any
/// existing state to reuse (continuity / SCC phase-1 escape hatch), and
/// the block origin this pass is bound for.
pub struct BindInputs<'a> {
    pub effects: &'a LowerEffects,
    pub existing_state: Option<&'a BTreeMap<StableStateId, StateSlot>>,
    pub origin: (BlockId, u32),
}

/// Output of one binder pass.
#[derive(Debug, Clone, Default)]
pub struct BindingResult {
    pub state_map: BTreeMap<StableStateId, StateSlot>,
    pub slot_map: BTreeMap<PortId, ValueSlot>,
    pub expr_patches: BTreeMap<StableStateId, StateSlot>,
    pub bound_outputs: BTreeMap<PortId, ValueSlot>,
    pub diagnostics: Vec<BindError>,
}

/// Runs one binder pass over `inputs`, allocating through `builder`.
pub fn bind(inputs: &BindInputs<'_>, builder: &mut SlotBuilder) -> BindingResult {
    let mut result = BindingResult::default();

    // Rule 1: sort stateDecls by key lexically; allocate each, reusing from
    // existingState if present.
    let mut decls = inputs.effects.state_decls.clone();
    decls.sort_by(|a, b| a.key.cmp(&b.key));
    for decl in &decls {
        let slot = inputs
            .existing_state
            .and_then(|m| m.get(&decl.key))
            .copied()
            .unwrap_or_else(|| builder.alloc_state_slot());
        result.state_map.insert(decl.key.clone(), slot);
    }

    // Rule 2: sort slotRequests by portId lexically; allocate each typed
    // slot, keyed by "blockId.portId".
    let mut requests = inputs.effects.slot_requests.clone();
    requests.sort_by(|a, b| a.port_id.cmp(&b.port_id));
    for req in &requests {
        let label = format!("{}.{}", inputs.origin.0, req.port_id);
        let slot = builder.alloc_typed_slot(req.ty, &label);
        result.slot_map.insert(req.port_id.clone(), slot);
        result.bound_outputs.insert(req.port_id.clone(), slot);
    }

    // Rule 3: copy stateMap into exprPatches so stateRead(key) resolves.
    result.expr_patches = result.state_map.clone();

    // Rule 4: validate every stepRequest referencing a stateKey.
    for step in &inputs.effects.step_requests {
        if let Some(key) = step_state_key(step) {
            let locally_known = result.state_map.contains_key(key);
            let escape_hatch = inputs
                .existing_state
                .is_some_and(|m| m.contains_key(key));
            if !locally_known && !escape_hatch {
                result.diagnostics.push(BindError::UndeclaredStateKey { key: key.clone() });
            }
        }
    }

    result
}

fn step_state_key(step: &StepRequest) -> Option<&StableStateId> {
    match step {
        StepRequest::StateWrite { key, .. }
        | StepRequest::FieldStateWrite { key, .. }
        | StepRequest::ContinuityApply { key, .. } => Some(key),
        StepRequest::Materialize { .. } | StepRequest::ContinuityMapBuild { .. } => None,
    }
}

/// A step in the final schedule, produced by mechanically applying a
/// binding's step requests.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundStep {
    StateWrite { key: StableStateId, slot: StateSlot, value: ValueExprId },
    FieldStateWrite { key: StableStateId, slot: StateSlot, value: ValueExprId },
    Materialize { field: ValueExprId, instance_id: crate::ids::InstanceId, target: ValueSlot },
    ContinuityMapBuild { instance_id: crate::ids::InstanceId },
    ContinuityApply { instance_id: crate::ids::InstanceId, key: StableStateId, slot: StateSlot },
}

/// Mechanically executes `effects.step_requests` against `result`,
/// performing no branching decisions of its own.
///
/// `global_state_map` is the same merged, cross-block state map threaded
/// through [`BindInputs::existing_state`] for this compile: a step whose key
/// only resolves through that Rule-4 escape hatch (the key lives in a
/// sibling block's declared state, not this one's) must still produce a
/// step here, not be silently dropped.
#[must_use]
pub fn apply_binding(
    result: &BindingResult,
    effects: &LowerEffects,
    global_state_map: &BTreeMap<StableStateId, StateSlot>,
) -> Vec<BoundStep> {
    let resolve = |key: &StableStateId| result.state_map.get(key).or_else(|| global_state_map.get(key)).copied();

    effects
        .step_requests
        .iter()
        .filter_map(|step| match step {
            StepRequest::StateWrite { key, value } => {
                resolve(key).map(|slot| BoundStep::StateWrite { key: key.clone(), slot, value: *value })
            }
            StepRequest::FieldStateWrite { key, value } => {
                resolve(key).map(|slot| BoundStep::FieldStateWrite { key: key.clone(), slot, value: *value })
            }
            StepRequest::Materialize { field, instance_id, target } => Some(BoundStep::Materialize {
                field: *field,
                instance_id: *instance_id,
                target: *target,
            }),
            StepRequest::ContinuityMapBuild { instance_id } => {
                Some(BoundStep::ContinuityMapBuild { instance_id: *instance_id })
            }
            StepRequest::ContinuityApply { instance_id, key } => {
                resolve(key).map(|slot| BoundStep::ContinuityApply { instance_id: *instance_id, key: key.clone(), slot })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InstanceId;

    /// A step whose key resolves only through `existing_state` (the
    /// Rule-4 escape hatch for a cross-block SCC phase-1 reference) must
    /// still produce a `BoundStep`, not be silently dropped.
    #[test]
    fn apply_binding_resolves_step_via_escape_hatch() {
        let key = StableStateId::new("upstream", "prev");
        let slot = StateSlot(3);
        let mut global_state_map = BTreeMap::new();
        global_state_map.insert(key.clone(), slot);

        let result = BindingResult::default();
        let effects = LowerEffects {
            step_requests: vec![StepRequest::StateWrite { key: key.clone(), value: ValueExprId(0) }],
            ..LowerEffects::default()
        };

        let steps = apply_binding(&result, &effects, &global_state_map);
        assert_eq!(steps, vec![BoundStep::StateWrite { key, slot, value: ValueExprId(0) }]);
    }

    /// A step whose key resolves nowhere — not locally, not in the global
    /// map — is correctly dropped rather than producing a dangling slot.
    #[test]
    fn apply_binding_drops_step_with_unresolvable_key() {
        let key = StableStateId::new("nowhere", "prev");
        let result = BindingResult::default();
        let effects = LowerEffects {
            step_requests: vec![StepRequest::ContinuityApply { instance_id: InstanceId(0), key }],
            ..LowerEffects::default()
        };

        let steps = apply_binding(&result, &effects, &BTreeMap::new());
        assert!(steps.is_empty());
    }
}
