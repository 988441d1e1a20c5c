//! Scheduler / Program Assembler: linearizes steps, builds the instances
//! map, and assembles the final [`CompiledProgram`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bind::BoundStep;
use crate::ids::{BlockId, InstanceId, PortId, StableStateId, StateSlot, ValueExprId, ValueSlot};
use crate::ir::{ConstValue, ValueExprArena};
use crate::types::CanonicalType;

/// Per-block-output instance declaration for an `Array`-like block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDecl {
    pub instance_id: InstanceId,
    pub count: u32,
    pub max_count: u32,
    pub stride: u32,
}

/// Links a [`StableStateId`] to a [`StateSlot`], optionally per-lane over
/// an instance. Carries the declared initial value so continuity migration
/// can fall back to it without re-running lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateMapping {
    Primitive {
        key: StableStateId,
        slot: StateSlot,
        initial_value: ConstValue,
    },
    Field {
        key: StableStateId,
        slot: StateSlot,
        stride: u32,
        instance_id: InstanceId,
        initial_value: ConstValue,
    },
}

impl StateMapping {
    /// The instance this mapping is keyed to, if it is a field mapping.
    #[must_use]
    pub const fn field_instance(&self) -> Option<InstanceId> {
        match self {
            Self::Field { instance_id, .. } => Some(*instance_id),
            Self::Primitive { .. } => None,
        }
    }
}

/// Time rails, period, and reset epoch used to compute continuity offsets
/// at recompile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeModel {
    pub period_ms: f64,
    pub rails: Vec<String>,
    pub reset_epoch_ms: f64,
}

impl Default for TimeModel {
    fn default() -> Self {
        Self { period_ms: 1000.0, rails: Vec::new(), reset_epoch_ms: 0.0 }
    }
}

/// One scheduled runtime step, carrying its originating `(blockId, portId)`
/// for lexical tie-breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledStep {
    pub origin: (BlockId, PortId),
    pub step: BoundStep,
}

/// The assembled schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIr {
    pub steps: Vec<ScheduledStep>,
    pub instances: BTreeMap<InstanceId, InstanceDecl>,
    pub state_mappings: Vec<StateMapping>,
    pub state_slot_count: u32,
    pub event_slot_count: u32,
    pub event_count: u32,
    pub time_model: TimeModel,
}

/// Debug-only provenance for tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugIndex {
    pub edge_to_slot: BTreeMap<String, ValueSlot>,
    pub port_to_slot: BTreeMap<String, ValueSlot>,
}

/// Provenance for a constant-provenance port: the payload kind and the
/// ordered component expression ids making it up, enabling fast-path
/// constant patching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstProvenance {
    pub payload_kind: crate::types::Payload,
    pub component_expr_ids: Vec<ValueExprId>,
}

/// Provenance linking an instance-count-bearing port to the instance it
/// drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCountProvenance {
    pub instance_id: InstanceId,
}

/// Per-slot type metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMeta {
    pub slot: ValueSlot,
    pub ty: CanonicalType,
    pub debug_label: String,
}

/// The fully compiled, immutable artifact of one successful compile.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub slot_meta: Vec<SlotMeta>,
    pub value_exprs: ValueExprArena,
    pub schedule: ScheduleIr,
    pub constant_provenance: BTreeMap<String, ConstProvenance>,
    pub instance_count_provenance: BTreeMap<String, InstanceCountProvenance>,
    pub debug_index: DebugIndex,
}

impl CompiledProgram {
    /// Checks this program's structural invariants: slot-type coherence,
    /// state-key coverage, and instance counts within bounds. Intended for
    /// tests and debug assertions, not the hot compile path.
    #[must_use]
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for node in &self.value_exprs.nodes {
            if let crate::ir::ValueExpr::Ref(slot, ty) = node {
                let meta_ty = self.slot_meta.iter().find(|m| &m.slot == slot).map(|m| &m.ty);
                if meta_ty != Some(ty) {
                    violations.push(format!("Ref to slot {slot:?} has mismatched type"));
                }
            }
        }

        let declared_keys: std::collections::BTreeSet<_> =
            self.schedule.state_mappings.iter().map(StateMapping::key).collect();
        for step in &self.schedule.steps {
            if let Some(key) = step.step.state_key() {
                if !declared_keys.contains(key) {
                    violations.push(format!("step references undeclared state key {key}"));
                }
            }
        }

        for decl in self.schedule.instances.values() {
            if decl.count > decl.max_count {
                violations.push(format!("instance {:?} count {} exceeds maxCount {}", decl.instance_id, decl.count, decl.max_count));
            }
        }

        violations
    }
}

impl StateMapping {
    fn key(&self) -> &StableStateId {
        match self {
            Self::Primitive { key, .. } | Self::Field { key, .. } => key,
        }
    }
}

impl BoundStep {
    fn state_key(&self) -> Option<&StableStateId> {
        match self {
            Self::StateWrite { key, .. } | Self::FieldStateWrite { key, .. } | Self::ContinuityApply { key, .. } => Some(key),
            Self::Materialize { .. } | Self::ContinuityMapBuild { .. } => None,
        }
    }
}
