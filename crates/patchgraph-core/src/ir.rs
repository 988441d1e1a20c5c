//! `ValueExpr` DAG, `LowerEffects`, and the per-block lowering contract.
//!
//! The DAG is an arena of `u32`-indexed nodes — no owning pointers, no GC.
//! Cycles in the *logical* dataflow are never
//! represented as graph cycles here; they are expressed indirectly through
//! `StateRead`/`StateWrite` pairs keyed by a [`StableStateId`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, PortId, StableStateId, ValueExprId, ValueSlot};
use crate::types::CanonicalType;

/// A constant value baked into a `Const` node. Component counts follow
/// [`crate::types::Payload::component_count`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Color([f64; 4]),
}

/// A time rail name (`phaseA`, `dt`, …) the `TimeRoot` block exposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRail(pub String);

/// Arithmetic/structural opcode carried by an `Op` node. Each name is a
/// reference to a kernel the runtime executor implements elsewhere; this
/// compiler only ever names a kernel, never supplies its numeric body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    Add,
    Sub,
    Mul,
    Div,
    Wrap01,
    /// Hue/saturation/value to RGBA color, 3 scalar inputs in, one `color`
    /// output — the kernel behind the rainbow default-source macro.
    HsvToRgb,
    /// Per-lane index (`0..count`) of the lane currently being evaluated.
    /// Zero inputs; the kernel sources it from the runtime's own loop
    /// counter for the node's instance, never from a slot.
    LaneIndex,
}

/// A node in the value-expression DAG. Each node carries its own resolved
/// [`CanonicalType`] so slot-type coherence (testable property 2) can be
/// checked structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueExpr {
    Const(ConstValue, CanonicalType),
    Ref(ValueSlot, CanonicalType),
    Op(OpCode, Vec<ValueExprId>, CanonicalType),
    Time(TimeRail, CanonicalType),
    StateRead(StableStateId, CanonicalType),
}

impl ValueExpr {
    /// The type carried by this node, regardless of variant.
    #[must_use]
    pub const fn ty(&self) -> &CanonicalType {
        match self {
            Self::Const(_, t) | Self::Ref(_, t) | Self::Op(_, _, t) | Self::Time(_, t) | Self::StateRead(_, t) => t,
        }
    }
}

/// Arena of `ValueExpr` nodes belonging to a single compile unit. Never
/// shared across recompiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueExprArena {
    pub nodes: Vec<ValueExpr>,
}

impl ValueExprArena {
    /// Appends a node and returns its freshly-assigned id.
    pub fn push(&mut self, expr: ValueExpr) -> ValueExprId {
        let id = ValueExprId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(expr);
        id
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn get(&self, id: ValueExprId) -> Option<&ValueExpr> {
        self.nodes.get(id.0 as usize)
    }
}

/// A resolved reference a block's lowering closure sees for each input: an
/// expression already placed in the arena, carrying its final type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRef {
    pub expr: ValueExprId,
    pub ty: CanonicalType,
    /// Set by impure/state/render blocks that allocate their own output
    /// slot explicitly rather than relying on orchestrator allocation.
    pub slot: Option<ValueSlot>,
}

/// A declared piece of persistent state, emitted by a block's lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub key: StableStateId,
    pub initial_value: ConstValue,
    pub stride: Option<u32>,
    pub instance_id: Option<InstanceId>,
    pub lane_count: Option<u32>,
}

/// A requested value slot for a block output, keyed by port id so the
/// binder can allocate in lexical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub port_id: PortId,
    pub ty: CanonicalType,
}

/// A requested instance declaration, emitted by an `Array`-like block whose
/// cardinality policy is `override`. Collected by the scheduler into
/// `ScheduleIr::instances`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDeclRequest {
    pub instance_id: InstanceId,
    pub count: u32,
    pub max_count: u32,
    pub stride: u32,
}

/// A runtime step a block's lowering wants executed each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepRequest {
    StateWrite { key: StableStateId, value: ValueExprId },
    FieldStateWrite { key: StableStateId, value: ValueExprId },
    Materialize { field: ValueExprId, instance_id: InstanceId, target: ValueSlot },
    ContinuityMapBuild { instance_id: InstanceId },
    ContinuityApply { instance_id: InstanceId, key: StableStateId },
}

/// Per-block output of lowering: state declarations, slot requests, and
/// step requests, collected as data rather than executed eagerly
/// ("effects-as-data").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LowerEffects {
    pub state_decls: Vec<StateDecl>,
    pub slot_requests: Vec<SlotRequest>,
    pub step_requests: Vec<StepRequest>,
    pub instance_decls: Vec<InstanceDeclRequest>,
}

/// What a block's `lower` closure returns: resolved output refs plus any
/// effects it collected.
#[derive(Debug, Clone, Default)]
pub struct LowerOutputs {
    pub outputs_by_id: BTreeMap<PortId, ValueRef>,
    pub effects: LowerEffects,
}

/// Builder surface exposed to a block's `lower` closure.
pub struct LowerBuilder<'a> {
    pub arena: &'a mut ValueExprArena,
    /// The block registry, so a composite block's `lower` closure can
    /// expand a [`LowerSandbox`] into another registered block type's
    /// lowering without the orchestrator needing to know about macros.
    pub registry: &'a crate::registry::BlockRegistry,
    existing_state: &'a BTreeMap<StableStateId, crate::ids::StateSlot>,
}

impl<'a> LowerBuilder<'a> {
    /// Creates a builder over `arena`, with `existing_state` the phase-1
    /// SCC escape hatch for resolving `stateRead`s during phase-2 re-lowering.
    #[must_use]
    pub fn new(
        arena: &'a mut ValueExprArena,
        registry: &'a crate::registry::BlockRegistry,
        existing_state: &'a BTreeMap<StableStateId, crate::ids::StateSlot>,
    ) -> Self {
        Self { arena, registry, existing_state }
    }

    /// Pushes a `Const` node.
    pub fn constant(&mut self, value: ConstValue, ty: CanonicalType) -> ValueExprId {
        self.arena.push(ValueExpr::Const(value, ty))
    }

    /// Pushes an `Op` node over the given inputs.
    pub fn opcode(&mut self, op: OpCode, inputs: Vec<ValueExprId>, ty: CanonicalType) -> ValueExprId {
        self.arena.push(ValueExpr::Op(op, inputs, ty))
    }

    /// Pushes a `Time` node reading the named rail.
    pub fn time(&mut self, rail: &str, ty: CanonicalType) -> ValueExprId {
        self.arena.push(ValueExpr::Time(TimeRail(rail.to_owned()), ty))
    }

    /// Pushes a `StateRead` node for the given stable state id.
    pub fn state_read(&mut self, key: StableStateId, ty: CanonicalType) -> ValueExprId {
        self.arena.push(ValueExpr::StateRead(key, ty))
    }

    /// An `eventNever` expression: the default source for `event` payloads.
    pub fn event_never(&mut self, ty: CanonicalType) -> ValueExprId {
        self.arena.push(ValueExpr::Const(ConstValue::Bool(false), ty))
    }

    /// The SCC phase-1 escape hatch: a state slot already allocated by an
    /// earlier visit of the same cycle, if any.
    #[must_use]
    pub fn find_state_slot(&self, key: &StableStateId) -> Option<crate::ids::StateSlot> {
        self.existing_state.get(key).copied()
    }
}

/// Delegates lowering to another registered block type from within a
/// composite block's own `lower` closure, prefixing its stable-state keys
/// and debug labels with the caller's instance path so nested expansions
/// never collide with a sibling's. Carries no state of its own beyond the
/// scoped path — the caller's substitution (resolved `out_types`) and
/// state-key prefix are passed explicitly to [`LowerSandbox::expand`].
pub struct LowerSandbox {
    scoped_id: crate::ids::BlockId,
}

impl LowerSandbox {
    /// Scopes a sandbox under `caller`'s instance path, naming the nested
    /// expansion `label` (e.g. `"hsv"` for a rainbow macro's inner
    /// `HsvToRgb` delegate).
    #[must_use]
    pub fn new(caller: &crate::ids::BlockId, label: &str) -> Self {
        Self { scoped_id: crate::ids::BlockId(format!("{}::{label}", caller.0)) }
    }

    /// Runs `sub_type`'s registered `lower` closure with the given inputs
    /// and resolved output types, inside this sandbox's scoped instance
    /// path, through the same `builder` the caller was given (so nested
    /// nodes land in the same arena and share the caller's SCC escape
    /// hatch).
    ///
    /// # Errors
    /// Returns [`crate::errors::LoweringError::UnsupportedPayload`] if
    /// `sub_type` is not registered, or whatever error the delegate's own
    /// `lower` closure raises.
    pub fn expand(
        &self,
        sub_type: &str,
        inputs_by_id: &BTreeMap<PortId, ValueRef>,
        out_types: &BTreeMap<PortId, CanonicalType>,
        params: &BTreeMap<String, serde_json::Value>,
        instance_id: Option<InstanceId>,
        builder: &mut LowerBuilder<'_>,
    ) -> Result<LowerOutputs, crate::errors::LoweringError> {
        let def = builder.registry.get(sub_type).ok_or_else(|| {
            crate::errors::LoweringError::UnsupportedPayload { block: self.scoped_id.clone() }
        })?;
        let ctx = LowerContext {
            block_id: &self.scoped_id,
            block_type: sub_type,
            instance_id,
            inputs_by_id,
            out_types,
            params,
        };
        (def.lower)(&ctx, builder)
    }
}

/// Context passed to a block's `lower` closure.
pub struct LowerContext<'a> {
    pub block_id: &'a crate::ids::BlockId,
    pub block_type: &'a str,
    pub instance_id: Option<InstanceId>,
    pub inputs_by_id: &'a BTreeMap<PortId, ValueRef>,
    pub out_types: &'a BTreeMap<PortId, CanonicalType>,
    pub params: &'a BTreeMap<String, serde_json::Value>,
}

impl<'a> LowerContext<'a> {
    /// Builds a [`StableStateId`] scoped to this block instance, deriving
    /// the instance path from its author-assigned [`crate::ids::BlockId`]
    /// and pairing it with a caller-chosen role tag.
    #[must_use]
    pub fn state_id(&self, role_tag: &str) -> StableStateId {
        StableStateId::new(&self.block_id.0, role_tag)
    }

    /// Reads a numeric param by key, falling back to `default` if absent or
    /// not representable as `f64`.
    #[must_use]
    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).and_then(serde_json::Value::as_f64).unwrap_or(default)
    }

    /// Reads an integer param by key, falling back to `default` if absent or
    /// not representable as `i64`.
    #[must_use]
    pub fn param_i64(&self, key: &str, default: i64) -> i64 {
        self.params.get(key).and_then(serde_json::Value::as_i64).unwrap_or(default)
    }
}

/// Given N input refs and an opcode, produces one `Op` node whose output
/// type is the join of input types. Tie-break when strides differ: the
/// longest stride wins, shorter operands
/// broadcast — stride itself is a runtime concern, so here this reduces to
/// picking the first non-`One` cardinality's type as the result's extent.
pub fn zip_auto(
    b: &mut LowerBuilder<'_>,
    op: OpCode,
    inputs: &[ValueRef],
) -> Result<ValueExprId, crate::errors::LoweringError> {
    let result_ty = inputs
        .iter()
        .max_by_key(|r| match r.ty.extent.cardinality {
            crate::types::Cardinality::One => 0,
            crate::types::Cardinality::Many(_) => 1,
        })
        .map(|r| r.ty)
        .ok_or_else(|| crate::errors::LoweringError::UnsupportedPayload {
            block: crate::ids::BlockId(String::new()),
        })?;
    let ids = inputs.iter().map(|r| r.expr).collect();
    Ok(b.opcode(op, ids, result_ty))
}

/// Single-input specialization of [`zip_auto`]: wraps one ref in a one-element
/// op node, preserving its cardinality. Named separately per spec's
/// `zipAuto`/`mapAuto` pair even though the N-ary case already subsumes it.
pub fn map_auto(b: &mut LowerBuilder<'_>, op: OpCode, input: &ValueRef) -> ValueExprId {
    b.opcode(op, vec![input.expr], input.ty)
}
