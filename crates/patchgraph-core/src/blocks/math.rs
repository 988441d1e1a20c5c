//! Arithmetic primitives (`Add`/`Sub`/`Mul`/`Div`), user-authored scalar
//! constants (`ConstFloat`/`ConstInt`/`ConstBool`), and the two `Cast`
//! blocks that are the only legal bridge between concrete time units —
//! connecting a `Unit::Time(Milliseconds)` output straight to a
//! `Unit::Time(Seconds)` input is a unit mismatch, never an implicit
//! coercion.

use std::collections::BTreeMap;

use crate::errors::LoweringError;
use crate::ids::PortId;
use crate::ir::{zip_auto, ConstValue, LowerEffects, LowerOutputs, OpCode, ValueRef};
use crate::registry::{
    BlockDefinition, BlockForm, BlockRegistry, CardinalityMode, CardinalityPolicy, Capability,
    InputPortDecl, OutputPortDecl,
};
use crate::types::{CanonicalType, LaneCoupling, Payload, TimeUnit, Unit};

fn scalar() -> CanonicalType {
    CanonicalType::concrete(Payload::Float, Unit::Scalar)
}

fn port(name: &str) -> PortId {
    PortId(name.to_owned())
}

fn require_input<'a>(
    ctx: &'a crate::ir::LowerContext<'a>,
    name: &str,
) -> Result<&'a ValueRef, LoweringError> {
    ctx.inputs_by_id
        .get(&port(name))
        .ok_or_else(|| LoweringError::UnsupportedPayload { block: ctx.block_id.clone() })
}

fn binary_op(type_name: &str, op: OpCode, registry: &mut BlockRegistry) {
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: vec![
            InputPortDecl { port: port("a"), type_template: scalar(), default_source: None, exposed_as_port: true },
            InputPortDecl { port: port("b"), type_template: scalar(), default_source: None, exposed_as_port: true },
        ],
        outputs: vec![OutputPortDecl { port: port("out"), type_template: scalar() }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy {
            mode: CardinalityMode::Preserve,
            lane_coupling: LaneCoupling::LaneLocal,
            allow_zip_broadcast: true,
        },
        lower: Box::new(move |ctx, b| {
            let a = require_input(ctx, "a")?.clone();
            let bb = require_input(ctx, "b")?.clone();
            let expr = zip_auto(b, op, &[a, bb])?;
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&scalar());
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_const_float(type_name: &str, registry: &mut BlockRegistry) {
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: scalar() }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(|ctx, b| {
            let value = ctx.param_f64("value", 0.0);
            let ty = *ctx.out_types.get(&port("out")).unwrap_or(&scalar());
            let expr = b.constant(ConstValue::Float(value), ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_const_int(type_name: &str, registry: &mut BlockRegistry) {
    let int_count = CanonicalType::concrete(Payload::Int, Unit::Count);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: int_count }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let value = ctx.param_i64("value", 1);
            let ty = *ctx.out_types.get(&port("out")).unwrap_or(&int_count);
            let expr = b.constant(ConstValue::Int(value), ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_const_bool(type_name: &str, registry: &mut BlockRegistry) {
    let bool_ty = CanonicalType::concrete(Payload::Bool, Unit::None);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: bool_ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let value = ctx.params.get("value").and_then(serde_json::Value::as_bool).unwrap_or(false);
            let ty = *ctx.out_types.get(&port("out")).unwrap_or(&bool_ty);
            let expr = b.constant(ConstValue::Bool(value), ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_time_cast(type_name: &str, from: TimeUnit, to: TimeUnit, factor: f64, registry: &mut BlockRegistry) {
    let in_ty = CanonicalType::concrete(Payload::Float, Unit::Time(from));
    let out_ty = CanonicalType::concrete(Payload::Float, Unit::Time(to));
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: vec![InputPortDecl { port: port("in"), type_template: in_ty, default_source: None, exposed_as_port: true }],
        outputs: vec![OutputPortDecl { port: port("out"), type_template: out_ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let input = require_input(ctx, "in")?.clone();
            let factor_expr = b.constant(ConstValue::Float(factor), scalar());
            let expr = b.opcode(OpCode::Mul, vec![input.expr, factor_expr], out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

pub fn register(registry: &mut BlockRegistry) {
    binary_op("Add", OpCode::Add, registry);
    binary_op("Sub", OpCode::Sub, registry);
    binary_op("Mul", OpCode::Mul, registry);
    binary_op("Div", OpCode::Div, registry);
    register_const_float("ConstFloat", registry);
    register_const_int("ConstInt", registry);
    register_const_bool("ConstBool", registry);
    register_time_cast("TimeMsToSeconds", TimeUnit::Milliseconds, TimeUnit::Seconds, 0.001, registry);
    register_time_cast("TimeSecondsToMs", TimeUnit::Seconds, TimeUnit::Milliseconds, 1000.0, registry);
}
