//! `DefaultSource::*`: the synthetic blocks the normalizer inserts for an
//! unconnected, exposed input port that declares a default (normalize.rs
//! rule 3). Each takes no input and a fixed `out` output port.
//!
//! `DefaultSource::RainbowColor` is the one composite/macro block in the
//! catalog: it expands through a [`crate::ir::LowerSandbox`] into a
//! private `__RainbowHsv` primitive, demonstrating the nested-expansion
//! path a real composite block would also use.

use std::collections::BTreeMap;

use crate::ir::{ConstValue, LowerBuilder, LowerContext, LowerEffects, LowerOutputs, LowerSandbox, OpCode, ValueRef};
use crate::registry::{BlockDefinition, BlockForm, BlockRegistry, CardinalityPolicy, Capability, OutputPortDecl};
use crate::types::{CanonicalType, Payload, Unit};

fn port(name: &str) -> crate::ids::PortId {
    crate::ids::PortId(name.to_owned())
}

fn register_const_float(type_name: &str, registry: &mut BlockRegistry) {
    let ty = CanonicalType::concrete(Payload::Float, Unit::Scalar);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&ty);
            let expr = b.constant(ConstValue::Float(0.0), out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_const_int(type_name: &str, registry: &mut BlockRegistry) {
    let ty = CanonicalType::concrete(Payload::Int, Unit::Count);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&ty);
            let expr = b.constant(ConstValue::Int(1), out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_const_bool(type_name: &str, registry: &mut BlockRegistry) {
    let ty = CanonicalType::concrete(Payload::Bool, Unit::None);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&ty);
            let expr = b.constant(ConstValue::Bool(false), out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_event_never(type_name: &str, registry: &mut BlockRegistry) {
    let ty = CanonicalType::concrete(Payload::Event, Unit::None);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&ty);
            let expr = b.event_never(out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

/// Private primitive the rainbow macro delegates to: three `Const` hue
/// channels in, one `HsvToRgb` op out. Never referenced directly from a
/// patch (not exposed in any editor palette), only via
/// [`LowerSandbox::expand`].
const RAINBOW_HSV_TYPE: &str = "__RainbowHsv";

fn register_rainbow_hsv(registry: &mut BlockRegistry) {
    let color_ty = CanonicalType::concrete(Payload::Color, Unit::Color);
    let scalar_ty = CanonicalType::concrete(Payload::Float, Unit::Scalar);
    registry.register(BlockDefinition {
        type_name: RAINBOW_HSV_TYPE.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: color_ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let hue = ctx.param_f64("hue", 0.0);
            let h = b.constant(ConstValue::Float(hue), scalar_ty);
            let s = b.constant(ConstValue::Float(1.0), scalar_ty);
            let v = b.constant(ConstValue::Float(1.0), scalar_ty);
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&color_ty);
            let expr = b.opcode(OpCode::HsvToRgb, vec![h, s, v], out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}

fn register_rainbow_color(type_name: &str, registry: &mut BlockRegistry) {
    let color_ty = CanonicalType::concrete(Payload::Color, Unit::Color);
    registry.register(BlockDefinition {
        type_name: type_name.to_owned(),
        inputs: Vec::new(),
        outputs: vec![OutputPortDecl { port: port("out"), type_template: color_ty }],
        form: BlockForm::Composite,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx: &LowerContext<'_>, b: &mut LowerBuilder<'_>| {
            let sandbox = LowerSandbox::new(ctx.block_id, "hsv");
            let inputs_by_id = BTreeMap::new();
            let mut out_types = BTreeMap::new();
            out_types.insert(port("out"), *ctx.out_types.get(&port("out")).unwrap_or(&color_ty));
            sandbox.expand(RAINBOW_HSV_TYPE, &inputs_by_id, &out_types, ctx.params, ctx.instance_id, b)
        }),
    });
}

pub fn register(registry: &mut BlockRegistry) {
    register_const_float("DefaultSource::ConstFloat", registry);
    register_const_int("DefaultSource::ConstInt", registry);
    register_const_bool("DefaultSource::ConstBool", registry);
    register_event_never("DefaultSource::EventNever", registry);
    register_rainbow_hsv(registry);
    register_rainbow_color("DefaultSource::RainbowColor", registry);
}
