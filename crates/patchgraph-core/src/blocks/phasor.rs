//! `Phasor`: a free-running `[0, 1)` phase accumulator advancing by
//! `freq * dt / 1000` each tick. `Delay`: a one-tick state bridge that
//! demonstrates a legal multi-block structural cycle (its `capability` is
//! `State`, so a cycle routed entirely through it clears cycle detection).

use std::collections::BTreeMap;

use crate::errors::LoweringError;
use crate::ids::PortId;
use crate::ir::{map_auto, ConstValue, LowerEffects, LowerOutputs, OpCode, StateDecl, StepRequest, ValueRef};
use crate::registry::{
    BlockDefinition, BlockForm, BlockRegistry, CardinalityPolicy, Capability, InputPortDecl, OutputPortDecl,
};
use crate::types::{AngleUnit, CanonicalType, Contract, Payload, TimeUnit, Unit};

fn scalar() -> CanonicalType {
    CanonicalType::concrete(Payload::Float, Unit::Scalar)
}

fn port(name: &str) -> PortId {
    PortId(name.to_owned())
}

pub fn register(registry: &mut BlockRegistry) {
    register_phasor(registry);
    register_delay(registry);
}

fn register_phasor(registry: &mut BlockRegistry) {
    let phase_ty = CanonicalType::concrete(Payload::Float, Unit::Angle(AngleUnit::Turns)).with_contract(Contract::Wrap01);
    let dt_ty = CanonicalType::concrete(Payload::Float, Unit::Time(TimeUnit::Milliseconds));

    registry.register(BlockDefinition {
        type_name: "Phasor".to_owned(),
        inputs: vec![InputPortDecl {
            port: port("freq"),
            type_template: scalar(),
            default_source: Some(crate::registry::DefaultSourceKind::ConstFloat),
            exposed_as_port: true,
        }],
        outputs: vec![OutputPortDecl { port: port("phase"), type_template: phase_ty }],
        form: BlockForm::Primitive,
        capability: Capability::State,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(move |ctx, b| {
            let freq = ctx
                .inputs_by_id
                .get(&port("freq"))
                .ok_or_else(|| LoweringError::UnsupportedPayload { block: ctx.block_id.clone() })?
                .clone();
            let initial_phase = ctx.param_f64("initialPhase", 0.0);
            let phase_key = ctx.state_id("phase");

            let prev = b.state_read(phase_key.clone(), phase_ty);
            let dt = b.time("dt", dt_ty);
            let scaled = b.opcode(OpCode::Mul, vec![freq.expr, dt], scalar());
            let thousand = b.constant(ConstValue::Float(1000.0), scalar());
            let per_second = b.opcode(OpCode::Div, vec![scaled, thousand], scalar());
            let summed = b.opcode(OpCode::Add, vec![prev, per_second], phase_ty);
            let wrapped = map_auto(b, OpCode::Wrap01, &ValueRef { expr: summed, ty: phase_ty, slot: None });

            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("phase"), ValueRef { expr: wrapped, ty: phase_ty, slot: None });

            let effects = LowerEffects {
                state_decls: vec![StateDecl {
                    key: phase_key.clone(),
                    initial_value: ConstValue::Float(initial_phase),
                    stride: None,
                    instance_id: None,
                    lane_count: None,
                }],
                slot_requests: vec![crate::ir::SlotRequest { port_id: port("phase"), ty: phase_ty }],
                step_requests: vec![StepRequest::StateWrite { key: phase_key, value: wrapped }],
                ..LowerEffects::default()
            };
            Ok(LowerOutputs { outputs_by_id, effects })
        }),
    });
}

fn register_delay(registry: &mut BlockRegistry) {
    registry.register(BlockDefinition {
        type_name: "Delay".to_owned(),
        inputs: vec![InputPortDecl {
            port: port("in"),
            type_template: scalar(),
            default_source: None,
            exposed_as_port: true,
        }],
        outputs: vec![OutputPortDecl { port: port("out"), type_template: scalar() }],
        form: BlockForm::Primitive,
        capability: Capability::State,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(|ctx, b| {
            let input = ctx
                .inputs_by_id
                .get(&port("in"))
                .ok_or_else(|| LoweringError::UnsupportedPayload { block: ctx.block_id.clone() })?
                .clone();
            let initial = ctx.param_f64("initial", 0.0);
            let key = ctx.state_id("prev");
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&scalar());

            let prev = b.state_read(key.clone(), out_ty);

            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr: prev, ty: out_ty, slot: None });

            let effects = LowerEffects {
                state_decls: vec![StateDecl {
                    key: key.clone(),
                    initial_value: ConstValue::Float(initial),
                    stride: None,
                    instance_id: None,
                    lane_count: None,
                }],
                slot_requests: vec![crate::ir::SlotRequest { port_id: port("out"), ty: out_ty }],
                step_requests: vec![StepRequest::StateWrite { key, value: input.expr }],
                ..LowerEffects::default()
            };
            Ok(LowerOutputs { outputs_by_id, effects })
        }),
    });
}
