//! `Array`: the one built-in block whose cardinality policy is `override`.
//! Introduces a fresh `InstanceRef` (minted by the inference engine, see
//! `infer::infer`'s cardinality pass) and emits an `InstanceDeclRequest` so
//! the scheduler can declare it with a compile-time `maxCount` ceiling.

use std::collections::BTreeMap;

use crate::ir::{InstanceDeclRequest, LowerEffects, LowerOutputs, OpCode, ValueRef};
use crate::registry::{
    BlockDefinition, BlockForm, BlockRegistry, CardinalityMode, CardinalityPolicy, Capability, InputPortDecl,
    OutputPortDecl,
};
use crate::types::{CanonicalType, Cardinality, LaneCoupling, Payload, Unit};

fn port(name: &str) -> crate::ids::PortId {
    crate::ids::PortId(name.to_owned())
}

/// Hard ceiling on `maxCount` enforced at registration time — spec.md
/// §9's supplement: "a hard ceiling enforced at registration time"
/// (SPEC_FULL §4 4.G). Chosen generously for a compiled-program arena; a
/// real editor would expose this as a block parameter with its own bound.
const MAX_COUNT_CEILING: u32 = 4096;

pub fn register(registry: &mut BlockRegistry) {
    let lane_index_ty = CanonicalType::concrete(Payload::Int, Unit::Count);

    registry.register(BlockDefinition {
        type_name: "Array".to_owned(),
        inputs: vec![InputPortDecl {
            port: port("count"),
            type_template: CanonicalType::concrete(Payload::Int, Unit::Count),
            default_source: Some(crate::registry::DefaultSourceKind::ConstInt),
            exposed_as_port: true,
        }],
        outputs: vec![OutputPortDecl { port: port("out"), type_template: lane_index_ty }],
        form: BlockForm::Primitive,
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy {
            mode: CardinalityMode::Override,
            lane_coupling: LaneCoupling::LaneLocal,
            allow_zip_broadcast: false,
        },
        lower: Box::new(|ctx, b| {
            let out_ty = *ctx.out_types.get(&port("out")).unwrap_or(&lane_index_ty);
            let instance_id = match out_ty.extent.cardinality {
                Cardinality::Many(instance_ref) => instance_ref.0,
                Cardinality::One => {
                    return Err(crate::errors::LoweringError::UnsupportedPayload { block: ctx.block_id.clone() });
                }
            };

            #[allow(clippy::cast_sign_loss)]
            let count = ctx.param_i64("count", 1).max(0) as u32;
            #[allow(clippy::cast_sign_loss)]
            let declared_max = ctx.param_i64("maxCount", i64::from(count)).max(0) as u32;
            let max_count = declared_max.max(count).min(MAX_COUNT_CEILING);
            let count = count.min(max_count);

            let expr = b.opcode(OpCode::LaneIndex, Vec::new(), out_ty);
            let mut outputs_by_id = BTreeMap::new();
            outputs_by_id.insert(port("out"), ValueRef { expr, ty: out_ty, slot: None });

            let effects = LowerEffects {
                instance_decls: vec![InstanceDeclRequest { instance_id, count, max_count, stride: 1 }],
                ..LowerEffects::default()
            };
            Ok(LowerOutputs { outputs_by_id, effects })
        }),
    });
}
