//! `InfiniteTimeRoot`: the unique time-root block every patch must declare
//! exactly once. Exposes the `dt` and `phaseA` rails other blocks read
//! through `ctx.b.time(rail, ty)`.

use std::collections::BTreeMap;

use crate::ids::PortId;
use crate::ir::{LowerEffects, LowerOutputs, ValueRef};
use crate::registry::{BlockDefinition, BlockForm, BlockRegistry, CardinalityPolicy, Capability, OutputPortDecl};
use crate::types::{AngleUnit, CanonicalType, Contract, Payload, TimeUnit, Unit};

pub fn register(registry: &mut BlockRegistry) {
    registry.register(BlockDefinition {
        type_name: crate::normalize::TIME_ROOT_BLOCK_TYPE.to_owned(),
        inputs: Vec::new(),
        outputs: vec![
            OutputPortDecl {
                port: PortId("dt".to_owned()),
                type_template: CanonicalType::concrete(Payload::Float, Unit::Time(TimeUnit::Milliseconds)),
            },
            OutputPortDecl {
                port: PortId("phaseA".to_owned()),
                type_template: CanonicalType::concrete(Payload::Float, Unit::Angle(AngleUnit::Turns))
                    .with_contract(Contract::Wrap01),
            },
        ],
        form: BlockForm::Primitive,
        // No output needs a slot of its own — every reader inlines a fresh
        // `Time` node, so the orchestrator never has to allocate on this
        // block's behalf.
        capability: Capability::Pure,
        cardinality_policy: CardinalityPolicy::pointwise(),
        lower: Box::new(|ctx, b| {
            let mut outputs_by_id = BTreeMap::new();
            for (port, ty) in ctx.out_types {
                let expr = b.time(&port.0, *ty);
                outputs_by_id.insert(port.clone(), ValueRef { expr, ty: *ty, slot: None });
            }
            Ok(LowerOutputs { outputs_by_id, effects: LowerEffects::default() })
        }),
    });
}
