#![allow(dead_code)]

//! Shared fixture builders for the integration test suite: small,
//! hand-assembled [`Patch`] pieces rather than a fixture DSL, since every
//! scenario here fits in a handful of blocks and edges.

use std::collections::BTreeMap;

use patchgraph_core::blocks::register_builtins;
use patchgraph_core::ids::{BlockId, EdgeId, PortId};
use patchgraph_core::model::{Block, BlockRole, Edge, Patch};
use patchgraph_core::registry::BlockRegistry;

/// A registry with every built-in block type registered.
#[must_use]
pub fn registry() -> BlockRegistry {
    let mut r = BlockRegistry::new();
    register_builtins(&mut r);
    r
}

/// A user block with the given id, type name, and declared port names.
#[must_use]
pub fn block(id: &str, block_type: &str, inputs: &[&str], outputs: &[&str]) -> Block {
    Block {
        id: BlockId(id.to_owned()),
        block_type: block_type.to_owned(),
        params: BTreeMap::new(),
        display_name: None,
        role: BlockRole::User,
        input_ports: inputs.iter().map(|p| PortId((*p).to_owned())).collect(),
        output_ports: outputs.iter().map(|p| PortId((*p).to_owned())).collect(),
    }
}

/// [`block`] with a set of `(key, value)` params attached.
#[must_use]
pub fn block_with_params(
    id: &str,
    block_type: &str,
    inputs: &[&str],
    outputs: &[&str],
    params: &[(&str, serde_json::Value)],
) -> Block {
    let mut b = block(id, block_type, inputs, outputs);
    for (key, value) in params {
        b.params.insert((*key).to_owned(), value.clone());
    }
    b
}

/// The unique `InfiniteTimeRoot` block every patch must declare exactly once.
#[must_use]
pub fn time_root(id: &str) -> Block {
    block(id, "InfiniteTimeRoot", &[], &["dt", "phaseA"])
}

/// A `Phasor` block; `freq` is left unconnected unless the caller wires it.
#[must_use]
pub fn phasor(id: &str, initial_phase: f64) -> Block {
    block_with_params(id, "Phasor", &["freq"], &["phase"], &[("initialPhase", serde_json::json!(initial_phase))])
}

/// A `Delay` block with the given initial value.
#[must_use]
pub fn delay(id: &str, initial: f64) -> Block {
    block_with_params(id, "Delay", &["in"], &["out"], &[("initial", serde_json::json!(initial))])
}

/// A `ConstFloat` block baking in `value`.
#[must_use]
pub fn const_float(id: &str, value: f64) -> Block {
    block_with_params(id, "ConstFloat", &[], &["out"], &[("value", serde_json::json!(value))])
}

/// A `ConstInt` block baking in `value`.
#[must_use]
pub fn const_int(id: &str, value: i64) -> Block {
    block_with_params(id, "ConstInt", &[], &["out"], &[("value", serde_json::json!(value))])
}

/// An `Add`/`Sub`/`Mul`/`Div` block: inputs `a`/`b`, output `out`.
#[must_use]
pub fn binary_op(id: &str, block_type: &str) -> Block {
    block(id, block_type, &["a", "b"], &["out"])
}

/// An `Array` block with explicit `count`/`maxCount` params.
#[must_use]
pub fn array(id: &str, count: i64, max_count: Option<i64>) -> Block {
    let mut params = vec![("count", serde_json::json!(count))];
    if let Some(max) = max_count {
        params.push(("maxCount", serde_json::json!(max)));
    }
    block_with_params(id, "Array", &["count"], &["out"], &params)
}

/// A `TimeMsToSeconds`/`TimeSecondsToMs` cast block: input `in`, output `out`.
#[must_use]
pub fn time_cast(id: &str, block_type: &str) -> Block {
    block(id, block_type, &["in"], &["out"])
}

/// A single enabled edge from `(from_block, from_port)` to `(to_block, to_port)`.
#[must_use]
pub fn edge(id: &str, from_block: &str, from_port: &str, to_block: &str, to_port: &str) -> Edge {
    Edge {
        id: EdgeId(id.to_owned()),
        from: (BlockId(from_block.to_owned()), PortId(from_port.to_owned())),
        to: (BlockId(to_block.to_owned()), PortId(to_port.to_owned())),
        enabled: true,
        sort_key: 0,
        role: None,
    }
}

/// Assembles a [`Patch`] from a list of blocks and a list of edges.
#[must_use]
pub fn patch(blocks: Vec<Block>, edges: Vec<Edge>) -> Patch {
    let mut p = Patch::default();
    for b in blocks {
        p.blocks.insert(b.id.clone(), b);
    }
    p.edges = edges;
    p
}
