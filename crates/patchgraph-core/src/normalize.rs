//! Normalizer: resolves the raw [`Patch`] before inference.
//!
//! Applies five structural rules in order, collecting every structural
//! error rather than short-circuiting on the first one — blocks are
//! enumerated in a fixed order so the collected errors are deterministic.

use std::collections::BTreeSet;

use crate::errors::FrontendError;
use crate::ids::BlockId;
use crate::model::{Block, BlockRole, Edge, Patch};
use crate::registry::{BlockRegistry, DefaultSourceKind};

/// Output of normalization: the canonicalized patch, the default-source
/// blocks synthesized along the way, and any structural errors found.
#[derive(Debug, Clone, Default)]
pub struct NormalizeResult {
    pub patch: Patch,
    pub synthesized: Vec<BlockId>,
    pub errors: Vec<FrontendError>,
}

/// Identifies the unique time-root block type. Exactly one block of this
/// type must exist in a patch.
pub const TIME_ROOT_BLOCK_TYPE: &str = "InfiniteTimeRoot";

/// Runs the normalizer over `patch` against `registry`.
#[must_use]
pub fn normalize(patch: &Patch, registry: &BlockRegistry) -> NormalizeResult {
    let mut errors = Vec::new();
    let mut out = patch.clone();

    // Rule 1: reject unknown block types.
    for block in patch.blocks.values() {
        if !registry.contains(&block.block_type) {
            errors.push(FrontendError::UnknownBlockType {
                block: block.id.clone(),
                block_type: block.block_type.clone(),
            });
        }
    }

    // Rule 2: reject edges whose endpoints don't resolve.
    for edge in &patch.edges {
        if !edge_resolves(patch, edge) {
            errors.push(FrontendError::DanglingEdge { edge: edge.id.clone() });
        }
    }

    // Rule 3: synthesize DefaultSource blocks for unconnected, exposed
    // inputs that declare a default.
    let mut synthesized = Vec::new();
    let mut synthetic_edges: Vec<Edge> = Vec::new();
    for block in patch.blocks.values() {
        let Some(def) = registry.get(&block.block_type) else {
            continue;
        };
        for input in &def.inputs {
            if !input.exposed_as_port {
                continue;
            }
            let Some(default_kind) = input.default_source else {
                continue;
            };
            if !patch.incoming_enabled(&block.id, &input.port).is_empty() {
                continue;
            }
            let synth_id = BlockId(format!("__default::{}::{}", block.id.0, input.port.0));
            let synth_block = default_source_block(&synth_id, default_kind);
            out.blocks.insert(synth_id.clone(), synth_block);
            synthesized.push(synth_id.clone());
            synthetic_edges.push(Edge {
                id: crate::ids::EdgeId(format!("__default_edge::{}::{}", block.id.0, input.port.0)),
                from: (synth_id, crate::ids::PortId("out".to_owned())),
                to: (block.id.clone(), input.port.clone()),
                enabled: true,
                sort_key: i64::MIN,
                role: Some("default".to_owned()),
            });
        }
    }
    out.edges.extend(synthetic_edges);

    // Rule 4: sort edges by (to.blockId, sortKey, from.blockId).
    out.edges = out.edges_sorted_for_determinism();

    // Rule 5: verify exactly one time-root block.
    let time_roots: Vec<BlockId> = out
        .blocks
        .values()
        .filter(|b| b.block_type == TIME_ROOT_BLOCK_TYPE)
        .map(|b| b.id.clone())
        .collect();
    if time_roots.is_empty() {
        errors.push(FrontendError::TimeRootMissing);
    } else if time_roots.len() > 1 {
        let mut sorted = time_roots;
        sorted.sort();
        errors.push(FrontendError::TimeRootMultiple(sorted));
    }

    NormalizeResult {
        patch: out,
        synthesized,
        errors,
    }
}

fn edge_resolves(patch: &Patch, edge: &Edge) -> bool {
    let Some(from_block) = patch.blocks.get(&edge.from.0) else {
        return false;
    };
    let Some(to_block) = patch.blocks.get(&edge.to.0) else {
        return false;
    };
    from_block.output_ports.contains(&edge.from.1) && to_block.input_ports.contains(&edge.to.1)
}

fn default_source_block(id: &BlockId, kind: DefaultSourceKind) -> Block {
    let block_type = match kind {
        DefaultSourceKind::ConstFloat => "DefaultSource::ConstFloat",
        DefaultSourceKind::ConstInt => "DefaultSource::ConstInt",
        DefaultSourceKind::ConstBool => "DefaultSource::ConstBool",
        DefaultSourceKind::RainbowColor => "DefaultSource::RainbowColor",
        DefaultSourceKind::EventNever => "DefaultSource::EventNever",
    };
    Block {
        id: id.clone(),
        block_type: block_type.to_owned(),
        params: std::collections::BTreeMap::new(),
        display_name: None,
        role: BlockRole::DefaultSource,
        input_ports: Vec::new(),
        output_ports: vec![crate::ids::PortId("out".to_owned())],
    }
}

/// Returns the set of block ids referenced by at least one enabled edge
/// (as source or destination), used by the disconnected-block authoring
/// validator.
#[must_use]
pub fn connected_block_ids(patch: &Patch) -> BTreeSet<BlockId> {
    let mut ids = BTreeSet::new();
    for edge in patch.edges.iter().filter(|e| e.enabled) {
        ids.insert(edge.from.0.clone());
        ids.insert(edge.to.0.clone());
    }
    ids
}
