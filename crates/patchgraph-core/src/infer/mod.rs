//! Inference Engine: assigns a fully-resolved `CanonicalType` to every port
//! and internal wire.

pub mod scc;

use std::collections::BTreeMap;

use crate::errors::InferError;
use crate::ids::{BlockId, InstanceId};
use crate::model::Patch;
use crate::registry::{BlockRegistry, CardinalityMode};
use crate::types::{unify, Cardinality, CanonicalType, InstanceRef, UnifyError};

/// Per-port resolved types, keyed by `(blockId, portId)`.
pub type ResolvedPorts = BTreeMap<(BlockId, crate::ids::PortId), CanonicalType>;

/// Output of inference: resolved port types, errors, and whether the
/// backend may proceed to lowering.
#[derive(Debug, Clone, Default)]
pub struct FrontendResult {
    pub resolved_ports: ResolvedPorts,
    pub errors: Vec<InferError>,
    pub backend_ready: bool,
    pub topo_order: Vec<BlockId>,
    /// Every strongly-connected component of the enabled-edge graph,
    /// including size-1 singletons. The IR builder consults the size>1
    /// members (legal, since a structural cycle without a stateful
    /// boundary already failed `backend_ready`) to lower each such
    /// component in two passes: a first pass that only collects state
    /// declarations so every member can see the others' state slots, then
    /// a second pass that lowers for real with those slots pre-allocated.
    pub sccs: Vec<Vec<BlockId>>,
}

/// Runs inference over a normalized patch.
#[must_use]
pub fn infer(patch: &Patch, registry: &BlockRegistry) -> FrontendResult {
    let mut resolved: ResolvedPorts = BTreeMap::new();
    let mut errors = Vec::new();
    let mut structural_failure = false;

    // Step 1: seed each port with its declaration.
    for block in patch.blocks.values() {
        let Some(def) = registry.get(&block.block_type) else {
            continue;
        };
        for input in &def.inputs {
            resolved.insert((block.id.clone(), input.port.clone()), input.type_template);
        }
        for output in &def.outputs {
            resolved.insert((block.id.clone(), output.port.clone()), output.type_template);
        }
    }

    // Adjacency over enabled edges, built early: the cardinality pass below
    // and cycle detection both need it, and the topological order it
    // produces is reused verbatim as the IR builder's lowering order.
    let mut adjacency: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
    for block in patch.blocks.keys() {
        adjacency.entry(block.clone()).or_default();
    }
    for edge in patch.edges.iter().filter(|e| e.enabled) {
        adjacency.entry(edge.from.0.clone()).or_default().push(edge.to.0.clone());
    }
    for neighbors in adjacency.values_mut() {
        neighbors.sort();
    }
    let nodes: Vec<BlockId> = patch.blocks.keys().cloned().collect();
    let topo_order = topological_order(&nodes, &adjacency);

    // Step 2: unify payload/unit across every enabled edge.
    for edge in patch.edges.iter().filter(|e| e.enabled) {
        let from_key = (edge.from.0.clone(), edge.from.1.clone());
        let to_key = (edge.to.0.clone(), edge.to.1.clone());
        let (Some(&from_ty), Some(&to_ty)) = (resolved.get(&from_key), resolved.get(&to_key)) else {
            continue;
        };
        match unify(from_ty, to_ty) {
            Ok(sub) => {
                resolved.insert(from_key.clone(), sub.apply(from_ty));
                resolved.insert(to_key.clone(), sub.apply(to_ty));
            }
            Err(UnifyError::UnitConflict { .. }) => {
                errors.push(InferError::UnitMismatch {
                    block: edge.to.0.clone(),
                    port: edge.to.1.clone(),
                });
            }
            Err(_) => {
                errors.push(InferError::TypeMismatch {
                    block: edge.to.0.clone(),
                    port: edge.to.1.clone(),
                });
            }
        }
    }

    // Step 2.5: every exposed input with no declared default source must be
    // connected; otherwise lowering would have nothing to read.
    for block in patch.blocks.values() {
        let Some(def) = registry.get(&block.block_type) else {
            continue;
        };
        for input in &def.inputs {
            if input.exposed_as_port
                && input.default_source.is_none()
                && patch.incoming_enabled(&block.id, &input.port).is_empty()
            {
                errors.push(InferError::MissingInput {
                    block: block.id.clone(),
                    port: input.port.clone(),
                });
            }
        }
    }

    // Step 3: propagate cardinality in topological order. `topo_order`
    // already places every upstream block before its downstream readers
    // (cyclic leftovers are appended lexically), so by the time a block is
    // visited every enabled incoming edge's source cardinality is final.
    // A fresh `InstanceId` per `override` block is minted from a local,
    // per-compile counter seeded at zero — never a process-global atomic —
    // so that compiling the same patch twice in one process yields
    // identical instance ids both times (determinism, testable property 1).
    let mut next_instance_id: u32 = 0;
    for block_id in &topo_order {
        let Some(block) = patch.blocks.get(block_id) else { continue };
        let Some(def) = registry.get(&block.block_type) else { continue };

        if def.cardinality_policy.lane_coupling == crate::types::LaneCoupling::LaneCoupled {
            errors.push(InferError::LaneCoupledDisallowed { block: block.id.clone() });
        }

        // Pull each input's cardinality from its resolved entry (already
        // final for every upstream-fed input, by topo order).
        let input_cardinalities: Vec<Cardinality> = def
            .inputs
            .iter()
            .filter_map(|i| resolved.get(&(block.id.clone(), i.port.clone())))
            .map(|t| t.extent.cardinality)
            .collect();

        let output_cardinality = match def.cardinality_policy.mode {
            CardinalityMode::Override => {
                let instance = InstanceRef(InstanceId(next_instance_id));
                next_instance_id += 1;
                Some(Cardinality::Many(instance))
            }
            CardinalityMode::Preserve => match join_cardinalities(&input_cardinalities, def.cardinality_policy.allow_zip_broadcast) {
                Ok(joined) => Some(joined),
                Err(CardinalityJoinError::InstanceMismatch) => {
                    errors.push(InferError::InstanceMismatch { block: block.id.clone() });
                    None
                }
                Err(CardinalityJoinError::BroadcastDisallowed) => {
                    errors.push(InferError::ImplicitBroadcastDisallowed { block: block.id.clone() });
                    None
                }
            },
        };

        let Some(card) = output_cardinality else { continue };
        for output in &def.outputs {
            let key = (block.id.clone(), output.port.clone());
            if let Some(ty) = resolved.get(&key).copied() {
                resolved.insert(key, ty.with_extent(crate::types::Extent { cardinality: card, ..ty.extent }));
            }
        }
    }

    // Step 5: cycle detection via Tarjan SCC over the enabled-edge graph.
    let sccs: Vec<Vec<BlockId>> = scc::tarjan_scc(&nodes, &adjacency);
    for component in sccs.iter().filter(|c| c.len() > 1) {
        let has_stateful_boundary = component.iter().any(|id| {
            patch
                .blocks
                .get(id)
                .and_then(|b| registry.get(&b.block_type))
                .is_some_and(|def| def.capability == crate::registry::Capability::State)
        });
        if !has_stateful_boundary {
            errors.push(InferError::CycleDetected { blocks: component.clone() });
            structural_failure = true;
        }
    }

    // Every InferError here is itself a structural or semantic failure
    // local to its own target, treated as fatal for the current revision —
    // a simplification over distinguishing hard cycle failures from softer
    // unit/cardinality mismatches, since none of this engine's codes are
    // mere warnings.
    let backend_ready = !structural_failure && errors.is_empty();

    FrontendResult {
        resolved_ports: resolved,
        errors,
        backend_ready,
        topo_order,
        sccs,
    }
}

/// Why [`join_cardinalities`] could not produce a joined cardinality.
enum CardinalityJoinError {
    /// Two `many` inputs named different `InstanceRef`s.
    InstanceMismatch,
    /// A `one` input met a `many` input but the block's policy does not
    /// declare `allowZipSig`.
    BroadcastDisallowed,
}

/// Joins a block's input cardinalities under the `preserve` policy: all
/// `many` inputs must share one `InstanceRef`; a `one` input is absorbed
/// (broadcast) into a `many` join only when `allow_zip_broadcast` is set,
/// otherwise the mix is rejected outright. Two `one`s join to `one`.
fn join_cardinalities(cardinalities: &[Cardinality], allow_zip_broadcast: bool) -> Result<Cardinality, CardinalityJoinError> {
    let mut joined = Cardinality::One;
    for c in cardinalities {
        match (joined, c) {
            (Cardinality::One, Cardinality::One) => {}
            (Cardinality::One, Cardinality::Many(m)) => joined = Cardinality::Many(*m),
            (Cardinality::Many(_), Cardinality::One) => {
                if !allow_zip_broadcast {
                    return Err(CardinalityJoinError::BroadcastDisallowed);
                }
            }
            (Cardinality::Many(a), Cardinality::Many(b)) if a.0 == b.0 => {}
            (Cardinality::Many(_), Cardinality::Many(_)) => return Err(CardinalityJoinError::InstanceMismatch),
        }
    }
    Ok(joined)
}

/// Topological order over blocks by enabled-edge dependency, with
/// per-level lexical tie-break by block id.
fn topological_order(nodes: &[BlockId], adjacency: &BTreeMap<BlockId, Vec<BlockId>>) -> Vec<BlockId> {
    let mut in_degree: BTreeMap<BlockId, usize> = nodes.iter().map(|n| (n.clone(), 0)).collect();
    for neighbors in adjacency.values() {
        for n in neighbors {
            *in_degree.entry(n.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: std::collections::BTreeSet<BlockId> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    let mut remaining = in_degree;

    while let Some(next) = ready.iter().next().cloned() {
        ready.remove(&next);
        order.push(next.clone());
        if let Some(neighbors) = adjacency.get(&next) {
            for n in neighbors {
                if let Some(deg) = remaining.get_mut(n) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.insert(n.clone());
                    }
                }
            }
        }
    }

    // Any nodes left out (part of a cycle) are appended in lexical order so
    // lowering still visits every block exactly once even when the graph is
    // not a DAG (a legal cycle with a stateful boundary still needs a
    // deterministic visiting order for phase-1 SCC binding).
    let visited: std::collections::BTreeSet<_> = order.iter().cloned().collect();
    let mut leftover: Vec<BlockId> = nodes.iter().filter(|n| !visited.contains(*n)).cloned().collect();
    leftover.sort();
    order.extend(leftover);
    order
}
