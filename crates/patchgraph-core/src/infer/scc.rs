//! Tarjan's strongly-connected-components algorithm over the enabled-edge
//! graph, used by the inference engine's cycle detection.

use std::collections::BTreeMap;

use crate::ids::BlockId;

struct TarjanState {
    index_counter: u32,
    stack: Vec<BlockId>,
    on_stack: BTreeMap<BlockId, bool>,
    indices: BTreeMap<BlockId, u32>,
    low_links: BTreeMap<BlockId, u32>,
    sccs: Vec<Vec<BlockId>>,
}

/// Computes the strongly-connected components of the graph described by
/// `adjacency` (block id -> ids it has an enabled outgoing edge to).
/// Iteration order over `adjacency` is irrelevant to the *result* (each
/// node visited exactly once) but the traversal itself iterates neighbor
/// lists in the order provided, so callers should pass pre-sorted
/// neighbor lists for a deterministic component listing.
#[must_use]
pub fn tarjan_scc(nodes: &[BlockId], adjacency: &BTreeMap<BlockId, Vec<BlockId>>) -> Vec<Vec<BlockId>> {
    let mut state = TarjanState {
        index_counter: 0,
        stack: Vec::new(),
        on_stack: BTreeMap::new(),
        indices: BTreeMap::new(),
        low_links: BTreeMap::new(),
        sccs: Vec::new(),
    };

    for node in nodes {
        if !state.indices.contains_key(node) {
            strong_connect(node, adjacency, &mut state);
        }
    }

    state.sccs
}

fn strong_connect(v: &BlockId, adjacency: &BTreeMap<BlockId, Vec<BlockId>>, state: &mut TarjanState) {
    state.indices.insert(v.clone(), state.index_counter);
    state.low_links.insert(v.clone(), state.index_counter);
    state.index_counter += 1;
    state.stack.push(v.clone());
    state.on_stack.insert(v.clone(), true);

    if let Some(neighbors) = adjacency.get(v) {
        for w in neighbors {
            if !state.indices.contains_key(w) {
                strong_connect(w, adjacency, state);
                let w_low = state.low_links[w];
                let v_low = state.low_links[v];
                state.low_links.insert(v.clone(), v_low.min(w_low));
            } else if *state.on_stack.get(w).unwrap_or(&false) {
                let w_index = state.indices[w];
                let v_low = state.low_links[v];
                state.low_links.insert(v.clone(), v_low.min(w_index));
            }
        }
    }

    if state.low_links[v] == state.indices[v] {
        let mut component = Vec::new();
        loop {
            let Some(w) = state.stack.pop() else { break };
            state.on_stack.insert(w.clone(), false);
            let reached_v = w == *v;
            component.push(w);
            if reached_v {
                break;
            }
        }
        component.sort();
        state.sccs.push(component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> BlockId {
        BlockId(s.to_owned())
    }

    #[test]
    fn detects_a_two_cycle() {
        let nodes = vec![b("A"), b("B")];
        let mut adj = BTreeMap::new();
        adj.insert(b("A"), vec![b("B")]);
        adj.insert(b("B"), vec![b("A")]);
        let sccs = tarjan_scc(&nodes, &adj);
        let cyclic: Vec<_> = sccs.into_iter().filter(|c| c.len() > 1).collect();
        assert_eq!(cyclic, vec![vec![b("A"), b("B")]]);
    }

    #[test]
    fn acyclic_chain_has_only_singleton_components() {
        let nodes = vec![b("A"), b("B"), b("C")];
        let mut adj = BTreeMap::new();
        adj.insert(b("A"), vec![b("B")]);
        adj.insert(b("B"), vec![b("C")]);
        let sccs = tarjan_scc(&nodes, &adj);
        assert!(sccs.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn self_loop_is_its_own_scc() {
        let nodes = vec![b("A")];
        let mut adj = BTreeMap::new();
        adj.insert(b("A"), vec![b("A")]);
        let sccs = tarjan_scc(&nodes, &adj);
        assert_eq!(sccs, vec![vec![b("A")]]);
    }
}
