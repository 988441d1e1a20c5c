//! Authored input data model: [`Patch`], [`Block`], [`Edge`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{BlockId, EdgeId, PortId};

/// The role a block plays in the authored graph (plain user block vs. a
/// normalizer-synthesized default source, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockRole {
    User,
    DefaultSource,
}

/// An authored block instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: BlockRole,
    #[serde(default)]
    pub input_ports: Vec<PortId>,
    #[serde(default)]
    pub output_ports: Vec<PortId>,
}

impl Default for BlockRole {
    fn default() -> Self {
        Self::User
    }
}

/// A directed, typed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: (BlockId, PortId),
    pub to: (BlockId, PortId),
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Breaks ties among multiple inputs to the same port (combine modes).
    #[serde(default)]
    pub sort_key: i64,
    #[serde(default)]
    pub role: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// The authored graph of blocks and edges, as received from the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patch {
    pub blocks: BTreeMap<BlockId, Block>,
    pub edges: Vec<Edge>,
}

impl Patch {
    /// Returns the edges sorted by `(to.blockId, sortKey, from.blockId)`,
    /// the order the normalizer canonicalizes to.
    #[must_use]
    pub fn edges_sorted_for_determinism(&self) -> Vec<Edge> {
        let mut edges = self.edges.clone();
        edges.sort_by(|a, b| {
            (&a.to.0, a.sort_key, &a.from.0).cmp(&(&b.to.0, b.sort_key, &b.from.0))
        });
        edges
    }

    /// All enabled edges whose `to` names the given block and port.
    #[must_use]
    pub fn incoming_enabled(&self, block: &BlockId, port: &PortId) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.enabled && &e.to.0 == block && &e.to.1 == port)
            .collect()
    }
}
