//! Block Registry: the catalog of block definitions.
//!
//! Registration is the only side-effecting operation and is idempotent —
//! registering the same type name twice replaces the previous definition.
//! The registry itself is process-lived and must be populated before any
//! compile call; queries return references bounded by the registry's own
//! lifetime.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::LoweringError;
use crate::ids::PortId;
use crate::ir::{LowerContext, LowerOutputs};
use crate::types::CanonicalType;

/// Whether a block is a leaf primitive or a composite expanding into other
/// blocks via a [`crate::ir::LowerBuilder`]-scoped sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockForm {
    Primitive,
    Composite,
}

/// What side effects a block's lowering is allowed to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Pure,
    State,
    Io,
    Render,
}

/// How a block's output cardinality relates to its input cardinalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityMode {
    /// Output cardinality is the join of input cardinalities.
    Preserve,
    /// The block names its output cardinality explicitly (e.g. `Array`).
    Override,
}

/// Cardinality policy declared by a block definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityPolicy {
    pub mode: CardinalityMode,
    pub lane_coupling: crate::types::LaneCoupling,
    pub allow_zip_broadcast: bool,
}

impl CardinalityPolicy {
    /// The common case: preserve cardinality, lane-local, no broadcast.
    #[must_use]
    pub const fn pointwise() -> Self {
        Self {
            mode: CardinalityMode::Preserve,
            lane_coupling: crate::types::LaneCoupling::LaneLocal,
            allow_zip_broadcast: false,
        }
    }
}

/// Declared shape of one input port: its type template, default-source
/// policy, and whether it is author-exposed.
#[derive(Debug, Clone)]
pub struct InputPortDecl {
    pub port: PortId,
    pub type_template: CanonicalType,
    pub default_source: Option<DefaultSourceKind>,
    pub exposed_as_port: bool,
}

/// The kind of synthetic `DefaultSource` block the normalizer inserts for
/// an unconnected, exposed input port with a declared default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultSourceKind {
    ConstFloat,
    ConstInt,
    ConstBool,
    RainbowColor,
    EventNever,
}

/// Declared shape of one output port.
#[derive(Debug, Clone)]
pub struct OutputPortDecl {
    pub port: PortId,
    pub type_template: CanonicalType,
}

/// A pure function: lowering context in, outputs + effects out. Blocks
/// register this closure once; the orchestrator invokes it once per block
/// per compile, in topological order.
pub type LowerFn = Box<dyn Fn(&LowerContext<'_>, &mut crate::ir::LowerBuilder<'_>) -> Result<LowerOutputs, LoweringError> + Send + Sync>;

/// A catalog entry describing one block type.
pub struct BlockDefinition {
    pub type_name: String,
    pub inputs: Vec<InputPortDecl>,
    pub outputs: Vec<OutputPortDecl>,
    pub form: BlockForm,
    pub capability: Capability,
    pub cardinality_policy: CardinalityPolicy,
    pub lower: LowerFn,
}

impl fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDefinition")
            .field("type_name", &self.type_name)
            .field("form", &self.form)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Catalog of block definitions, keyed by type name. Process-lived;
/// populated before compile, read-only during compile.
#[derive(Default)]
pub struct BlockRegistry {
    definitions: BTreeMap<String, BlockDefinition>,
}

impl BlockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a block definition, replacing any prior registration under
    /// the same type name (idempotent by construction).
    pub fn register(&mut self, def: BlockDefinition) {
        self.definitions.insert(def.type_name.clone(), def);
    }

    /// Looks up a block definition by type name.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&BlockDefinition> {
        self.definitions.get(type_name)
    }

    /// `true` if a block type is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.definitions.contains_key(type_name)
    }

    /// Every registered block type name, lexically ordered.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }
}
