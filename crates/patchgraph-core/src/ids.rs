//! Newtype identifiers.
//!
//! Every id that crosses a module boundary is a distinct type so that a
//! `PortId` and a `BlockId` can never be swapped at a call site and still
//! type-check. Author-facing ids (`BlockId`, `PortId`, `EdgeId`) wrap the
//! opaque strings the editor assigns; arena ids (`ValueExprId`, `ValueSlot`,
//! `StateSlot`, `InstanceId`) are `u32` indices into flat arenas, per the
//! arena-of-nodes redesign note.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque, author-assigned identifier for a block instance in a [`Patch`](crate::model::Patch).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlockId(pub String);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, block-type-declared identifier for an input or output port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PortId(pub String);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, author-assigned identifier for an edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EdgeId(pub String);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arena index of an `Array`-like block's instance declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Arena index of a node in the `ValueExpr` DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ValueExprId(pub u32);

/// Opaque index into the runtime's flat value-slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ValueSlot(pub u32);

/// Opaque index into the runtime's flat state-slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct StateSlot(pub u32);

/// Deterministic identifier for persistent state, derived from
/// `(blockInstancePath, roleTag)`. Stable across recompiles so that
/// continuity migration can key on identity rather than position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct StableStateId(pub String);

impl StableStateId {
    /// Builds a stable state id from a block's instance path and a role tag
    /// naming the piece of state (e.g. `"phase"`, `"prev"`).
    #[must_use]
    pub fn new(block_instance_path: &str, role_tag: &str) -> Self {
        Self(format!("{block_instance_path}#{role_tag}"))
    }
}

impl fmt::Display for StableStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Freshly-minted payload type variable. Globally unique for the process
/// lifetime; never reused, never compared across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PayloadVar(pub u32);

/// Freshly-minted unit type variable, analogous to [`PayloadVar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct UnitVar(pub u32);

static NEXT_PAYLOAD_VAR: AtomicU32 = AtomicU32::new(0);
static NEXT_UNIT_VAR: AtomicU32 = AtomicU32::new(0);

/// Mints a fresh, process-unique [`PayloadVar`].
#[must_use]
pub fn fresh_payload_var() -> PayloadVar {
    PayloadVar(NEXT_PAYLOAD_VAR.fetch_add(1, Ordering::Relaxed))
}

/// Mints a fresh, process-unique [`UnitVar`].
#[must_use]
pub fn fresh_unit_var() -> UnitVar {
    UnitVar(NEXT_UNIT_VAR.fetch_add(1, Ordering::Relaxed))
}
