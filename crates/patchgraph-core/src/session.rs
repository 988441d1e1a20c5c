//! Session-lived state: what survives across recompiles of the same patch,
//! as opposed to [`crate::schedule::CompiledProgram`] which is replaced
//! wholesale on every successful compile.

use std::collections::BTreeMap;

use crate::continuity::ContinuityStore;
use crate::ids::{StateSlot, ValueSlot};
use crate::ir::ConstValue;
use crate::schedule::TimeModel;

/// Time model plus continuity mappings. Outlives individual compiles; only
/// the compile orchestrator mutates it, and only during a swap.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub time_model: TimeModel,
    pub continuity: ContinuityStore,
}

impl SessionState {
    /// A fresh session: the given starting time model, no prior continuity.
    #[must_use]
    pub fn new(time_model: TimeModel) -> Self {
        Self { time_model, continuity: ContinuityStore::new() }
    }
}

/// Slot/state/event arrays for the currently active program. Rebuilt on
/// every compile; migrated from the prior `ProgramState` via
/// [`crate::continuity::migrate`] wherever stable ids let it.
#[derive(Debug, Clone, Default)]
pub struct ProgramState {
    pub primitive_values: BTreeMap<StateSlot, ConstValue>,
    pub field_values: BTreeMap<StateSlot, Vec<ConstValue>>,
    /// Value-slot contents materialized so far this tick, for debug
    /// inspection; the runtime executor (out of scope here) owns the real
    /// hot-path arena.
    pub value_preview: BTreeMap<ValueSlot, ConstValue>,
}
