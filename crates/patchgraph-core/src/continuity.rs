//! Continuity / State Migration: carries runtime state across a successful
//! recompile, keyed by [`StableStateId`] rather than by the [`StateSlot`]
//! indices a fresh compile re-mints from scratch.
//!
//! Failure is never fatal here: anything that cannot be migrated falls back
//! to its declared initial value and is reported as `W_FLAG_DOWNGRADED`,
//! never as a compile error.

use std::collections::BTreeMap;

use crate::errors::{Diagnostic, DiagnosticCode, Domain, Severity, TargetRef};
use crate::ids::{InstanceId, StableStateId};
use crate::ir::ConstValue;
use crate::schedule::{InstanceDecl, StateMapping, TimeModel};
use crate::session::ProgramState;

/// Snapshot of prior-compile state, keyed by the stable identity that
/// survives a recompile. Rebuilt wholesale after every successful migration
/// (dropping entries for instances/state keys that no longer exist prunes
/// itself automatically).
#[derive(Debug, Clone, Default)]
pub struct ContinuityStore {
    primitive_values: BTreeMap<StableStateId, ConstValue>,
    /// Field (per-lane) values alongside the stride they were recorded
    /// under, so a stride change can be detected as incompatible.
    field_values: BTreeMap<StableStateId, (u32, Vec<ConstValue>)>,
    /// Per-rail phase offsets (radians-equivalent turns, in the rail's own
    /// unit), reconciled across time-model changes.
    phase_offsets: BTreeMap<String, f64>,
}

impl ContinuityStore {
    /// An empty store, the continuity state for a session's first compile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites this store's per-rail phase offsets wholesale, as computed
    /// by [`reconcile_all_phase_offsets`] at swap time.
    pub fn set_phase_offsets(&mut self, offsets: BTreeMap<String, f64>) {
        self.phase_offsets = offsets;
    }
}

/// Outcome of one migration pass: the rebuilt [`ProgramState`], the store to
/// carry into the next compile, and any `W_FLAG_DOWNGRADED` diagnostics.
pub struct MigrationOutcome {
    pub program_state: ProgramState,
    pub store: ContinuityStore,
    pub diagnostics: Vec<Diagnostic>,
}

/// Migrates `old` into a fresh [`ProgramState`] for `new_mappings`, given the
/// freshly compiled program's instance table (for field lane counts).
#[must_use]
pub fn migrate(
    old: &ContinuityStore,
    new_mappings: &[StateMapping],
    instances: &BTreeMap<InstanceId, InstanceDecl>,
    revision: u64,
) -> MigrationOutcome {
    let mut program_state = ProgramState::default();
    let mut store = ContinuityStore::default();
    let mut diagnostics = Vec::new();

    for mapping in new_mappings {
        match mapping {
            StateMapping::Primitive { key, slot, initial_value } => {
                let value = old.primitive_values.get(key).cloned().unwrap_or_else(|| initial_value.clone());
                program_state.primitive_values.insert(*slot, value.clone());
                store.primitive_values.insert(key.clone(), value);
            }
            StateMapping::Field { key, slot, stride, instance_id, initial_value } => {
                let lane_count = instances.get(instance_id).map_or(0, |decl| decl.count);
                let (values, downgraded) = migrate_field(old.field_values.get(key), *stride, lane_count, initial_value);
                if downgraded {
                    diagnostics.push(flag_downgraded(key, revision));
                }
                program_state.field_values.insert(*slot, values.clone());
                store.field_values.insert(key.clone(), (*stride, values));
            }
        }
    }

    store.phase_offsets = old.phase_offsets.clone();

    MigrationOutcome { program_state, store, diagnostics }
}

/// Resizes/copies a field's prior values onto the new lane count when the
/// stride is unchanged; any stride mismatch is treated as an incompatible
/// layout and falls back to `lane_count` copies of `initial`.
fn migrate_field(
    old: Option<&(u32, Vec<ConstValue>)>,
    new_stride: u32,
    lane_count: u32,
    initial: &ConstValue,
) -> (Vec<ConstValue>, bool) {
    match old {
        Some((old_stride, values)) if *old_stride == new_stride => {
            let mut resized = values.clone();
            resized.resize(lane_count as usize, initial.clone());
            (resized, false)
        }
        Some(_) => (vec![initial.clone(); lane_count as usize], true),
        None => (vec![initial.clone(); lane_count as usize], false),
    }
}

fn flag_downgraded(key: &StableStateId, revision: u64) -> Diagnostic {
    let target = TargetRef::GraphSpan { block_ids: Vec::new(), span_kind: Some("continuityDowngrade".to_owned()) };
    let code = DiagnosticCode::WFlagDowngraded;
    let id = crate::errors::generate_diagnostic_id(code, &target, revision, Some(&key.0));
    Diagnostic {
        id,
        code,
        message: format!("state {key} could not be migrated (stride mismatch); reset to initial value"),
        primary_target: target,
        severity: Severity::Warn,
        domain: Domain::Backend,
    }
}

/// Recomputes a rail's phase offset so that the monotonic clock value at
/// swap time maps to the same phase output under the new period as it did
/// under the old one. A non-positive period leaves the offset at zero
/// (an offset is meaningless without a period to wrap against).
#[must_use]
pub fn reconcile_phase_offset(old_model: &TimeModel, new_model: &TimeModel, old_offset: f64, swap_time_ms: f64) -> f64 {
    if old_model.period_ms <= 0.0 || new_model.period_ms <= 0.0 {
        return 0.0;
    }
    let old_phase = ((swap_time_ms + old_offset) / old_model.period_ms).rem_euclid(1.0);
    old_phase * new_model.period_ms - swap_time_ms
}

/// Reconciles every rail named in `new_model` against `old_model`, carrying
/// forward unaffected rails verbatim and recomputing changed ones.
#[must_use]
pub fn reconcile_all_phase_offsets(store: &ContinuityStore, old_model: &TimeModel, new_model: &TimeModel, swap_time_ms: f64) -> BTreeMap<String, f64> {
    let mut offsets = BTreeMap::new();
    for rail in &new_model.rails {
        let old_offset = store.phase_offsets.get(rail).copied().unwrap_or(0.0);
        let offset = if (old_model.period_ms - new_model.period_ms).abs() < f64::EPSILON {
            old_offset
        } else {
            reconcile_phase_offset(old_model, new_model, old_offset, swap_time_ms)
        };
        offsets.insert(rail.clone(), offset);
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StateSlot;

    #[test]
    fn primitive_state_carries_forward_by_key() {
        let mut old = ContinuityStore::new();
        old.primitive_values.insert(StableStateId::new("p0", "phase"), ConstValue::Float(0.35));

        let mappings = vec![StateMapping::Primitive {
            key: StableStateId::new("p0", "phase"),
            slot: StateSlot(0),
            initial_value: ConstValue::Float(0.0),
        }];
        let outcome = migrate(&old, &mappings, &BTreeMap::new(), 1);
        assert_eq!(outcome.program_state.primitive_values.get(&StateSlot(0)), Some(&ConstValue::Float(0.35)));
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn primitive_state_falls_back_to_initial_when_absent() {
        let old = ContinuityStore::new();
        let mappings = vec![StateMapping::Primitive {
            key: StableStateId::new("p0", "phase"),
            slot: StateSlot(0),
            initial_value: ConstValue::Float(0.25),
        }];
        let outcome = migrate(&old, &mappings, &BTreeMap::new(), 1);
        assert_eq!(outcome.program_state.primitive_values.get(&StateSlot(0)), Some(&ConstValue::Float(0.25)));
    }

    #[test]
    fn field_stride_mismatch_downgrades_and_resets() {
        let mut old = ContinuityStore::new();
        old.field_values.insert(StableStateId::new("a0", "prev"), (1, vec![ConstValue::Float(1.0), ConstValue::Float(2.0)]));

        let mut instances = BTreeMap::new();
        instances.insert(InstanceId(0), InstanceDecl { instance_id: InstanceId(0), count: 2, max_count: 4, stride: 2 });

        let mappings = vec![StateMapping::Field {
            key: StableStateId::new("a0", "prev"),
            slot: StateSlot(0),
            stride: 2,
            instance_id: InstanceId(0),
            initial_value: ConstValue::Float(0.0),
        }];
        let outcome = migrate(&old, &mappings, &instances, 1);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].code, DiagnosticCode::WFlagDowngraded);
        assert_eq!(outcome.program_state.field_values.get(&StateSlot(0)), Some(&vec![ConstValue::Float(0.0), ConstValue::Float(0.0)]));
    }

    #[test]
    fn field_state_resizes_on_matching_stride() {
        let mut old = ContinuityStore::new();
        old.field_values.insert(StableStateId::new("a0", "prev"), (1, vec![ConstValue::Float(1.0)]));

        let mut instances = BTreeMap::new();
        instances.insert(InstanceId(0), InstanceDecl { instance_id: InstanceId(0), count: 3, max_count: 4, stride: 1 });

        let mappings = vec![StateMapping::Field {
            key: StableStateId::new("a0", "prev"),
            slot: StateSlot(0),
            stride: 1,
            instance_id: InstanceId(0),
            initial_value: ConstValue::Float(9.0),
        }];
        let outcome = migrate(&old, &mappings, &instances, 1);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(
            outcome.program_state.field_values.get(&StateSlot(0)),
            Some(&vec![ConstValue::Float(1.0), ConstValue::Float(9.0), ConstValue::Float(9.0)])
        );
    }

    #[test]
    fn phase_offset_reconciles_across_period_change() {
        let old_model = TimeModel { period_ms: 1000.0, rails: vec!["phaseA".to_owned()], reset_epoch_ms: 0.0 };
        let new_model = TimeModel { period_ms: 500.0, rails: vec!["phaseA".to_owned()], reset_epoch_ms: 0.0 };
        let offset = reconcile_phase_offset(&old_model, &new_model, 0.0, 250.0);
        // old phase at t=250 with period 1000, offset 0 is 0.25; new period
        // 500 should reproduce the same 0.25 phase at the same instant.
        let new_phase = ((250.0 + offset) / 500.0).rem_euclid(1.0);
        assert!((new_phase - 0.25).abs() < 1e-9);
    }
}
