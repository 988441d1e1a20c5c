//! Diagnostics Hub: the single subscriber every diagnostic-producing event
//! funnels through before it reaches a client.
//!
//! Five lifecycle events feed the hub:
//! - `GraphCommitted` — fast authoring validators run synchronously, replace
//!   the prior authoring snapshot wholesale.
//! - `CompileBegin` — marks a revision pending; does not yet touch the
//!   diagnostic tables.
//! - `CompileEnd` — replaces that revision's compile snapshot wholesale
//!   (never merged with the previous compile's diagnostics for the same
//!   revision — a partial re-run must not leave stale entries behind).
//! - `ProgramSwapped` — advances `active_revision` once a compiled program
//!   goes live.
//! - `RuntimeHealthSnapshot` — applies a [`RuntimeDiagnosticsDelta`] to the
//!   runtime table: `raised` entries merge in by id (last write wins),
//!   `resolved` ids are removed. The one event that does NOT replace
//!   wholesale.

use std::collections::BTreeMap;

use crate::errors::{Diagnostic, DiagnosticCode, Domain, Severity, TargetRef};
use crate::ids::BlockId;
use crate::model::Patch;
use crate::normalize::connected_block_ids;
use crate::registry::BlockRegistry;

/// The payload of a `RuntimeHealthSnapshot` event: diagnostics newly raised
/// by the running program, and ids of previously-raised diagnostics that no
/// longer apply. Mirrors the external event's optional `diagnosticsDelta
/// { raised[], resolved[] }` field.
#[derive(Debug, Clone, Default)]
pub struct RuntimeDiagnosticsDelta {
    pub raised: Vec<Diagnostic>,
    pub resolved: Vec<String>,
}

impl RuntimeDiagnosticsDelta {
    /// A delta that only raises diagnostics, never resolves any — the shape
    /// every internal caller other than a runtime health event produces.
    #[must_use]
    pub fn raised_only(raised: Vec<Diagnostic>) -> Self {
        Self { raised, resolved: Vec::new() }
    }
}

/// Central store and query surface for every diagnostic a compile pipeline
/// or the running program can produce.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsHub {
    /// Authoring-time validator output, replaced wholesale on every
    /// `GraphCommitted`.
    authoring_snapshot: Vec<Diagnostic>,
    /// One full diagnostic set per attempted compile revision.
    compile_snapshots: BTreeMap<u64, Vec<Diagnostic>>,
    /// Merged-by-id runtime diagnostics, keyed by [`Diagnostic::id`].
    runtime_diagnostics: BTreeMap<String, Diagnostic>,
    /// The revision of the program currently live, if any has swapped in.
    active_revision: Option<u64>,
    /// The most recent revision a `CompileBegin` was observed for but no
    /// `ProgramSwapped` has yet followed — used as the fallback for
    /// `get_active` while a compile is in flight.
    pending_compile_revision: Option<u64>,
}

impl DiagnosticsHub {
    /// A hub with nothing recorded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `GraphCommitted`: run the fast authoring validators over `patch` and
    /// replace the authoring snapshot with their output.
    pub fn on_graph_committed(&mut self, patch: &Patch, registry: &BlockRegistry) {
        self.authoring_snapshot = authoring_diagnostics(patch, registry);
    }

    /// `CompileBegin`: record that `revision` is now in flight.
    pub fn on_compile_begin(&mut self, revision: u64) {
        self.pending_compile_revision = Some(revision);
    }

    /// `CompileEnd`: replace `revision`'s compile snapshot wholesale.
    pub fn on_compile_end(&mut self, revision: u64, diagnostics: Vec<Diagnostic>) {
        self.compile_snapshots.insert(revision, diagnostics);
        if self.pending_compile_revision == Some(revision) {
            self.pending_compile_revision = None;
        }
    }

    /// `ProgramSwapped`: `revision`'s compiled program is now live.
    pub fn on_program_swapped(&mut self, revision: u64) {
        self.active_revision = Some(revision);
    }

    /// `RuntimeHealthSnapshot`: applies `delta` to the runtime table —
    /// `raised` diagnostics are inserted/overwritten by id, then `resolved`
    /// ids are removed. Order matters only if the same id appears in both
    /// lists, in which case the resolution wins (the id is removed).
    pub fn on_runtime_health_snapshot(&mut self, delta: RuntimeDiagnosticsDelta) {
        for diag in delta.raised {
            self.runtime_diagnostics.insert(diag.id.clone(), diag);
        }
        for id in delta.resolved {
            self.runtime_diagnostics.remove(&id);
        }
    }

    /// The diagnostics a client should currently show: the authoring
    /// snapshot, the compile snapshot for whichever revision is live (or
    /// failing that, the pending or latest-known revision), and every
    /// runtime diagnostic, deduplicated by id (compile wins ties, since it
    /// supersedes what produced the runtime entry). Insertion order is
    /// runtime, then authoring, then compile last, so a compile diagnostic
    /// always overwrites an authoring or runtime entry sharing its id rather
    /// than the reverse.
    #[must_use]
    pub fn get_active(&self) -> Vec<Diagnostic> {
        let revision = self
            .active_revision
            .or(self.pending_compile_revision)
            .or_else(|| self.compile_snapshots.keys().next_back().copied());

        let mut by_id: BTreeMap<String, Diagnostic> = BTreeMap::new();
        for diag in &self.runtime_diagnostics {
            by_id.insert(diag.0.clone(), diag.1.clone());
        }
        for diag in &self.authoring_snapshot {
            by_id.insert(diag.id.clone(), diag.clone());
        }
        if let Some(rev) = revision {
            if let Some(snapshot) = self.compile_snapshots.get(&rev) {
                for diag in snapshot {
                    by_id.insert(diag.id.clone(), diag.clone());
                }
            }
        }
        by_id.into_values().collect()
    }

    /// A specific revision's recorded compile diagnostics, if any compile
    /// was ever run for it.
    #[must_use]
    pub fn get_by_revision(&self, revision: u64) -> &[Diagnostic] {
        self.compile_snapshots.get(&revision).map_or(&[], Vec::as_slice)
    }

    /// Every currently-active diagnostic from the given domain.
    #[must_use]
    pub fn get_by_domain(&self, domain: Domain) -> Vec<Diagnostic> {
        self.get_active().into_iter().filter(|d| d.domain == domain).collect()
    }

    /// Every currently-active diagnostic at the given severity.
    #[must_use]
    pub fn get_by_severity(&self, severity: Severity) -> Vec<Diagnostic> {
        self.get_active().into_iter().filter(|d| d.severity == severity).collect()
    }
}

/// Primary output ports a block author expects something downstream to read;
/// an enabled outgoing edge missing from all of these triggers
/// `W_GRAPH_UNUSED_OUTPUT`.
const PRIMARY_OUTPUT_NAMES: [&str; 3] = ["out", "value", "output"];

/// Runs the fast, synchronous authoring validators: exactly-one-time-root
/// (already enforced by [`crate::normalize::normalize`] but re-surfaced here
/// so authoring feedback doesn't wait on a full compile), disconnected
/// blocks, and unused primary outputs.
fn authoring_diagnostics(patch: &Patch, registry: &BlockRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let revision = 0;

    let time_roots: Vec<BlockId> = patch
        .blocks
        .values()
        .filter(|b| b.block_type == crate::normalize::TIME_ROOT_BLOCK_TYPE)
        .map(|b| b.id.clone())
        .collect();
    if time_roots.is_empty() {
        let target = TargetRef::GraphSpan { block_ids: Vec::new(), span_kind: None };
        diagnostics.push(Diagnostic {
            id: crate::errors::generate_diagnostic_id(DiagnosticCode::ETimeRootMissing, &target, revision, None),
            code: DiagnosticCode::ETimeRootMissing,
            message: "no time-root block present".to_owned(),
            primary_target: target,
            severity: Severity::Error,
            domain: Domain::Authoring,
        });
    } else if time_roots.len() > 1 {
        let mut sorted = time_roots;
        sorted.sort();
        let target = TargetRef::GraphSpan {
            block_ids: sorted.clone(),
            span_kind: Some("multipleTimeRoots".to_owned()),
        };
        diagnostics.push(Diagnostic {
            id: crate::errors::generate_diagnostic_id(DiagnosticCode::ETimeRootMultiple, &target, revision, None),
            code: DiagnosticCode::ETimeRootMultiple,
            message: "multiple time-root blocks present".to_owned(),
            primary_target: target,
            severity: Severity::Error,
            domain: Domain::Authoring,
        });
    }

    let connected = connected_block_ids(patch);
    for block in patch.blocks.values() {
        if block.role != crate::model::BlockRole::User {
            continue;
        }
        if block.block_type == crate::normalize::TIME_ROOT_BLOCK_TYPE {
            // Time flows through rails (`b.time("dt", ...)`), never through
            // edges, so the time-root is never an edge endpoint and would
            // otherwise always look disconnected.
            continue;
        }
        if !connected.contains(&block.id) && !(block.input_ports.is_empty() && block.output_ports.is_empty()) {
            let target = TargetRef::Block { block: block.id.clone() };
            diagnostics.push(Diagnostic {
                id: crate::errors::generate_diagnostic_id(DiagnosticCode::WGraphDisconnectedBlock, &target, revision, None),
                code: DiagnosticCode::WGraphDisconnectedBlock,
                message: format!("block {} has no enabled edge touching it", block.id),
                primary_target: target,
                severity: Severity::Warn,
                domain: Domain::Authoring,
            });
        }
    }

    for block in patch.blocks.values() {
        let Some(def) = registry.get(&block.block_type) else {
            continue;
        };
        for output in &def.outputs {
            if !PRIMARY_OUTPUT_NAMES.contains(&output.port.0.as_str()) {
                continue;
            }
            let has_outgoing = patch
                .edges
                .iter()
                .any(|e| e.enabled && e.from.0 == block.id && e.from.1 == output.port);
            if has_outgoing {
                continue;
            }
            let target = TargetRef::Port { block: block.id.clone(), port: output.port.clone() };
            diagnostics.push(Diagnostic {
                id: crate::errors::generate_diagnostic_id(DiagnosticCode::WGraphUnusedOutput, &target, revision, None),
                code: DiagnosticCode::WGraphUnusedOutput,
                message: format!("output {}:{} has no outgoing enabled edge", block.id, output.port),
                primary_target: target,
                severity: Severity::Warn,
                domain: Domain::Authoring,
            });
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::register_builtins;
    use crate::ids::PortId;
    use crate::model::Block;

    fn registry() -> BlockRegistry {
        let mut r = BlockRegistry::default();
        register_builtins(&mut r);
        r
    }

    fn time_root_block(id: &str) -> Block {
        Block {
            id: BlockId(id.to_owned()),
            block_type: crate::normalize::TIME_ROOT_BLOCK_TYPE.to_owned(),
            params: Default::default(),
            display_name: None,
            role: crate::model::BlockRole::User,
            input_ports: Vec::new(),
            output_ports: vec![PortId("dt".to_owned()), PortId("phaseA".to_owned())],
        }
    }

    #[test]
    fn missing_time_root_is_flagged_authoring_error() {
        let patch = Patch::default();
        let mut hub = DiagnosticsHub::new();
        hub.on_graph_committed(&patch, &registry());
        let active = hub.get_active();
        assert!(active.iter().any(|d| d.code == DiagnosticCode::ETimeRootMissing));
    }

    #[test]
    fn single_time_root_produces_no_time_root_diagnostic() {
        let mut patch = Patch::default();
        patch.blocks.insert(BlockId("t0".to_owned()), time_root_block("t0"));
        let mut hub = DiagnosticsHub::new();
        hub.on_graph_committed(&patch, &registry());
        let active = hub.get_active();
        assert!(!active.iter().any(|d| d.code == DiagnosticCode::ETimeRootMissing));
    }

    /// The time-root is read by downstream blocks through a time rail
    /// (`LowerBuilder::time`), never through an edge, so it never appears
    /// in `connected_block_ids`. A lone, otherwise-unconnected time root
    /// must not be flagged `W_GRAPH_DISCONNECTED_BLOCK`.
    #[test]
    fn lone_time_root_is_not_flagged_disconnected() {
        let mut patch = Patch::default();
        patch.blocks.insert(BlockId("t0".to_owned()), time_root_block("t0"));
        let mut hub = DiagnosticsHub::new();
        hub.on_graph_committed(&patch, &registry());
        let active = hub.get_active();
        assert!(!active.iter().any(|d| d.code == DiagnosticCode::WGraphDisconnectedBlock));
    }

    #[test]
    fn compile_end_replaces_rather_than_merges() {
        let mut hub = DiagnosticsHub::new();
        let target = TargetRef::Block { block: BlockId("b0".to_owned()) };
        let stale = Diagnostic {
            id: "E_UNIT_MISMATCH:block:b0:rev1".to_owned(),
            code: DiagnosticCode::EUnitMismatch,
            message: "stale".to_owned(),
            primary_target: target.clone(),
            severity: Severity::Error,
            domain: Domain::Frontend,
        };
        hub.on_compile_end(1, vec![stale]);
        hub.on_compile_end(1, Vec::new());
        assert!(hub.get_by_revision(1).is_empty());
    }

    #[test]
    fn runtime_snapshot_merges_by_id() {
        let mut hub = DiagnosticsHub::new();
        let target = TargetRef::Block { block: BlockId("b0".to_owned()) };
        let d1 = Diagnostic {
            id: "r1".to_owned(),
            code: DiagnosticCode::WBlockUnreachableError,
            message: "first".to_owned(),
            primary_target: target.clone(),
            severity: Severity::Warn,
            domain: Domain::Runtime,
        };
        let d2 = Diagnostic {
            id: "r1".to_owned(),
            code: DiagnosticCode::WBlockUnreachableError,
            message: "second".to_owned(),
            primary_target: target,
            severity: Severity::Warn,
            domain: Domain::Runtime,
        };
        hub.on_runtime_health_snapshot(RuntimeDiagnosticsDelta::raised_only(vec![d1]));
        hub.on_runtime_health_snapshot(RuntimeDiagnosticsDelta::raised_only(vec![d2]));
        let active = hub.get_active();
        let matched: Vec<_> = active.iter().filter(|d| d.id == "r1").collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].message, "second");
    }

    #[test]
    fn runtime_snapshot_resolved_id_is_removed() {
        let mut hub = DiagnosticsHub::new();
        let target = TargetRef::Block { block: BlockId("b0".to_owned()) };
        let d1 = Diagnostic {
            id: "r1".to_owned(),
            code: DiagnosticCode::WBlockUnreachableError,
            message: "first".to_owned(),
            primary_target: target,
            severity: Severity::Warn,
            domain: Domain::Runtime,
        };
        hub.on_runtime_health_snapshot(RuntimeDiagnosticsDelta::raised_only(vec![d1]));
        assert!(hub.get_active().iter().any(|d| d.id == "r1"));
        hub.on_runtime_health_snapshot(RuntimeDiagnosticsDelta {
            raised: Vec::new(),
            resolved: vec!["r1".to_owned()],
        });
        assert!(!hub.get_active().iter().any(|d| d.id == "r1"));
    }

    #[test]
    fn compile_diagnostic_wins_over_authoring_on_id_collision_at_revision_zero() {
        let mut hub = DiagnosticsHub::new();
        let patch = Patch::default();
        hub.on_graph_committed(&patch, &registry());

        let target = TargetRef::GraphSpan { block_ids: Vec::new(), span_kind: None };
        let shared_id = crate::errors::generate_diagnostic_id(DiagnosticCode::ETimeRootMissing, &target, 0, None);
        assert!(hub.get_active().iter().any(|d| d.id == shared_id), "authoring diagnostic should be present first");

        let compile_diag = Diagnostic {
            id: shared_id.clone(),
            code: DiagnosticCode::ETimeRootMissing,
            message: "compile-stage: no time-root block present".to_owned(),
            primary_target: target,
            severity: Severity::Error,
            domain: Domain::Frontend,
        };
        hub.on_compile_begin(0);
        hub.on_compile_end(0, vec![compile_diag]);

        let active = hub.get_active();
        let winner = active.iter().find(|d| d.id == shared_id).expect("diagnostic should still be present");
        assert_eq!(winner.domain, Domain::Frontend, "compile must win the collision, not authoring");
        assert_eq!(winner.message, "compile-stage: no time-root block present");
    }

    #[test]
    fn get_active_falls_back_to_pending_then_latest_revision() {
        let mut hub = DiagnosticsHub::new();
        let target = TargetRef::Block { block: BlockId("b0".to_owned()) };
        let diag = Diagnostic {
            id: "E_UNIT_MISMATCH:block:b0:rev2".to_owned(),
            code: DiagnosticCode::EUnitMismatch,
            message: "m".to_owned(),
            primary_target: target,
            severity: Severity::Error,
            domain: Domain::Frontend,
        };
        hub.on_compile_begin(2);
        hub.on_compile_end(2, vec![diag]);
        let active = hub.get_active();
        assert!(active.iter().any(|d| d.id == "E_UNIT_MISMATCH:block:b0:rev2"));
    }
}
