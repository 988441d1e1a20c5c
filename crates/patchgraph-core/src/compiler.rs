//! Compile orchestrator: the `Patch -> Normalizer -> Inference -> (per
//! block) IR Builder -> Binder -> Scheduler -> CompiledProgram` pipeline,
//! plus the `Engine` wrapper that drives the five-event diagnostics
//! lifecycle, continuity migration, and fast-path patching across repeated
//! recompiles of the same session.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info_span};

use crate::bind::{apply_binding, bind, BindInputs, SlotBuilder};
use crate::continuity;
use crate::diagnostics::{DiagnosticsHub, RuntimeDiagnosticsDelta};
use crate::errors::{bind_diagnostic, frontend_diagnostic, infer_diagnostic, lowering_diagnostic, BindError, Diagnostic, LoweringError};
use crate::fastpath::{self, PatchChange};
use crate::ids::{BlockId, InstanceId, PortId, StableStateId, StateSlot, ValueSlot};
use crate::infer::{infer, FrontendResult};
use crate::ir::{ConstValue, LowerBuilder, LowerContext, LowerEffects, LowerOutputs, ValueExpr, ValueExprArena, ValueRef};
use crate::model::Patch;
use crate::normalize::{normalize, TIME_ROOT_BLOCK_TYPE};
use crate::registry::{BlockRegistry, Capability, CardinalityMode};
use crate::schedule::{
    CompiledProgram, ConstProvenance, DebugIndex, InstanceCountProvenance, InstanceDecl, ScheduleIr, ScheduledStep,
    SlotMeta, StateMapping, TimeModel,
};
use crate::session::SessionState;
use crate::types::{Cardinality, CanonicalType, Payload, PayloadTerm};

/// Result of one [`compile`] call: the assembled program on success, and
/// every diagnostic the pipeline produced along the way (structural,
/// semantic, or lowering/binding failures alike).
#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    pub program: Option<CompiledProgram>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the full pipeline over `patch` once, producing a [`CompileOutcome`].
/// Pure: no session state, no diagnostics hub, no continuity — callers that
/// need those wrap this in [`Engine`].
#[must_use]
pub fn compile(patch: &Patch, registry: &BlockRegistry, revision: u64) -> CompileOutcome {
    let span = info_span!("compile", revision);
    let _entered = span.enter();

    let norm = normalize(patch, registry);
    let mut diagnostics: Vec<Diagnostic> = norm.errors.iter().map(|e| frontend_diagnostic(e, revision)).collect();
    debug!(errors = norm.errors.len(), "normalize complete");

    let frontend = infer(&norm.patch, registry);
    diagnostics.extend(frontend.errors.iter().map(|e| infer_diagnostic(e, revision)));
    debug!(errors = frontend.errors.len(), backend_ready = frontend.backend_ready, "infer complete");

    let backend_ready = frontend.backend_ready && norm.errors.is_empty();
    if !backend_ready {
        return CompileOutcome { program: None, diagnostics };
    }

    let ir = build_ir(&norm.patch, registry, &frontend);
    if !ir.errors.is_empty() {
        for (block, err) in &ir.errors {
            diagnostics.push(lowering_diagnostic(err, block, revision));
        }
        return CompileOutcome { program: None, diagnostics };
    }
    debug!(nodes = ir.arena.nodes.len(), "ir build complete");

    let built = bind_and_schedule(&norm.patch, registry, &frontend, ir);
    diagnostics.extend(built.bind_errors.iter().map(|e| bind_diagnostic(e, revision)));
    if !built.bind_errors.is_empty() {
        return CompileOutcome { program: None, diagnostics };
    }

    let program = assemble_program(built);
    debug!(steps = program.schedule.steps.len(), "bind/schedule complete");
    CompileOutcome { program: Some(program), diagnostics }
}

/// Output of the IR-building stage: the shared node arena, each block's
/// resolved output refs, and each block's collected effects.
struct IrBuildResult {
    arena: ValueExprArena,
    outputs_by_block: BTreeMap<BlockId, BTreeMap<PortId, ValueRef>>,
    effects_by_block: BTreeMap<BlockId, LowerEffects>,
    errors: Vec<(BlockId, LoweringError)>,
}

/// Invokes every block's registered `lower` closure once, in the
/// topological order inference produced, lowering each multi-member
/// strongly-connected component (already validated legal — it has a
/// stateful boundary) as a unit via [`lower_scc`].
fn build_ir(patch: &Patch, registry: &BlockRegistry, frontend: &FrontendResult) -> IrBuildResult {
    let mut arena = ValueExprArena::default();
    let mut outputs_by_block = BTreeMap::new();
    let mut effects_by_block = BTreeMap::new();
    let mut errors = Vec::new();
    let scc_of = scc_membership(&frontend.sccs);
    let mut handled: BTreeSet<usize> = BTreeSet::new();
    let no_existing_state = BTreeMap::new();

    for block_id in &frontend.topo_order {
        let Some(block) = patch.blocks.get(block_id) else { continue };
        if registry.get(&block.block_type).is_none() {
            continue;
        }

        if let Some(&idx) = scc_of.get(block_id) {
            if handled.insert(idx) {
                lower_scc(
                    &frontend.sccs[idx],
                    patch,
                    registry,
                    frontend,
                    &mut arena,
                    &mut outputs_by_block,
                    &mut effects_by_block,
                    &mut errors,
                );
            }
            continue;
        }

        let Some(inputs) = resolve_inputs(patch, registry, frontend, block_id, &outputs_by_block, None) else {
            // A block outside every SCC whose upstream hasn't lowered yet
            // would mean the topological order itself is wrong; skip
            // defensively rather than invent a value.
            continue;
        };
        match lower_one(patch, registry, frontend, block_id, &inputs, &no_existing_state, &mut arena) {
            Ok(outputs) => {
                outputs_by_block.insert(block_id.clone(), outputs.outputs_by_id);
                effects_by_block.insert(block_id.clone(), outputs.effects);
            }
            Err(e) => errors.push((block_id.clone(), e)),
        }
    }

    IrBuildResult { arena, outputs_by_block, effects_by_block, errors }
}

fn scc_membership(sccs: &[Vec<BlockId>]) -> BTreeMap<BlockId, usize> {
    let mut map = BTreeMap::new();
    for (idx, members) in sccs.iter().enumerate() {
        if members.len() > 1 {
            for member in members {
                map.insert(member.clone(), idx);
            }
        }
    }
    map
}

fn is_state_capability(patch: &Patch, registry: &BlockRegistry, block_id: &BlockId) -> bool {
    patch
        .blocks
        .get(block_id)
        .and_then(|b| registry.get(&b.block_type))
        .is_some_and(|def| def.capability == Capability::State)
}

/// Lowers one legal multi-block cycle in three passes. A stateful
/// boundary block's *output* never depends on its own current-tick input
/// (it is a fresh `stateRead` against last tick's value), so:
///
/// 1. bootstrap each state member with placeholder values for any
///    SCC-internal input not yet available, discovering its output and
///    `stateDecls`;
/// 2. lower every non-state member for real — every input is resolvable
///    now, either from outside the component or from a state member's
///    bootstrapped output;
/// 3. re-lower each state member for real, now that the rest of the cycle
///    is available, keeping pass 1's output ref (so anything pass 2 wired
///    to it stays valid) but replacing its effects with this pass's —
///    the one whose `stepRequest` references the correct input.
fn lower_scc(
    members: &[BlockId],
    patch: &Patch,
    registry: &BlockRegistry,
    frontend: &FrontendResult,
    arena: &mut ValueExprArena,
    outputs_by_block: &mut BTreeMap<BlockId, BTreeMap<PortId, ValueRef>>,
    effects_by_block: &mut BTreeMap<BlockId, LowerEffects>,
    errors: &mut Vec<(BlockId, LoweringError)>,
) {
    let mut sorted_members = members.to_vec();
    sorted_members.sort();
    let (state_members, other_members): (Vec<BlockId>, Vec<BlockId>) =
        sorted_members.into_iter().partition(|id| is_state_capability(patch, registry, id));
    let no_existing_state = BTreeMap::new();

    for block_id in &state_members {
        let Some(inputs) = resolve_inputs(patch, registry, frontend, block_id, outputs_by_block, Some(&mut *arena)) else {
            continue;
        };
        match lower_one(patch, registry, frontend, block_id, &inputs, &no_existing_state, arena) {
            Ok(outputs) => {
                outputs_by_block.insert(block_id.clone(), outputs.outputs_by_id);
                effects_by_block.insert(block_id.clone(), outputs.effects);
            }
            Err(e) => errors.push((block_id.clone(), e)),
        }
    }

    for block_id in &other_members {
        let Some(inputs) = resolve_inputs(patch, registry, frontend, block_id, outputs_by_block, None) else {
            continue;
        };
        match lower_one(patch, registry, frontend, block_id, &inputs, &no_existing_state, arena) {
            Ok(outputs) => {
                outputs_by_block.insert(block_id.clone(), outputs.outputs_by_id);
                effects_by_block.insert(block_id.clone(), outputs.effects);
            }
            Err(e) => errors.push((block_id.clone(), e)),
        }
    }

    for block_id in &state_members {
        let Some(inputs) = resolve_inputs(patch, registry, frontend, block_id, outputs_by_block, None) else {
            continue;
        };
        match lower_one(patch, registry, frontend, block_id, &inputs, &no_existing_state, arena) {
            Ok(outputs) => {
                effects_by_block.insert(block_id.clone(), outputs.effects);
            }
            Err(e) => errors.push((block_id.clone(), e)),
        }
    }
}

/// Resolves every declared input of `block_id` to a [`ValueRef`]. When
/// `placeholder_arena` is `Some`, an SCC-internal source that hasn't
/// lowered yet is satisfied with a zero-valued `Const` of the port's
/// resolved type rather than failing; when `None`, any unresolved source
/// makes this call return `None`.
fn resolve_inputs(
    patch: &Patch,
    registry: &BlockRegistry,
    frontend: &FrontendResult,
    block_id: &BlockId,
    outputs_by_block: &BTreeMap<BlockId, BTreeMap<PortId, ValueRef>>,
    mut placeholder_arena: Option<&mut ValueExprArena>,
) -> Option<BTreeMap<PortId, ValueRef>> {
    let block = patch.blocks.get(block_id)?;
    let def = registry.get(&block.block_type)?;
    let mut inputs = BTreeMap::new();
    for input in &def.inputs {
        let edges = patch.incoming_enabled(block_id, &input.port);
        let Some(edge) = edges.first() else { continue };
        let resolved_ty = frontend
            .resolved_ports
            .get(&(block_id.clone(), input.port.clone()))
            .copied()
            .unwrap_or(input.type_template);
        match outputs_by_block.get(&edge.from.0).and_then(|m| m.get(&edge.from.1)) {
            Some(vref) => {
                inputs.insert(input.port.clone(), vref.clone());
            }
            None => match placeholder_arena.as_deref_mut() {
                Some(arena) => {
                    let expr = arena.push(ValueExpr::Const(zero_const_for(resolved_ty), resolved_ty));
                    inputs.insert(input.port.clone(), ValueRef { expr, ty: resolved_ty, slot: None });
                }
                None => return None,
            },
        }
    }
    Some(inputs)
}

fn zero_const_for(ty: CanonicalType) -> ConstValue {
    match ty.payload {
        PayloadTerm::Concrete(Payload::Int) => ConstValue::Int(0),
        PayloadTerm::Concrete(Payload::Bool | Payload::Event) => ConstValue::Bool(false),
        PayloadTerm::Concrete(Payload::Vec2) => ConstValue::Vec2([0.0, 0.0]),
        PayloadTerm::Concrete(Payload::Vec3) => ConstValue::Vec3([0.0, 0.0, 0.0]),
        PayloadTerm::Concrete(Payload::Color) => ConstValue::Color([0.0, 0.0, 0.0, 0.0]),
        PayloadTerm::Concrete(Payload::Float | Payload::CameraProjection | Payload::Shape2d) | PayloadTerm::Var(_) => {
            ConstValue::Float(0.0)
        }
    }
}

fn lower_one(
    patch: &Patch,
    registry: &BlockRegistry,
    frontend: &FrontendResult,
    block_id: &BlockId,
    inputs_by_id: &BTreeMap<PortId, ValueRef>,
    existing_state: &BTreeMap<StableStateId, StateSlot>,
    arena: &mut ValueExprArena,
) -> Result<LowerOutputs, LoweringError> {
    let block = patch.blocks.get(block_id).ok_or_else(|| LoweringError::UnsupportedPayload { block: block_id.clone() })?;
    let def = registry
        .get(&block.block_type)
        .ok_or_else(|| LoweringError::UnsupportedPayload { block: block_id.clone() })?;

    let mut out_types = BTreeMap::new();
    for output in &def.outputs {
        let ty = frontend
            .resolved_ports
            .get(&(block_id.clone(), output.port.clone()))
            .copied()
            .unwrap_or(output.type_template);
        out_types.insert(output.port.clone(), ty);
    }
    let instance_id = out_types.values().find_map(|t| match t.extent.cardinality {
        Cardinality::Many(instance_ref) => Some(instance_ref.0),
        Cardinality::One => None,
    });

    let ctx = LowerContext {
        block_id,
        block_type: block.block_type.as_str(),
        instance_id,
        inputs_by_id,
        out_types: &out_types,
        params: &block.params,
    };
    let mut builder = LowerBuilder::new(arena, registry, existing_state);
    (def.lower)(&ctx, &mut builder)
}

/// Output of the bind/schedule stage: everything [`assemble_program`] needs
/// to build the final [`CompiledProgram`].
struct BuiltProgram {
    slot_meta: Vec<SlotMeta>,
    value_exprs: ValueExprArena,
    steps: Vec<ScheduledStep>,
    instances: BTreeMap<InstanceId, InstanceDecl>,
    state_mappings: Vec<StateMapping>,
    state_slot_count: u32,
    constant_provenance: BTreeMap<String, ConstProvenance>,
    instance_count_provenance: BTreeMap<String, InstanceCountProvenance>,
    debug_index: DebugIndex,
    time_model: TimeModel,
    bind_errors: Vec<BindError>,
}

/// Binds every block's effects in topological order, threading a single
/// growing `existing_state` map through so a later block — or a legal
/// cycle's own members across [`lower_scc`]'s phases — can resolve a
/// state key an earlier block (or pass) already allocated a slot for.
fn bind_and_schedule(patch: &Patch, registry: &BlockRegistry, frontend: &FrontendResult, ir: IrBuildResult) -> BuiltProgram {
    let IrBuildResult { arena, outputs_by_block, effects_by_block, .. } = ir;
    let mut slot_builder = SlotBuilder::default();
    let mut global_state_map: BTreeMap<StableStateId, StateSlot> = BTreeMap::new();
    let mut seen_state_keys: BTreeSet<StableStateId> = BTreeSet::new();
    let mut state_mappings: Vec<StateMapping> = Vec::new();
    let mut steps = Vec::new();
    let mut instances: BTreeMap<InstanceId, InstanceDecl> = BTreeMap::new();
    let mut bind_errors = Vec::new();
    let mut port_slot: BTreeMap<(BlockId, PortId), ValueSlot> = BTreeMap::new();
    let mut instance_count_provenance = BTreeMap::new();
    let mut excluded_const_blocks: BTreeSet<BlockId> = BTreeSet::new();

    for block_id in &frontend.topo_order {
        let Some(effects) = effects_by_block.get(block_id) else { continue };

        let inputs = BindInputs { effects, existing_state: Some(&global_state_map), origin: (block_id.clone(), 0) };
        let result = bind(&inputs, &mut slot_builder);
        bind_errors.extend(result.diagnostics.clone());

        for (key, slot) in &result.state_map {
            global_state_map.entry(key.clone()).or_insert(*slot);
        }
        for decl in &effects.state_decls {
            if seen_state_keys.insert(decl.key.clone()) {
                if let Some(slot) = result.state_map.get(&decl.key).or_else(|| global_state_map.get(&decl.key)).copied() {
                    let mapping = match (decl.instance_id, decl.stride) {
                        (Some(instance_id), Some(stride)) => StateMapping::Field {
                            key: decl.key.clone(),
                            slot,
                            stride,
                            instance_id,
                            initial_value: decl.initial_value.clone(),
                        },
                        _ => StateMapping::Primitive { key: decl.key.clone(), slot, initial_value: decl.initial_value.clone() },
                    };
                    state_mappings.push(mapping);
                }
            }
        }
        for (port_id, slot) in &result.bound_outputs {
            port_slot.insert((block_id.clone(), port_id.clone()), *slot);
        }
        for decl in &effects.instance_decls {
            instances.entry(decl.instance_id).or_insert(InstanceDecl {
                instance_id: decl.instance_id,
                count: decl.count,
                max_count: decl.max_count,
                stride: decl.stride,
            });
        }

        if let Some((key, prov, excluded_source)) = instance_count_provenance_for_block(patch, registry, block_id, effects) {
            instance_count_provenance.insert(key, prov);
            if let Some(from_block) = excluded_source {
                excluded_const_blocks.insert(from_block);
            }
        }

        for (idx, bound_step) in apply_binding(&result, effects, &global_state_map).into_iter().enumerate() {
            steps.push(ScheduledStep { origin: (block_id.clone(), PortId(format!("#step{idx}"))), step: bound_step });
        }
    }

    // Pure blocks may omit slots; allocate one on every remaining exposed
    // output's behalf so debug/constant provenance has somewhere to point.
    let mut constant_provenance = BTreeMap::new();
    for (block_id, outputs) in &outputs_by_block {
        let Some(block) = patch.blocks.get(block_id) else { continue };
        let Some(def) = registry.get(&block.block_type) else { continue };
        for output in &def.outputs {
            let key = (block_id.clone(), output.port.clone());
            if port_slot.contains_key(&key) {
                continue;
            }
            let Some(vref) = outputs.get(&output.port) else { continue };
            let label = format!("{block_id}.{}", output.port);
            let slot = slot_builder.alloc_typed_slot(vref.ty, &label);
            port_slot.insert(key, slot);
        }
        if !excluded_const_blocks.contains(block_id) {
            if let Some((key, prov)) = constant_provenance_for_block(patch, registry, block_id, outputs, &arena) {
                constant_provenance.insert(key, prov);
            }
        }
    }

    let mut edge_to_slot = BTreeMap::new();
    let mut port_to_slot = BTreeMap::new();
    for ((block_id, port_id), slot) in &port_slot {
        port_to_slot.insert(format!("{block_id}:{port_id}"), *slot);
    }
    for edge in &patch.edges {
        if let Some(slot) = port_slot.get(&(edge.from.0.clone(), edge.from.1.clone())) {
            edge_to_slot.insert(edge.id.0.clone(), *slot);
        }
    }

    let slot_meta = slot_builder
        .slot_types
        .iter()
        .map(|(slot, ty)| SlotMeta {
            slot: *slot,
            ty: *ty,
            debug_label: slot_builder.slot_debug_labels.get(slot).cloned().unwrap_or_default(),
        })
        .collect();

    BuiltProgram {
        slot_meta,
        value_exprs: arena,
        steps,
        instances,
        state_mappings,
        state_slot_count: slot_builder.state_slot_count(),
        constant_provenance,
        instance_count_provenance,
        debug_index: DebugIndex { edge_to_slot, port_to_slot },
        time_model: derive_time_model(patch),
        bind_errors,
    }
}

fn payload_of_const(value: &ConstValue) -> Payload {
    match value {
        ConstValue::Float(_) => Payload::Float,
        ConstValue::Int(_) => Payload::Int,
        ConstValue::Bool(_) => Payload::Bool,
        ConstValue::Vec2(_) => Payload::Vec2,
        ConstValue::Vec3(_) => Payload::Vec3,
        ConstValue::Color(_) => Payload::Color,
    }
}

/// A leaf constant-source block (no inputs, exactly one output resolving to
/// a single `Const` node) gets a `"blockId:value"` provenance entry so the
/// fast-path patcher can rewrite its baked-in value without recompiling.
fn constant_provenance_for_block(
    patch: &Patch,
    registry: &BlockRegistry,
    block_id: &BlockId,
    outputs: &BTreeMap<PortId, ValueRef>,
    arena: &ValueExprArena,
) -> Option<(String, ConstProvenance)> {
    let block = patch.blocks.get(block_id)?;
    let def = registry.get(&block.block_type)?;
    if !def.inputs.is_empty() || def.outputs.len() != 1 {
        return None;
    }
    let vref = outputs.get(&def.outputs[0].port)?;
    let ValueExpr::Const(value, _) = arena.get(vref.expr)? else { return None };
    Some((
        format!("{block_id}:value"),
        ConstProvenance { payload_kind: payload_of_const(value), component_expr_ids: vec![vref.expr] },
    ))
}

/// A block whose cardinality policy is `override` and which declares a
/// `count` input gets a `"blockId:count"` provenance entry keyed to the
/// instance it drives. Whatever block feeds that `count` port is excluded
/// from constant provenance (a patch to the count must go through the
/// instance-count path, not the constant path).
fn instance_count_provenance_for_block(
    patch: &Patch,
    registry: &BlockRegistry,
    block_id: &BlockId,
    effects: &LowerEffects,
) -> Option<(String, InstanceCountProvenance, Option<BlockId>)> {
    let block = patch.blocks.get(block_id)?;
    let def = registry.get(&block.block_type)?;
    if def.cardinality_policy.mode != CardinalityMode::Override {
        return None;
    }
    let count_port = PortId("count".to_owned());
    if !def.inputs.iter().any(|i| i.port == count_port) {
        return None;
    }
    let decl = effects.instance_decls.first()?;
    let excluded_source = patch.incoming_enabled(block_id, &count_port).first().map(|e| e.from.0.clone());
    Some((
        format!("{block_id}:{count_port}"),
        InstanceCountProvenance { instance_id: decl.instance_id },
        excluded_source,
    ))
}

fn derive_time_model(patch: &Patch) -> TimeModel {
    let period_ms = patch
        .blocks
        .values()
        .find(|b| b.block_type == TIME_ROOT_BLOCK_TYPE)
        .and_then(|b| b.params.get("periodMs"))
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(1000.0);
    TimeModel { period_ms, rails: vec!["dt".to_owned(), "phaseA".to_owned()], reset_epoch_ms: 0.0 }
}

fn assemble_program(built: BuiltProgram) -> CompiledProgram {
    CompiledProgram {
        slot_meta: built.slot_meta,
        value_exprs: built.value_exprs,
        schedule: ScheduleIr {
            steps: built.steps,
            instances: built.instances,
            state_mappings: built.state_mappings,
            state_slot_count: built.state_slot_count,
            event_slot_count: 0,
            event_count: 0,
            time_model: built.time_model,
        },
        constant_provenance: built.constant_provenance,
        instance_count_provenance: built.instance_count_provenance,
        debug_index: built.debug_index,
    }
}

/// Drives the five-event compile lifecycle (`GraphCommitted`,
/// `CompileBegin`, `CompileEnd`, `ProgramSwapped`, `RuntimeHealthSnapshot`)
/// over repeated recompiles of the same session, migrating continuity state
/// and reconciling phase offsets across every swap.
pub struct Engine {
    registry: BlockRegistry,
    hub: DiagnosticsHub,
    session: SessionState,
    program_state: crate::session::ProgramState,
    active: Option<CompiledProgram>,
    active_revision: Option<u64>,
    pending: Option<(u64, CompiledProgram)>,
}

impl Engine {
    /// A fresh engine over `registry`, with no program active yet.
    #[must_use]
    pub fn new(registry: BlockRegistry, time_model: TimeModel) -> Self {
        Self {
            registry,
            hub: DiagnosticsHub::new(),
            session: SessionState::new(time_model),
            program_state: crate::session::ProgramState::default(),
            active: None,
            active_revision: None,
            pending: None,
        }
    }

    /// `GraphCommitted`: runs the authoring validators and replaces the
    /// diagnostics hub's authoring snapshot.
    pub fn graph_committed(&mut self, patch: &Patch) {
        self.hub.on_graph_committed(patch, &self.registry);
    }

    /// Runs one compile at `revision`, recording `CompileBegin`/`CompileEnd`
    /// with the diagnostics hub. On success the compiled program becomes
    /// pending until [`Engine::swap`] is called for the same revision; on
    /// failure whatever program was previously active stays active.
    pub fn compile(&mut self, patch: &Patch, revision: u64) -> CompileOutcome {
        self.hub.on_compile_begin(revision);
        let outcome = compile(patch, &self.registry, revision);
        self.hub.on_compile_end(revision, outcome.diagnostics.clone());
        if let Some(program) = &outcome.program {
            self.pending = Some((revision, program.clone()));
        }
        outcome
    }

    /// `ProgramSwapped`: promotes the pending compile for `revision` to
    /// active, migrating continuity state and reconciling time-model phase
    /// offsets. Returns `false` (a no-op) if no pending compile matches
    /// `revision`.
    pub fn swap(&mut self, revision: u64, swap_time_ms: f64) -> bool {
        let Some((pending_revision, program)) = self.pending.take() else { return false };
        if pending_revision != revision {
            self.pending = Some((pending_revision, program));
            return false;
        }

        let continuity::MigrationOutcome { program_state, mut store, diagnostics } =
            continuity::migrate(&self.session.continuity, &program.schedule.state_mappings, &program.schedule.instances, revision);
        let offsets = continuity::reconcile_all_phase_offsets(&store, &self.session.time_model, &program.schedule.time_model, swap_time_ms);
        store.set_phase_offsets(offsets);

        self.session.continuity = store;
        self.session.time_model = program.schedule.time_model.clone();
        self.program_state = program_state;
        self.active = Some(program);
        self.active_revision = Some(revision);
        self.hub.on_program_swapped(revision);
        if !diagnostics.is_empty() {
            self.hub.on_runtime_health_snapshot(RuntimeDiagnosticsDelta::raised_only(diagnostics));
        }
        true
    }

    /// Attempts an in-place constant/instance-count patch of the active
    /// program, without involving the full pipeline. Returns `None` if no
    /// program is active or any change fails its gate — the caller should
    /// fall back to a full [`Engine::compile`] + [`Engine::swap`].
    #[must_use]
    pub fn try_fast_patch(&self, changes: &[PatchChange]) -> Option<CompiledProgram> {
        fastpath::patch_program_constants(self.active.as_ref()?, changes)
    }

    /// Adopts `program` as the active program directly, bypassing the
    /// pending/swap handshake — used after a successful [`Engine::try_fast_patch`].
    pub fn adopt_fast_patched(&mut self, program: CompiledProgram) {
        self.active = Some(program);
    }

    #[must_use]
    pub const fn active_program(&self) -> Option<&CompiledProgram> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn active_revision(&self) -> Option<u64> {
        self.active_revision
    }

    #[must_use]
    pub const fn hub(&self) -> &DiagnosticsHub {
        &self.hub
    }

    #[must_use]
    pub const fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub const fn program_state(&self) -> &crate::session::ProgramState {
        &self.program_state
    }
}
