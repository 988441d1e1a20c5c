//! Fast-path Patcher: patches constants and instance counts in-place
//! without a full recompile when invariants hold.
//!
//! A typed change set goes in, either a patched program or `None` comes
//! out (never a diagnostic — the orchestrator falls back to a full
//! recompile on `None`).

use std::collections::BTreeMap;

use crate::ir::{ConstValue, ValueExpr};
use crate::schedule::CompiledProgram;
use crate::types::Payload;

/// A single requested change, keyed by the same `"blockId:portId"` string
/// used in `constantProvenance`/`instanceCountProvenance`.
#[derive(Debug, Clone)]
pub enum PatchChange {
    Constant { key: String, raw: serde_json::Value },
    InstanceCount { key: String, raw: serde_json::Value },
}

/// Attempts to patch `program` in place for every change in `changes`.
/// Returns `None` if any change fails its gate, in which case the caller
/// must fall back to a full recompile.
#[must_use]
pub fn patch_program_constants(program: &CompiledProgram, changes: &[PatchChange]) -> Option<CompiledProgram> {
    let mut next = program.clone_for_patch();

    for change in changes {
        match change {
            PatchChange::Constant { key, raw } => {
                patch_constant(&mut next, key, raw)?;
            }
            PatchChange::InstanceCount { key, raw } => {
                patch_instance_count(&mut next, key, raw)?;
            }
        }
    }

    Some(next)
}

fn patch_constant(program: &mut CompiledProgram, key: &str, raw: &serde_json::Value) -> Option<()> {
    let provenance = program.constant_provenance.get(key)?.clone();
    let components = raw_to_const_values(raw, provenance.payload_kind)?;
    if components.len() != provenance.component_expr_ids.len() {
        return None;
    }
    for (expr_id, value) in provenance.component_expr_ids.iter().zip(components) {
        let node = program.value_exprs.nodes.get_mut(expr_id.0 as usize)?;
        let ValueExpr::Const(_, ty) = node else {
            return None;
        };
        *node = ValueExpr::Const(value, *ty);
    }
    Some(())
}

fn patch_instance_count(program: &mut CompiledProgram, key: &str, raw: &serde_json::Value) -> Option<()> {
    let provenance = *program.instance_count_provenance.get(key)?;
    let instance_id = provenance.instance_id;

    let new_count = raw.as_f64().map(|f| f.floor() as i64).or_else(|| raw.as_i64())?;
    if new_count < 0 {
        return None;
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let new_count = new_count as u32;

    let decl = program.schedule.instances.get(&instance_id)?;
    if new_count > decl.max_count {
        return None;
    }

    // Hard gate: any per-lane (field) state mapping referencing this
    // instance forces a full rebuild.
    let has_field_state = program
        .schedule
        .state_mappings
        .iter()
        .any(|m| m.field_instance() == Some(instance_id));
    if has_field_state {
        return None;
    }

    let decl = program.schedule.instances.get_mut(&instance_id)?;
    decl.count = new_count;
    Some(())
}

fn raw_to_const_values(raw: &serde_json::Value, kind: Payload) -> Option<Vec<ConstValue>> {
    match kind {
        Payload::Float => Some(vec![ConstValue::Float(raw.as_f64()?)]),
        Payload::Int => Some(vec![ConstValue::Int(raw.as_i64()?)]),
        Payload::Bool => Some(vec![ConstValue::Bool(raw.as_bool()?)]),
        Payload::Vec2 => {
            let arr = raw.as_array()?;
            if arr.len() != 2 {
                return None;
            }
            Some(vec![ConstValue::Vec2([arr[0].as_f64()?, arr[1].as_f64()?])])
        }
        Payload::Vec3 => {
            let arr = raw.as_array()?;
            if arr.len() != 3 {
                return None;
            }
            Some(vec![ConstValue::Vec3([arr[0].as_f64()?, arr[1].as_f64()?, arr[2].as_f64()?])])
        }
        Payload::Color => {
            let arr = raw.as_array()?;
            if arr.len() != 4 {
                return None;
            }
            Some(vec![ConstValue::Color([
                arr[0].as_f64()?,
                arr[1].as_f64()?,
                arr[2].as_f64()?,
                arr[3].as_f64()?,
            ])])
        }
        Payload::CameraProjection | Payload::Shape2d | Payload::Event => None,
    }
}

impl CompiledProgram {
    /// Shallow-copies the parts the fast path may rewrite
    /// (`valueExprs.nodes`, `schedule.instances`); every other field is
    /// shared with the original via ordinary `Clone` (cheap: the arena and
    /// provenance maps are the only large structures, and both are copied
    /// here deliberately since the patch mutates them in place).
    fn clone_for_patch(&self) -> Self {
        Self {
            slot_meta: self.slot_meta.clone(),
            value_exprs: self.value_exprs.clone(),
            schedule: self.schedule.clone(),
            constant_provenance: self.constant_provenance.clone(),
            instance_count_provenance: self.instance_count_provenance.clone(),
            debug_index: self.debug_index.clone(),
        }
    }
}

