//! `patchgraph-core`: a deterministic compiler from an authored visual
//! dataflow patch graph to a flat, schedule-ordered runtime program.
//!
//! The pipeline is a straight line through the modules below:
//! [`model::Patch`] (what an editor authors) is canonicalized by
//! [`normalize`], assigned a [`types::CanonicalType`] per port by [`infer`],
//! lowered block-by-block into a [`ir::ValueExprArena`] DAG plus
//! [`ir::LowerEffects`] by [`compiler::build_ir`], allocated slots by
//! [`bind`], and linearized into a [`schedule::CompiledProgram`] by
//! [`compiler::assemble_program`]. [`compiler::Engine`] wraps the whole
//! thing into a stateful session: repeated recompiles, continuity migration
//! across them via [`continuity`], in-place constant/instance patching via
//! [`fastpath`], and every diagnostic funneled through [`diagnostics`].
//!
//! [`blocks`] registers the built-in catalog; [`ids`] carries the newtype
//! identifiers every other module threads through.

pub mod bind;
pub mod blocks;
pub mod compiler;
pub mod continuity;
pub mod diagnostics;
pub mod errors;
pub mod fastpath;
pub mod ids;
pub mod infer;
pub mod ir;
pub mod model;
pub mod normalize;
pub mod registry;
pub mod schedule;
pub mod session;
pub mod types;

pub use compiler::{compile, CompileOutcome, Engine};
pub use diagnostics::RuntimeDiagnosticsDelta;
pub use errors::Diagnostic;
pub use model::Patch;
pub use registry::BlockRegistry;
pub use schedule::CompiledProgram;
