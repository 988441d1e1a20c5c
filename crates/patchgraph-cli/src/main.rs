//! Command-line driver for the patchgraph compiler.
//!
//! Loads an authored [`patchgraph_core::Patch`] from a JSON file, runs it
//! through [`patchgraph_core::Engine`]'s `GraphCommitted` → `compile` →
//! `swap` lifecycle, and prints diagnostics and a compiled-program summary.
//! Also exposes the fast-path constant/instance-count patcher and a listing
//! of the built-in block catalog.

// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use patchgraph_core::blocks::register_builtins;
use patchgraph_core::compiler::Engine;
use patchgraph_core::fastpath::PatchChange;
use patchgraph_core::registry::BlockRegistry;
use patchgraph_core::schedule::TimeModel;
use patchgraph_core::Patch;

#[derive(Parser)]
#[command(name = "patchgraph")]
#[command(author, version, about = "Compile and inspect patchgraph programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose tracing output (debug level instead of info).
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a patch file and print diagnostics plus a program summary.
    Compile {
        /// Path to a JSON-encoded Patch.
        patch: PathBuf,

        /// Patch revision number to compile under.
        #[arg(long, default_value_t = 1)]
        revision: u64,

        /// Clock time (ms) to use for the swap's phase-offset reconciliation.
        #[arg(long, default_value_t = 0.0)]
        swap_time_ms: f64,

        /// Skip the swap step; only run compile and report diagnostics.
        #[arg(long)]
        no_swap: bool,
    },

    /// Apply fast-path constant/instance-count patches to a freshly compiled
    /// program; falls back to reporting that a full recompile is required.
    Patch {
        /// Path to a JSON-encoded Patch.
        patch: PathBuf,

        /// One or more `key=jsonValue` changes, e.g. `FreqConst:value=4.0`.
        #[arg(required = true)]
        changes: Vec<String>,

        #[arg(long, default_value_t = 1)]
        revision: u64,
    },

    /// List every block type in the built-in registry.
    Blocks,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    match cli.command {
        Commands::Compile { patch, revision, swap_time_ms, no_swap } => cmd_compile(&patch, revision, swap_time_ms, no_swap),
        Commands::Patch { patch, changes, revision } => cmd_patch(&patch, &changes, revision),
        Commands::Blocks => cmd_blocks(),
    }
}

fn load_patch(path: &PathBuf) -> Result<Patch> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading patch file {}", path.display()))?;
    let patch: Patch = serde_json::from_str(&raw).with_context(|| format!("parsing patch file {}", path.display()))?;
    Ok(patch)
}

fn default_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    register_builtins(&mut registry);
    registry
}

fn cmd_compile(patch_path: &PathBuf, revision: u64, swap_time_ms: f64, no_swap: bool) -> Result<()> {
    let patch = load_patch(patch_path)?;
    let registry = default_registry();
    let mut engine = Engine::new(registry, TimeModel::default());

    engine.graph_committed(&patch);
    let outcome = engine.compile(&patch, revision);
    info!(diagnostics = outcome.diagnostics.len(), "compile finished");

    for diag in &outcome.diagnostics {
        eprintln!("[{:?}:{}] {} ({})", diag.severity, diag.code.as_str(), diag.message, diag.id);
    }

    let Some(program) = outcome.program else {
        bail!("compile produced no program for revision {revision}; see diagnostics above");
    };

    let swapped = if no_swap { false } else { engine.swap(revision, swap_time_ms) };

    let summary = serde_json::json!({
        "revision": revision,
        "swapped": swapped,
        "slotCount": program.slot_meta.len(),
        "valueExprCount": program.value_exprs.nodes.len(),
        "stepCount": program.schedule.steps.len(),
        "stateSlotCount": program.schedule.state_slot_count,
        "instanceCount": program.schedule.instances.len(),
        "timeModel": {
            "periodMs": program.schedule.time_model.period_ms,
            "rails": program.schedule.time_model.rails,
        },
        "constantProvenanceKeys": program.constant_provenance.keys().collect::<Vec<_>>(),
        "instanceCountProvenanceKeys": program.instance_count_provenance.keys().collect::<Vec<_>>(),
        "invariantViolations": program.check_invariants(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn cmd_patch(patch_path: &PathBuf, changes: &[String], revision: u64) -> Result<()> {
    let patch = load_patch(patch_path)?;
    let registry = default_registry();
    let mut engine = Engine::new(registry, TimeModel::default());

    engine.graph_committed(&patch);
    let outcome = engine.compile(&patch, revision);
    let Some(_) = &outcome.program else {
        bail!("initial compile produced no program; cannot fast-patch");
    };
    if !engine.swap(revision, 0.0) {
        bail!("swap failed for revision {revision}");
    }

    let parsed: Vec<PatchChange> = changes
        .iter()
        .map(|spec| parse_change(spec))
        .collect::<Result<_>>()?;

    match engine.try_fast_patch(&parsed) {
        Some(patched) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "fastPathApplied": true,
                    "stateSlotCount": patched.schedule.state_slot_count,
                    "instances": patched.schedule.instances.len(),
                }))?
            );
        }
        None => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "fastPathApplied": false,
                    "reason": "one or more changes failed its gate; a full recompile is required",
                }))?
            );
        }
    }

    Ok(())
}

/// Parses a `"key=jsonValue"` change spec. A change whose key ends in the
/// literal `":count"` suffix is treated as an instance-count change;
/// everything else is a constant change.
fn parse_change(spec: &str) -> Result<PatchChange> {
    let (key, raw) = spec.split_once('=').with_context(|| format!("change '{spec}' is missing '='"))?;
    let value: serde_json::Value = serde_json::from_str(raw).with_context(|| format!("change '{spec}' has invalid JSON value"))?;
    if key.ends_with(":count") {
        Ok(PatchChange::InstanceCount { key: key.to_owned(), raw: value })
    } else {
        Ok(PatchChange::Constant { key: key.to_owned(), raw: value })
    }
}

fn cmd_blocks() -> Result<()> {
    let registry = default_registry();
    for type_name in registry.type_names() {
        println!("{type_name}");
    }
    Ok(())
}
