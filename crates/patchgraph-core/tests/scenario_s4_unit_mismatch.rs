//! Scenario S4: a `Phasor`'s wrapped `angle{turns}` output wired straight
//! into a `time{ms}` input is a unit mismatch, never an implicit cast.

mod common;

use patchgraph_core::compile;
use patchgraph_core::errors::{DiagnosticCode, TargetRef};
use patchgraph_core::ids::{BlockId, PortId};

#[test]
fn wiring_a_phase_output_into_a_time_input_is_a_unit_mismatch() {
    let registry = common::registry();
    let patch = common::patch(
        vec![
            common::time_root("t0"),
            common::const_float("freq", 2.0),
            common::phasor("p0", 0.0),
            common::time_cast("ms2s", "TimeMsToSeconds"),
        ],
        vec![
            common::edge("e0", "freq", "out", "p0", "freq"),
            common::edge("e1", "p0", "phase", "ms2s", "in"),
        ],
    );

    let outcome = compile(&patch, &registry, 1);
    assert!(outcome.program.is_none());

    let diag = outcome
        .diagnostics
        .iter()
        .find(|d| d.code == DiagnosticCode::EUnitMismatch)
        .expect("a unit-mismatch diagnostic should be present");
    assert_eq!(diag.primary_target, TargetRef::Port { block: BlockId("ms2s".to_owned()), port: PortId("in".to_owned()) });
}
