//! Error taxonomy and diagnostic conversion.
//!
//! A typed, `thiserror`-derived error per subsystem (so a caller can match
//! on exactly the failures that stage can produce) feeds a single
//! flattened [`Diagnostic`] shape the orchestrator converts every stage's
//! errors into.

use serde::{Deserialize, Serialize};

use crate::ids::{BlockId, PortId};

/// Stable diagnostic code table. Unknown/unmapped kinds fall through to
/// [`DiagnosticCode::UnknownBlockType`] — never drop a diagnostic silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    ETimeRootMissing,
    ETimeRootMultiple,
    ETypeMismatch,
    ECycleDetected,
    EMissingInput,
    EUnknownBlockType,
    EDanglingEdge,
    ECardinalityMismatch,
    EInstanceMismatch,
    ELaneCoupledDisallowed,
    EImplicitBroadcastDisallowed,
    EPayloadNotAllowed,
    EPayloadCombinationNotAllowed,
    EUnitMismatch,
    EImplicitCastDisallowed,
    EExprSyntax,
    EExprType,
    EExprCompile,
    WGraphDisconnectedBlock,
    WGraphUnusedOutput,
    WBlockUnreachableError,
    WFlagDowngraded,
    ISilentValueUsed,
}

impl DiagnosticCode {
    /// The stable, human-readable code string embedded in diagnostic ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ETimeRootMissing => "E_TIME_ROOT_MISSING",
            Self::ETimeRootMultiple => "E_TIME_ROOT_MULTIPLE",
            Self::ETypeMismatch => "E_TYPE_MISMATCH",
            Self::ECycleDetected => "E_CYCLE_DETECTED",
            Self::EMissingInput => "E_MISSING_INPUT",
            Self::EUnknownBlockType => "E_UNKNOWN_BLOCK_TYPE",
            Self::EDanglingEdge => "E_DANGLING_EDGE",
            Self::ECardinalityMismatch => "E_CARDINALITY_MISMATCH",
            Self::EInstanceMismatch => "E_INSTANCE_MISMATCH",
            Self::ELaneCoupledDisallowed => "E_LANE_COUPLED_DISALLOWED",
            Self::EImplicitBroadcastDisallowed => "E_IMPLICIT_BROADCAST_DISALLOWED",
            Self::EPayloadNotAllowed => "E_PAYLOAD_NOT_ALLOWED",
            Self::EPayloadCombinationNotAllowed => "E_PAYLOAD_COMBINATION_NOT_ALLOWED",
            Self::EUnitMismatch => "E_UNIT_MISMATCH",
            Self::EImplicitCastDisallowed => "E_IMPLICIT_CAST_DISALLOWED",
            Self::EExprSyntax => "E_EXPR_SYNTAX",
            Self::EExprType => "E_EXPR_TYPE",
            Self::EExprCompile => "E_EXPR_COMPILE",
            Self::WGraphDisconnectedBlock => "W_GRAPH_DISCONNECTED_BLOCK",
            Self::WGraphUnusedOutput => "W_GRAPH_UNUSED_OUTPUT",
            Self::WBlockUnreachableError => "W_BLOCK_UNREACHABLE_ERROR",
            Self::WFlagDowngraded => "W_FLAG_DOWNGRADED",
            Self::ISilentValueUsed => "I_SILENT_VALUE_USED",
        }
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warn,
    Info,
}

/// What part of the graph a [`Diagnostic`] points to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetRef {
    Block { block: BlockId },
    Port { block: BlockId, port: PortId },
    GraphSpan {
        block_ids: Vec<BlockId>,
        span_kind: Option<String>,
    },
}

impl TargetRef {
    /// Canonical serialization used inside stable diagnostic ids: block ids
    /// inside a `GraphSpan` are sorted lexically; optional fields are
    /// appended in a fixed position so the same logical target always
    /// serializes identically.
    #[must_use]
    pub fn canonical_str(&self) -> String {
        match self {
            Self::Block { block } => format!("block:{block}"),
            Self::Port { block, port } => format!("port:{block}:{port}"),
            Self::GraphSpan { block_ids, span_kind } => {
                let mut ids: Vec<&str> = block_ids.iter().map(|b| b.0.as_str()).collect();
                ids.sort_unstable();
                let joined = ids.join(",");
                match span_kind {
                    Some(kind) => format!("graphSpan:[{joined}]:{kind}"),
                    None => format!("graphSpan:[{joined}]"),
                }
            }
        }
    }
}

/// Which compile-lifecycle stage produced a [`Diagnostic`], for the
/// diagnostics hub's by-domain query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    /// Fast authoring validators run synchronously on `GraphCommitted`.
    Authoring,
    /// Normalizer/inference (frontend) errors.
    Frontend,
    /// IR builder/binder/scheduler (backend) errors.
    Backend,
    /// Merged in from `RuntimeHealthSnapshot` deltas.
    Runtime,
}

/// A single compile diagnostic, the flattened shape every stage's typed
/// errors convert into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub code: DiagnosticCode,
    pub message: String,
    pub primary_target: TargetRef,
    pub severity: Severity,
    pub domain: Domain,
}

/// Pure function: `CODE:targetStr:revN[:signature]`. Two calls with the same
/// inputs produce the same string; different revisions produce different
/// strings (testable property 6).
#[must_use]
pub fn generate_diagnostic_id(
    code: DiagnosticCode,
    target: &TargetRef,
    revision: u64,
    signature: Option<&str>,
) -> String {
    let mut id = format!("{}:{}:rev{}", code.as_str(), target.canonical_str(), revision);
    if let Some(sig) = signature {
        id.push(':');
        id.push_str(sig);
    }
    id
}

/// Errors produced by the [`crate::normalize`] stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontendError {
    #[error("unknown block type {block_type:?} on block {block}")]
    UnknownBlockType { block: BlockId, block_type: String },
    #[error("edge {edge} has a dangling endpoint")]
    DanglingEdge { edge: crate::ids::EdgeId },
    #[error("no time-root block present")]
    TimeRootMissing,
    #[error("multiple time-root blocks present: {0:?}")]
    TimeRootMultiple(Vec<BlockId>),
}

/// Errors produced by the [`crate::infer`] stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferError {
    #[error("type mismatch at {block}:{port}")]
    TypeMismatch { block: BlockId, port: PortId },
    #[error("unit mismatch at {block}:{port}")]
    UnitMismatch { block: BlockId, port: PortId },
    #[error("payload {payload:?} not allowed at {block}:{port}")]
    PayloadNotAllowed {
        block: BlockId,
        port: PortId,
        payload: crate::types::Payload,
    },
    #[error("payload combination not allowed at {block}:{port}")]
    PayloadCombinationNotAllowed { block: BlockId, port: PortId },
    #[error("implicit cast disallowed at {block}:{port}")]
    ImplicitCastDisallowed { block: BlockId, port: PortId },
    #[error("instance mismatch at block {block}")]
    InstanceMismatch { block: BlockId },
    #[error("lane-coupled block {block} used in a generic-cardinality context")]
    LaneCoupledDisallowed { block: BlockId },
    #[error("implicit broadcast disallowed at block {block}")]
    ImplicitBroadcastDisallowed { block: BlockId },
    #[error("cycle detected among blocks {blocks:?}")]
    CycleDetected { blocks: Vec<BlockId> },
    #[error("missing required input {port} on block {block}")]
    MissingInput { block: BlockId, port: PortId },
}

/// Errors produced during per-block lowering ([`crate::ir`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoweringError {
    #[error("unresolved type variable for {what}")]
    UnresolvedVariable { what: String },
    #[error("impure block {block} did not supply slot requests or an explicit ref slot")]
    MissingSlotRequest { block: BlockId },
    #[error("block {block} requested unsupported payload combination")]
    UnsupportedPayload { block: BlockId },
}

/// Errors produced by the [`crate::bind`] stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("step request referenced undeclared state key {key}")]
    UndeclaredStateKey { key: crate::ids::StableStateId },
}

/// Converts a [`FrontendError`] into a stable [`Diagnostic`].
#[must_use]
pub fn frontend_diagnostic(err: &FrontendError, revision: u64) -> Diagnostic {
    let (code, target, message) = match err {
        FrontendError::UnknownBlockType { block, block_type } => (
            DiagnosticCode::EUnknownBlockType,
            TargetRef::Block { block: block.clone() },
            format!("unknown block type '{block_type}'"),
        ),
        FrontendError::DanglingEdge { edge } => (
            DiagnosticCode::EDanglingEdge,
            TargetRef::GraphSpan {
                block_ids: Vec::new(),
                span_kind: None,
            },
            format!("edge {edge} has a dangling endpoint"),
        ),
        FrontendError::TimeRootMissing => (
            DiagnosticCode::ETimeRootMissing,
            TargetRef::GraphSpan {
                block_ids: Vec::new(),
                span_kind: None,
            },
            "no time-root block present".to_owned(),
        ),
        FrontendError::TimeRootMultiple(blocks) => (
            DiagnosticCode::ETimeRootMultiple,
            TargetRef::GraphSpan {
                block_ids: blocks.clone(),
                span_kind: Some("multipleTimeRoots".to_owned()),
            },
            "multiple time-root blocks present".to_owned(),
        ),
    };
    let id = generate_diagnostic_id(code, &target, revision, None);
    Diagnostic {
        id,
        code,
        message,
        primary_target: target,
        severity: Severity::Error,
        domain: Domain::Frontend,
    }
}

/// Converts an [`InferError`] into a stable [`Diagnostic`].
#[must_use]
pub fn infer_diagnostic(err: &InferError, revision: u64) -> Diagnostic {
    let (code, target, message) = match err {
        InferError::TypeMismatch { block, port } => (
            DiagnosticCode::ETypeMismatch,
            TargetRef::Port { block: block.clone(), port: port.clone() },
            format!("type mismatch at {block}:{port}"),
        ),
        InferError::UnitMismatch { block, port } => (
            DiagnosticCode::EUnitMismatch,
            TargetRef::Port { block: block.clone(), port: port.clone() },
            format!("unit mismatch at {block}:{port}"),
        ),
        InferError::PayloadNotAllowed { block, port, payload } => (
            DiagnosticCode::EPayloadNotAllowed,
            TargetRef::Port { block: block.clone(), port: port.clone() },
            format!("payload {payload:?} not allowed at {block}:{port}"),
        ),
        InferError::PayloadCombinationNotAllowed { block, port } => (
            DiagnosticCode::EPayloadCombinationNotAllowed,
            TargetRef::Port { block: block.clone(), port: port.clone() },
            format!("payload combination not allowed at {block}:{port}"),
        ),
        InferError::ImplicitCastDisallowed { block, port } => (
            DiagnosticCode::EImplicitCastDisallowed,
            TargetRef::Port { block: block.clone(), port: port.clone() },
            format!("implicit cast disallowed at {block}:{port}"),
        ),
        InferError::InstanceMismatch { block } => (
            DiagnosticCode::EInstanceMismatch,
            TargetRef::Block { block: block.clone() },
            format!("instance mismatch at block {block}"),
        ),
        InferError::LaneCoupledDisallowed { block } => (
            DiagnosticCode::ELaneCoupledDisallowed,
            TargetRef::Block { block: block.clone() },
            format!("lane-coupled block {block} used in a generic-cardinality context"),
        ),
        InferError::ImplicitBroadcastDisallowed { block } => (
            DiagnosticCode::EImplicitBroadcastDisallowed,
            TargetRef::Block { block: block.clone() },
            format!("implicit broadcast disallowed at block {block}"),
        ),
        InferError::CycleDetected { blocks } => (
            DiagnosticCode::ECycleDetected,
            TargetRef::GraphSpan {
                block_ids: blocks.clone(),
                span_kind: Some("cycle".to_owned()),
            },
            format!("cycle detected among blocks {blocks:?}"),
        ),
        InferError::MissingInput { block, port } => (
            DiagnosticCode::EMissingInput,
            TargetRef::Port { block: block.clone(), port: port.clone() },
            format!("missing required input {port} on block {block}"),
        ),
    };
    let id = generate_diagnostic_id(code, &target, revision, None);
    Diagnostic {
        id,
        code,
        message,
        primary_target: target,
        severity: Severity::Error,
        domain: Domain::Frontend,
    }
}

/// Converts a [`LoweringError`] into a stable [`Diagnostic`].
#[must_use]
pub fn lowering_diagnostic(err: &LoweringError, block: &BlockId, revision: u64) -> Diagnostic {
    let target = TargetRef::Block { block: block.clone() };
    // Unmapped lowering failures still need a stable code; `EExprCompile`
    // is the generic compile-time-lowering bucket.
    let code = DiagnosticCode::EExprCompile;
    let id = generate_diagnostic_id(code, &target, revision, None);
    Diagnostic {
        id,
        code,
        message: err.to_string(),
        primary_target: target,
        severity: Severity::Error,
        domain: Domain::Backend,
    }
}

/// Converts a [`BindError`] into a stable [`Diagnostic`].
#[must_use]
pub fn bind_diagnostic(err: &BindError, revision: u64) -> Diagnostic {
    let BindError::UndeclaredStateKey { key } = err;
    let target = TargetRef::GraphSpan { block_ids: Vec::new(), span_kind: Some("undeclaredState".to_owned()) };
    let code = DiagnosticCode::EExprCompile;
    let id = generate_diagnostic_id(code, &target, revision, Some(&key.0));
    Diagnostic {
        id,
        code,
        message: err.to_string(),
        primary_target: target,
        severity: Severity::Error,
        domain: Domain::Backend,
    }
}
