//! Canonical types: `Payload` × `Unit` × `Extent` (+ optional contract).
//!
//! Every port, edge, and signal in the compiler carries a [`CanonicalType`].
//! Constructors are pure; equality is structural; unification is classical
//! Robinson-style substitution composition, kept deliberately free of
//! union-find since arities here are small and substitutions are cheap to
//! compose explicitly.

use std::collections::BTreeMap;

use crate::ids::{fresh_payload_var, fresh_unit_var, PayloadVar, UnitVar};

/// The value kind carried by a signal or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Payload {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Color,
    CameraProjection,
    Shape2d,
    Event,
}

impl Payload {
    /// Number of scalar components a constant of this payload kind occupies,
    /// used by the fast-path patcher to size a `ConstValue` conversion.
    #[must_use]
    pub const fn component_count(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool | Self::Event => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Color => 4,
            Self::CameraProjection | Self::Shape2d => 0,
        }
    }
}

/// A payload, or a not-yet-resolved payload variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum PayloadTerm {
    Concrete(Payload),
    Var(PayloadVar),
}

impl PayloadTerm {
    /// Mints a fresh payload variable term.
    #[must_use]
    pub fn fresh() -> Self {
        Self::Var(fresh_payload_var())
    }

    /// `true` if this term is an unresolved variable.
    #[must_use]
    pub const fn is_var(self) -> bool {
        matches!(self, Self::Var(_))
    }
}

/// Angle sub-unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum AngleUnit {
    Turns,
    Radians,
    Degrees,
}

/// Time sub-unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
}

/// Concrete unit a [`Payload`] is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Unit {
    Scalar,
    Count,
    Angle(AngleUnit),
    Time(TimeUnit),
    Space { units: u32, dims: u8 },
    Color,
    None,
}

/// A unit, or a not-yet-resolved unit variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnitTerm {
    Concrete(Unit),
    Var(UnitVar),
}

impl UnitTerm {
    /// Mints a fresh unit variable term.
    #[must_use]
    pub fn fresh() -> Self {
        Self::Var(fresh_unit_var())
    }

    /// `true` if this term is an unresolved variable.
    #[must_use]
    pub const fn is_var(self) -> bool {
        matches!(self, Self::Var(_))
    }
}

/// Whether a value updates every evaluation tick or only on discrete events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Temporality {
    Continuous,
    Discrete,
}

/// Identifier for an array/field instance. Two `many` values must share an
/// `InstanceRef` to be combined pointwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstanceRef(pub crate::ids::InstanceId);

/// Whether a value is a single signal or per-lane over an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Cardinality {
    One,
    Many(InstanceRef),
}

/// Whether a block operation crosses lanes (and is thus incompatible with
/// generic-cardinality contexts) or stays within a single lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum LaneCoupling {
    LaneLocal,
    LaneCoupled,
}

/// Temporality + cardinality + lane coupling for a canonical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    pub temporality: Temporality,
    pub cardinality: Cardinality,
    pub lane_coupling: LaneCoupling,
}

impl Extent {
    /// The common case: continuous, single signal, lane-local.
    #[must_use]
    pub const fn signal() -> Self {
        Self {
            temporality: Temporality::Continuous,
            cardinality: Cardinality::One,
            lane_coupling: LaneCoupling::LaneLocal,
        }
    }

    /// A per-lane field over the given instance.
    #[must_use]
    pub const fn field(instance: InstanceRef) -> Self {
        Self {
            temporality: Temporality::Continuous,
            cardinality: Cardinality::Many(instance),
            lane_coupling: LaneCoupling::LaneLocal,
        }
    }
}

/// Optional refinement contract carried alongside a type, e.g. `Wrap01` for
/// a phase output guaranteed to stay in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Contract {
    Wrap01,
}

/// The unified type carried on every port, edge, and signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanonicalType {
    pub payload: PayloadTerm,
    pub unit: UnitTerm,
    pub extent: Extent,
    pub contract: Option<Contract>,
}

impl CanonicalType {
    /// Builds a fully concrete signal type (continuous, cardinality one).
    #[must_use]
    pub const fn concrete(payload: Payload, unit: Unit) -> Self {
        Self {
            payload: PayloadTerm::Concrete(payload),
            unit: UnitTerm::Concrete(unit),
            extent: Extent::signal(),
            contract: None,
        }
    }

    /// Attaches a contract to this type.
    #[must_use]
    pub const fn with_contract(mut self, contract: Contract) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Attaches an extent to this type.
    #[must_use]
    pub const fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }
}

/// Failure kind from [`unify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnifyError {
    #[error("payload conflict: {a:?} vs {b:?}")]
    PayloadConflict { a: Payload, b: Payload },
    #[error("unit conflict: {a:?} vs {b:?}")]
    UnitConflict { a: Unit, b: Unit },
    #[error("cardinality conflict")]
    CardinalityConflict,
    #[error("temporality conflict: {a:?} vs {b:?}")]
    TemporalityConflict { a: Temporality, b: Temporality },
}

/// A resolved binding set produced by [`unify`]; composes left-to-right.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    pub payloads: BTreeMap<PayloadVar, Payload>,
    pub units: BTreeMap<UnitVar, Unit>,
}

impl Substitution {
    /// Applies `other` on top of `self`, `other`'s bindings winning on
    /// overlap (later unifications refine earlier ones).
    pub fn compose(&mut self, other: Self) {
        self.payloads.extend(other.payloads);
        self.units.extend(other.units);
    }

    /// Resolves a payload term through this substitution, leaving
    /// unresolved variables as-is.
    #[must_use]
    pub fn resolve_payload(&self, term: PayloadTerm) -> PayloadTerm {
        match term {
            PayloadTerm::Var(v) => self
                .payloads
                .get(&v)
                .map_or(term, |p| PayloadTerm::Concrete(*p)),
            concrete => concrete,
        }
    }

    /// Resolves a unit term through this substitution, leaving unresolved
    /// variables as-is.
    #[must_use]
    pub fn resolve_unit(&self, term: UnitTerm) -> UnitTerm {
        match term {
            UnitTerm::Var(v) => self.units.get(&v).map_or(term, |u| UnitTerm::Concrete(*u)),
            concrete => concrete,
        }
    }

    /// Applies this substitution to a type, resolving any variables it can.
    #[must_use]
    pub fn apply(&self, ty: CanonicalType) -> CanonicalType {
        CanonicalType {
            payload: self.resolve_payload(ty.payload),
            unit: self.resolve_unit(ty.unit),
            extent: ty.extent,
            contract: ty.contract,
        }
    }
}

/// Unifies two payload/unit terms, producing a [`Substitution`] or a
/// [`UnifyError`]. Payload and unit variables unify independently; extent
/// and contract are not unified here (cardinality join is the inference
/// engine's responsibility, per-block).
///
/// # Errors
/// Returns [`UnifyError`] if the two types carry incompatible concrete
/// payloads, units, or temporalities.
pub fn unify(t1: CanonicalType, t2: CanonicalType) -> Result<Substitution, UnifyError> {
    let mut sub = Substitution::default();

    match (t1.payload, t2.payload) {
        (PayloadTerm::Var(v), PayloadTerm::Concrete(p)) | (PayloadTerm::Concrete(p), PayloadTerm::Var(v)) => {
            sub.payloads.insert(v, p);
        }
        (PayloadTerm::Var(v1), PayloadTerm::Var(v2)) => {
            // Leave both free but linked is out of scope for this arity;
            // resolving one in terms of the other is unnecessary since the
            // inference engine always unifies against a concrete side
            // eventually (ports are seeded from block declarations).
            let _ = (v1, v2);
        }
        (PayloadTerm::Concrete(a), PayloadTerm::Concrete(b)) if a == b => {}
        (PayloadTerm::Concrete(a), PayloadTerm::Concrete(b)) => {
            return Err(UnifyError::PayloadConflict { a, b });
        }
    }

    match (t1.unit, t2.unit) {
        (UnitTerm::Var(v), UnitTerm::Concrete(u)) | (UnitTerm::Concrete(u), UnitTerm::Var(v)) => {
            sub.units.insert(v, u);
        }
        (UnitTerm::Var(_), UnitTerm::Var(_)) => {}
        (UnitTerm::Concrete(a), UnitTerm::Concrete(b)) if units_equal(a, b) => {}
        (UnitTerm::Concrete(a), UnitTerm::Concrete(b)) => {
            return Err(UnifyError::UnitConflict { a, b });
        }
    }

    if t1.extent.temporality != t2.extent.temporality {
        return Err(UnifyError::TemporalityConflict {
            a: t1.extent.temporality,
            b: t2.extent.temporality,
        });
    }

    Ok(sub)
}

fn units_equal(a: Unit, b: Unit) -> bool {
    // No implicit coercion between concrete units (e.g. seconds vs ms):
    // structural equality only. Cast blocks are the only bridge.
    a == b
}

/// `true` if this payload term is still a variable (unresolved).
#[must_use]
pub const fn is_payload_var(term: PayloadTerm) -> bool {
    term.is_var()
}

/// Asserts that `term` is fully resolved, returning the value or a
/// [`crate::errors::LoweringError`] naming `what` for diagnostics.
///
/// # Errors
/// Returns [`crate::errors::LoweringError::UnresolvedVariable`] if `term` is
/// still a variable at lowering time.
pub fn require_inst_payload(
    term: PayloadTerm,
    what: &str,
) -> Result<Payload, crate::errors::LoweringError> {
    match term {
        PayloadTerm::Concrete(p) => Ok(p),
        PayloadTerm::Var(_) => Err(crate::errors::LoweringError::UnresolvedVariable {
            what: what.to_owned(),
        }),
    }
}
