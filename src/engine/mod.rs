//! Boundary to the boolean-expression engine.
//!
//! The engine owns every node, context, sequence, point and text buffer and
//! hands out opaque [`RawHandle`]s for them. Each handle returned by a
//! constructor is owned by the caller and must be given back through the
//! matching `*_del` call exactly once. Handles passed as arguments are
//! borrowed; the engine never takes ownership of an argument.
//!
//! Calls on a null or unknown handle do not panic: they return the null
//! handle, zero or `false` (`node_kind` returns an unused tag), and `*_del`
//! on such a handle is a no-op.

use core::fmt;

mod algebra;
pub mod memory;

pub use memory::{EngineStats, MemoryEngine};

/// Opaque engine handle. Zero is the null sentinel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        RawHandle(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Node discriminant as reported by [`Engine::node_kind`].
///
/// Operator kinds come in pairs; the negated form differs from the positive
/// form only in the low bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Zero = 0x00,
    One = 0x01,
    Logical = 0x04,
    Illogical = 0x06,
    Complement = 0x08,
    Variable = 0x09,
    Nor = 0x10,
    Or = 0x11,
    Nand = 0x12,
    And = 0x13,
    Xnor = 0x14,
    Xor = 0x15,
    Unequal = 0x16,
    Equal = 0x17,
    NotImplies = 0x18,
    Implies = 0x19,
    NotIfThenElse = 0x1A,
    IfThenElse = 0x1B,
}

impl Kind {
    pub const fn from_tag(tag: u8) -> Option<Kind> {
        Some(match tag {
            0x00 => Kind::Zero,
            0x01 => Kind::One,
            0x04 => Kind::Logical,
            0x06 => Kind::Illogical,
            0x08 => Kind::Complement,
            0x09 => Kind::Variable,
            0x10 => Kind::Nor,
            0x11 => Kind::Or,
            0x12 => Kind::Nand,
            0x13 => Kind::And,
            0x14 => Kind::Xnor,
            0x15 => Kind::Xor,
            0x16 => Kind::Unequal,
            0x17 => Kind::Equal,
            0x18 => Kind::NotImplies,
            0x19 => Kind::Implies,
            0x1A => Kind::NotIfThenElse,
            0x1B => Kind::IfThenElse,
            _ => return None,
        })
    }

    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn is_constant(self) -> bool {
        matches!(self, Kind::Zero | Kind::One | Kind::Logical | Kind::Illogical)
    }

    pub const fn is_literal(self) -> bool {
        matches!(self, Kind::Complement | Kind::Variable)
    }

    pub const fn is_operator(self) -> bool {
        self.tag() >= 0x10
    }

    /// Operator kinds only: true for the positive member of the pair.
    pub const fn is_positive(self) -> bool {
        self.tag() & 1 == 1
    }

    /// The other member of an operator or literal pair. Constants map to
    /// themselves except Zero/One, which swap.
    pub fn negated(self) -> Kind {
        match self {
            Kind::Zero => Kind::One,
            Kind::One => Kind::Zero,
            Kind::Logical | Kind::Illogical => self,
            _ => Kind::from_tag(self.tag() ^ 1).unwrap_or(self),
        }
    }

    /// Name used when rendering operator nodes.
    pub const fn name(self) -> &'static str {
        match self {
            Kind::Zero => "Zero",
            Kind::One => "One",
            Kind::Logical => "Logical",
            Kind::Illogical => "Illogical",
            Kind::Complement => "Complement",
            Kind::Variable => "Variable",
            Kind::Nor => "Nor",
            Kind::Or => "Or",
            Kind::Nand => "Nand",
            Kind::And => "And",
            Kind::Xnor => "Xnor",
            Kind::Xor => "Xor",
            Kind::Unequal => "Unequal",
            Kind::Equal => "Equal",
            Kind::NotImplies => "NotImplies",
            Kind::Implies => "Implies",
            Kind::NotIfThenElse => "NotIfThenElse",
            Kind::IfThenElse => "IfThenElse",
        }
    }
}

/// Whole-expression rewrites.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    Simplify,
    Cnf,
    Dnf,
    Nnf,
    /// Every operator has at most two arguments.
    BinaryOp,
    /// Only And, Or and negation.
    LatticeOp,
    /// Negated operators pushed down to literals.
    PositiveOp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Measure {
    Depth,
    Size,
    /// Number of variables in the support.
    Degree,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Property {
    Cnf,
    Dnf,
    Clause,
    /// Simplification would leave the node unchanged.
    Simple,
}

/// The handle-based engine interface.
pub trait Engine: Send + Sync + 'static {
    // Contexts.
    fn context_new(&self) -> RawHandle;
    fn context_del(&self, ctx: RawHandle);
    /// The literal node for variable `name`, allocating the variable on
    /// first use. Returns an owned node handle.
    fn context_get_var(&self, ctx: RawHandle, name: &str) -> RawHandle;

    // Nodes.
    /// A fresh handle to one of the four constant nodes.
    fn constant(&self, kind: Kind) -> RawHandle;
    /// The node's [`Kind`] tag. Handles that are not live nodes report a
    /// tag outside `Kind`'s range, never Zero.
    fn node_kind(&self, node: RawHandle) -> u8;
    /// The owning context of a literal node; null for other nodes.
    fn node_context(&self, node: RawHandle) -> RawHandle;
    /// Literal id within its context.
    fn node_id(&self, node: RawHandle) -> u32;
    fn node_del(&self, node: RawHandle);

    // Algebra. Every returned node handle is owned by the caller.
    fn not(&self, node: RawHandle) -> RawHandle;
    /// Build an operator node of `kind` over `args`.
    fn apply(&self, kind: Kind, args: &[RawHandle]) -> RawHandle;
    fn transform(&self, node: RawHandle, how: Transform) -> RawHandle;
    /// Tseytin encoding with fresh auxiliary variables named `{aux}_{n}` in
    /// `ctx`.
    fn tseytin(&self, node: RawHandle, ctx: RawHandle, aux: &str) -> RawHandle;
    /// Shannon expansion over `vars`. Null when `vars` is too large to
    /// enumerate.
    fn expand(&self, node: RawHandle, vars: &[RawHandle]) -> RawHandle;
    /// Substitute constants for variables.
    fn restrict(&self, node: RawHandle, point: &[(RawHandle, RawHandle)]) -> RawHandle;
    /// Substitute expressions for variables.
    fn compose(&self, node: RawHandle, map: &[(RawHandle, RawHandle)]) -> RawHandle;
    /// The positive variable of a literal.
    fn literal_abs(&self, lit: RawHandle) -> RawHandle;

    // Queries.
    fn measure(&self, node: RawHandle, what: Measure) -> u32;
    fn test(&self, node: RawHandle, what: Property) -> bool;
    fn equiv(&self, a: RawHandle, b: RawHandle) -> bool;

    // Satisfiability.
    /// A satisfying point, or null when unsatisfiable. Never null for a
    /// satisfiable node.
    fn sat(&self, node: RawHandle) -> RawHandle;
    /// Pop the next `(variable, constant)` pair of a point. Both handles are
    /// owned by the caller.
    fn point_next(&self, point: RawHandle) -> Option<(RawHandle, RawHandle)>;
    fn point_del(&self, point: RawHandle);

    // Sequences. Items are owned by the caller.
    /// Operator arguments (node items).
    fn args(&self, node: RawHandle) -> RawHandle;
    /// Support variables (node items).
    fn support(&self, node: RawHandle) -> RawHandle;
    /// Post-order traversal (node items).
    fn dfs(&self, node: RawHandle) -> RawHandle;
    /// Every point of the support's domain (point items). Null when the
    /// support is too large to enumerate.
    fn domain(&self, node: RawHandle) -> RawHandle;
    /// Cofactors with respect to every point over `vars` (node items).
    /// Null when `vars` is too large to enumerate.
    fn cofactors(&self, node: RawHandle, vars: &[RawHandle]) -> RawHandle;
    /// Next item, or null at the end.
    fn seq_next(&self, seq: RawHandle) -> RawHandle;
    fn seq_del(&self, seq: RawHandle);

    // Text.
    fn render(&self, node: RawHandle) -> RawHandle;
    fn text_copy(&self, text: RawHandle) -> String;
    fn text_del(&self, text: RawHandle);
}
