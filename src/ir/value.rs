//! Values of the host IR.
//!
//! Every entity an instruction can refer to is a [`Value`]: function arguments, global
//! variables, function symbols, integer constants and the instructions themselves.

use std::fmt;

use crate::ir::{instruction::Instruction, ValueId};

/// The type of a value.
///
/// The analyses only need to distinguish addresses from integers; integer widths are
/// carried for printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (stores, returns).
    Void,
    /// An integer of the given bit width.
    Int(u32),
    /// An address.
    Ptr,
    /// A function symbol.
    Func,
}

impl Type {
    /// Returns `true` for [`Type::Ptr`].
    #[must_use]
    pub const fn is_pointer(self) -> bool {
        matches!(self, Type::Ptr)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Ptr => write!(f, "ptr"),
            Type::Func => write!(f, "fn"),
        }
    }
}

/// Source-level description of a variable, taken from debug metadata.
///
/// Only used to render memory locations the way a user wrote them
/// (`"12: int a"`); the analyses never look at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugVariable {
    /// Declaration line.
    pub line: u32,
    /// Source name of the variable.
    pub name: String,
    /// Source name of the variable's type.
    pub type_name: String,
}

impl DebugVariable {
    /// Creates a new debug description.
    #[must_use]
    pub fn new(line: u32, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            line,
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for DebugVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.line, self.type_name, self.name)
    }
}

/// What a value is.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// A formal parameter of the function.
    Argument {
        /// Position in the parameter list.
        index: usize,
        /// The parameter is declared not to alias any other pointer visible to the function.
        noalias: bool,
    },
    /// A global variable; its value is the variable's address.
    Global {
        /// Size of the variable in bytes, if known.
        size: Option<u64>,
    },
    /// A function symbol (direct call target).
    Function,
    /// An integer constant.
    Constant(i64),
    /// An instruction of the function body.
    Instruction(Instruction),
}

/// An entry of a function's value table.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// What the value is.
    pub kind: ValueKind,
    /// The type of the value.
    pub ty: Type,
    /// Optional IR-level name, printed as `%name`.
    pub name: Option<String>,
    /// Optional source-level description.
    pub debug: Option<DebugVariable>,
}

impl Value {
    /// Creates an unnamed value.
    #[must_use]
    pub fn new(kind: ValueKind, ty: Type) -> Self {
        Self {
            kind,
            ty,
            name: None,
            debug: None,
        }
    }

    /// Returns the instruction if this value is one.
    #[must_use]
    pub const fn as_instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    /// Returns the constant if this value is one.
    #[must_use]
    pub const fn as_constant(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Returns `true` if the value has pointer type.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        self.ty.is_pointer()
    }
}

/// Formats a value reference as an operand (`%name`, `%v3` or a literal).
pub(crate) fn write_operand(
    f: &mut impl fmt::Write,
    id: ValueId,
    value: Option<&Value>,
) -> fmt::Result {
    match value {
        Some(Value {
            kind: ValueKind::Constant(c),
            ..
        }) => write!(f, "{c}"),
        Some(Value {
            kind: ValueKind::Function | ValueKind::Global { .. },
            name: Some(name),
            ..
        }) => write!(f, "@{name}"),
        Some(Value { name: Some(name), .. }) => write!(f, "%{name}"),
        _ => write!(f, "%{id}"),
    }
}
