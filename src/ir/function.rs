//! Functions, loop nests and modules of the host IR.

use std::fmt;

use crate::ir::{
    instruction::{Instruction, Opcode},
    value::{write_operand, Value, ValueKind},
    LoopId, ValueId,
};

/// A loop of the function's loop nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    /// The directly enclosing loop.
    pub parent: Option<LoopId>,
    /// Nesting depth, 1 for outermost loops.
    pub depth: usize,
    /// Optional name used when printing.
    pub name: Option<String>,
}

/// A function: a value table, a loop nest and the instruction order of its body.
///
/// Functions are immutable once built (see [`FunctionBuilder`](crate::ir::FunctionBuilder)),
/// which makes it safe to analyse different functions of a module concurrently.
#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) values: Vec<Value>,
    pub(crate) loops: Vec<Loop>,
    pub(crate) body: Vec<ValueId>,
}

impl Function {
    /// The function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value for `id`.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index())
    }

    /// Returns the instruction for `id`, if `id` is an instruction of this function.
    #[must_use]
    pub fn instruction(&self, id: ValueId) -> Option<&Instruction> {
        self.value(id).and_then(Value::as_instruction)
    }

    /// Number of values (arguments, globals, constants and instructions).
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Iterates over the instructions in program order.
    pub fn instructions(&self) -> impl Iterator<Item = (ValueId, &Instruction)> + '_ {
        self.body
            .iter()
            .filter_map(move |&id| self.instruction(id).map(|inst| (id, inst)))
    }

    /// Number of instructions in the body.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.body.len()
    }

    /// Returns the loop for `id`.
    #[must_use]
    pub fn loop_info(&self, id: LoopId) -> Option<&Loop> {
        self.loops.get(id.index())
    }

    /// Iterates over all loop handles, outer loops first.
    pub fn loops(&self) -> impl Iterator<Item = LoopId> {
        (0..self.loops.len()).map(LoopId::new)
    }

    /// Nesting depth of `id`, 0 for unknown loops.
    #[must_use]
    pub fn loop_depth(&self, id: LoopId) -> usize {
        self.loop_info(id).map_or(0, |l| l.depth)
    }

    /// Returns `true` if `outer` is `inner` or encloses it.
    #[must_use]
    pub fn loop_contains(&self, outer: LoopId, inner: LoopId) -> bool {
        let mut current = Some(inner);
        while let Some(lp) = current {
            if lp == outer {
                return true;
            }
            current = self.loop_info(lp).and_then(|l| l.parent);
        }
        false
    }

    /// Innermost loop containing the instruction `id`, `None` for non-instructions and for
    /// instructions outside of all loops.
    #[must_use]
    pub fn parent_loop(&self, id: ValueId) -> Option<LoopId> {
        self.instruction(id).and_then(|inst| inst.parent)
    }

    /// Returns `true` if `id` is a pointer-typed value.
    #[must_use]
    pub fn is_pointer(&self, id: ValueId) -> bool {
        self.value(id).is_some_and(Value::is_pointer)
    }

    /// Strips value-preserving casts from `id`.
    #[must_use]
    pub fn strip_casts(&self, mut id: ValueId) -> ValueId {
        while let Some(Instruction {
            op: Opcode::Cast { operand },
            ..
        }) = self.instruction(id)
        {
            id = *operand;
        }
        id
    }

    /// Returns a printable operand reference for `id` (`%name`, `@global`, literal).
    #[must_use]
    pub fn operand_name(&self, id: ValueId) -> String {
        let mut out = String::new();
        let _ = write_operand(&mut out, id, self.value(id));
        out
    }

    /// Returns a displayable form of the value `id`.
    ///
    /// Instructions print in full (`%p = elementptr %a, %i x 4`), everything else prints
    /// as an operand reference.
    #[must_use]
    pub fn display_value(&self, id: ValueId) -> ValueDisplay<'_> {
        ValueDisplay { function: self, id }
    }

    /// Returns `true` if `id` names a function symbol.
    #[must_use]
    pub fn is_function_symbol(&self, id: ValueId) -> bool {
        matches!(
            self.value(id),
            Some(Value {
                kind: ValueKind::Function,
                ..
            })
        )
    }
}

/// Textual form of a value, see [`Function::display_value`].
pub struct ValueDisplay<'a> {
    function: &'a Function,
    id: ValueId,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = self.function;
        let Some(inst) = function.instruction(self.id) else {
            return write_operand(f, self.id, function.value(self.id));
        };

        let operand = |id: ValueId| function.operand_name(id);
        if !matches!(inst.op, Opcode::Store { .. } | Opcode::Return { .. }) {
            write!(f, "{} = ", operand(self.id))?;
        }
        write!(f, "{}", inst.mnemonic())?;
        match &inst.op {
            Opcode::Alloca { size } => write!(f, " {size}"),
            Opcode::Load { ptr, size, .. } => write!(f, " {size}, {}", operand(*ptr)),
            Opcode::Store {
                ptr, value, size, ..
            } => write!(f, " {size}, {}, {}", operand(*value), operand(*ptr)),
            Opcode::Binary { lhs, rhs, .. } => {
                write!(f, " {}, {}", operand(*lhs), operand(*rhs))
            }
            Opcode::Cast { operand: value } => write!(f, " {}", operand(*value)),
            Opcode::ElementPtr {
                base,
                index,
                stride,
            } => write!(f, " {}, {} x {stride}", operand(*base), operand(*index)),
            Opcode::Induction { start, step } => {
                write!(f, " {}, +{}", operand(*start), operand(*step))?;
                if let Some(lp) = inst.parent {
                    write!(f, " <{lp}>")?;
                }
                Ok(())
            }
            Opcode::Call { target, args, .. } => {
                write!(f, " {}(", operand(target.callee()))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", operand(*arg))?;
                }
                write!(f, ")")
            }
            Opcode::Return { value } => match value {
                Some(v) => write!(f, " {}", operand(*v)),
                None => Ok(()),
            },
        }
    }
}

/// A collection of functions analysed together.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// The functions of the module.
    pub functions: Vec<Function>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Adds a function to the module.
    pub fn push(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
