//! Incremental construction of [`Function`]s.
//!
//! [`FunctionBuilder`] appends instructions in program order and tracks the loop nest with
//! explicit `begin_loop` / `end_loop` calls. Every operand is validated when it is used, so a
//! finished [`Function`] never contains dangling references or addresses of non-pointer
//! type.
//!
//! # Examples
//!
//! ```rust
//! use memscope::ir::{FunctionBuilder, Type};
//!
//! // for (i = 0; i < n; ++i) a[i] = 0;
//! let mut b = FunctionBuilder::new("zero");
//! let a = b.argument("a", Type::Ptr);
//! let zero = b.constant(0);
//! let one = b.constant(1);
//! b.begin_loop("i");
//! let i = b.induction("i", zero, one)?;
//! let p = b.element_ptr(a, i, 4)?;
//! b.store(p, zero, 4)?;
//! b.end_loop()?;
//! let function = b.finish()?;
//! assert_eq!(function.instruction_count(), 3);
//! # Ok::<(), memscope::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    ir::{
        function::{Function, Loop},
        instruction::{BinaryOp, CallEffect, CallTarget, Instruction, Opcode, TbaaTag},
        value::{DebugVariable, Type, Value, ValueKind},
        LoopId, ValueId,
    },
    Error, Result,
};

/// Builder for a single [`Function`].
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    name: String,
    values: Vec<Value>,
    loops: Vec<Loop>,
    body: Vec<ValueId>,
    loop_stack: Vec<LoopId>,
    constants: HashMap<i64, ValueId>,
    arguments: usize,
}

impl FunctionBuilder {
    /// Starts a new function called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn push_value(&mut self, value: Value) -> ValueId {
        let id = ValueId::new(self.values.len());
        self.values.push(value);
        id
    }

    fn push_named(&mut self, kind: ValueKind, ty: Type, name: &str) -> ValueId {
        let mut value = Value::new(kind, ty);
        value.name = Some(name.to_string());
        self.push_value(value)
    }

    fn push_instruction(&mut self, op: Opcode, ty: Type) -> ValueId {
        let inst = Instruction {
            op,
            parent: self.current_loop(),
        };
        let id = self.push_value(Value::new(ValueKind::Instruction(inst), ty));
        self.body.push(id);
        id
    }

    fn check(&self, id: ValueId) -> Result<&Value> {
        self.values.get(id.index()).ok_or(Error::UnknownValue(id))
    }

    fn check_pointer(&self, id: ValueId) -> Result<()> {
        if self.check(id)?.is_pointer() {
            Ok(())
        } else {
            Err(Error::NotAPointer(id))
        }
    }

    /// Adds a formal parameter.
    pub fn argument(&mut self, name: &str, ty: Type) -> ValueId {
        let index = self.arguments;
        self.arguments += 1;
        self.push_named(
            ValueKind::Argument {
                index,
                noalias: false,
            },
            ty,
            name,
        )
    }

    /// Adds a pointer parameter that is declared not to alias anything else (`restrict`).
    pub fn noalias_argument(&mut self, name: &str) -> ValueId {
        let index = self.arguments;
        self.arguments += 1;
        self.push_named(
            ValueKind::Argument {
                index,
                noalias: true,
            },
            Type::Ptr,
            name,
        )
    }

    /// Declares a global variable of `size` bytes (if known); the value is its address.
    pub fn global(&mut self, name: &str, size: Option<u64>) -> ValueId {
        self.push_named(ValueKind::Global { size }, Type::Ptr, name)
    }

    /// Declares a function symbol usable as a direct call target.
    pub fn function_symbol(&mut self, name: &str) -> ValueId {
        self.push_named(ValueKind::Function, Type::Func, name)
    }

    /// Returns the integer constant `value`, creating it on first use.
    pub fn constant(&mut self, value: i64) -> ValueId {
        if let Some(&id) = self.constants.get(&value) {
            return id;
        }
        let id = self.push_value(Value::new(ValueKind::Constant(value), Type::Int(64)));
        self.constants.insert(value, id);
        id
    }

    /// Opens a loop nested in the current one; following instructions belong to it.
    pub fn begin_loop(&mut self, name: &str) -> LoopId {
        let parent = self.current_loop();
        let depth = self.loop_stack.len() + 1;
        let id = LoopId::new(self.loops.len());
        self.loops.push(Loop {
            parent,
            depth,
            name: Some(name.to_string()),
        });
        self.loop_stack.push(id);
        id
    }

    /// Closes the innermost open loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if no loop is open.
    pub fn end_loop(&mut self) -> Result<LoopId> {
        self.loop_stack
            .pop()
            .ok_or_else(|| malformed_error!("end_loop without matching begin_loop"))
    }

    /// The innermost open loop.
    #[must_use]
    pub fn current_loop(&self) -> Option<LoopId> {
        self.loop_stack.last().copied()
    }

    /// Allocates `size` bytes on the stack.
    pub fn alloca(&mut self, name: &str, size: u64) -> ValueId {
        let id = self.push_instruction(Opcode::Alloca { size }, Type::Ptr);
        self.values[id.index()].name = Some(name.to_string());
        id
    }

    /// Loads a `size`-byte integer from `ptr`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ptr` does not exist or is not a pointer.
    pub fn load(&mut self, ptr: ValueId, size: u64) -> Result<ValueId> {
        self.load_typed(ptr, size, None, int_type(size))
    }

    /// Loads a `size`-byte integer from `ptr` carrying a type-based alias tag.
    ///
    /// # Errors
    ///
    /// Returns an error if `ptr` does not exist or is not a pointer.
    pub fn load_tagged(&mut self, ptr: ValueId, size: u64, tag: TbaaTag) -> Result<ValueId> {
        self.load_typed(ptr, size, Some(tag), int_type(size))
    }

    /// Loads an 8-byte pointer from `ptr`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ptr` does not exist or is not a pointer.
    pub fn load_pointer(&mut self, ptr: ValueId) -> Result<ValueId> {
        self.load_typed(ptr, 8, None, Type::Ptr)
    }

    fn load_typed(
        &mut self,
        ptr: ValueId,
        size: u64,
        tbaa: Option<TbaaTag>,
        ty: Type,
    ) -> Result<ValueId> {
        self.check_pointer(ptr)?;
        Ok(self.push_instruction(Opcode::Load { ptr, size, tbaa }, ty))
    }

    /// Stores `size` bytes of `value` at `ptr`.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist or `ptr` is not a pointer.
    pub fn store(&mut self, ptr: ValueId, value: ValueId, size: u64) -> Result<ValueId> {
        self.store_typed(ptr, value, size, None)
    }

    /// Stores `size` bytes of `value` at `ptr` carrying a type-based alias tag.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist or `ptr` is not a pointer.
    pub fn store_tagged(
        &mut self,
        ptr: ValueId,
        value: ValueId,
        size: u64,
        tag: TbaaTag,
    ) -> Result<ValueId> {
        self.store_typed(ptr, value, size, Some(tag))
    }

    fn store_typed(
        &mut self,
        ptr: ValueId,
        value: ValueId,
        size: u64,
        tbaa: Option<TbaaTag>,
    ) -> Result<ValueId> {
        self.check_pointer(ptr)?;
        self.check(value)?;
        Ok(self.push_instruction(
            Opcode::Store {
                ptr,
                value,
                size,
                tbaa,
            },
            Type::Void,
        ))
    }

    /// Integer arithmetic `lhs op rhs`.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist.
    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        self.check(lhs)?;
        self.check(rhs)?;
        Ok(self.push_instruction(Opcode::Binary { op, lhs, rhs }, Type::Int(64)))
    }

    /// `lhs + rhs`
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist.
    pub fn add(&mut self, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist.
    pub fn sub(&mut self, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist.
    pub fn mul(&mut self, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// `lhs << rhs`
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist.
    pub fn shl(&mut self, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        self.binary(BinaryOp::Shl, lhs, rhs)
    }

    /// Converts `operand` to `ty` without changing its value.
    ///
    /// # Errors
    ///
    /// Returns an error if `operand` does not exist.
    pub fn cast(&mut self, operand: ValueId, ty: Type) -> Result<ValueId> {
        self.check(operand)?;
        Ok(self.push_instruction(Opcode::Cast { operand }, ty))
    }

    /// Address of element `index` of `stride`-byte elements starting at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist or `base` is not a pointer.
    pub fn element_ptr(&mut self, base: ValueId, index: ValueId, stride: i64) -> Result<ValueId> {
        self.check_pointer(base)?;
        self.check(index)?;
        Ok(self.push_instruction(
            Opcode::ElementPtr {
                base,
                index,
                stride,
            },
            Type::Ptr,
        ))
    }

    /// Induction variable of the innermost open loop: `start`, then `+ step` per iteration.
    ///
    /// A pointer-typed `start` yields a pointer induction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] outside of a loop, or an error if an operand does not
    /// exist.
    pub fn induction(&mut self, name: &str, start: ValueId, step: ValueId) -> Result<ValueId> {
        if self.current_loop().is_none() {
            return Err(malformed_error!("induction '{}' outside of a loop", name));
        }
        let ty = self.check(start)?.ty;
        self.check(step)?;
        let id = self.push_instruction(Opcode::Induction { start, step }, ty);
        self.values[id.index()].name = Some(name.to_string());
        Ok(id)
    }

    /// Calls `target` with `args`; the callee's memory behaviour is `effect`.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist, a direct target is not a function
    /// symbol, or an indirect target is not a pointer.
    pub fn call(
        &mut self,
        target: CallTarget,
        args: &[ValueId],
        effect: CallEffect,
        ret: Type,
    ) -> Result<ValueId> {
        match target {
            CallTarget::Direct(callee) => {
                if !matches!(self.check(callee)?.kind, ValueKind::Function) {
                    return Err(Error::NotAFunction(callee));
                }
            }
            CallTarget::Indirect(callee) => self.check_pointer(callee)?,
        }
        for &arg in args {
            self.check(arg)?;
        }
        Ok(self.push_instruction(
            Opcode::Call {
                target,
                args: args.to_vec(),
                effect,
            },
            ret,
        ))
    }

    /// Returns from the function.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not exist.
    pub fn ret(&mut self, value: Option<ValueId>) -> Result<ValueId> {
        if let Some(v) = value {
            self.check(v)?;
        }
        Ok(self.push_instruction(Opcode::Return { value }, Type::Void))
    }

    /// Names a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownValue`] if `id` does not exist.
    pub fn set_name(&mut self, id: ValueId, name: &str) -> Result<()> {
        self.check(id)?;
        self.values[id.index()].name = Some(name.to_string());
        Ok(())
    }

    /// Attaches a source-level description to a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownValue`] if `id` does not exist.
    pub fn set_debug(&mut self, id: ValueId, debug: DebugVariable) -> Result<()> {
        self.check(id)?;
        self.values[id.index()].debug = Some(debug);
        Ok(())
    }

    /// Finishes construction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if a loop is still open.
    pub fn finish(self) -> Result<Function> {
        if let Some(open) = self.current_loop() {
            return Err(malformed_error!("loop {} is never closed", open));
        }
        Ok(Function {
            name: self.name,
            values: self.values,
            loops: self.loops,
            body: self.body,
        })
    }
}

fn int_type(size: u64) -> Type {
    Type::Int(u32::try_from(size.saturating_mul(8)).unwrap_or(u32::MAX))
}
