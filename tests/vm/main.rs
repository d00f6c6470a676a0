//! Integration tests for the VM, organized by feature
//!
//! These tests exercise the VM through the public API. Frames run on a small
//! stack-machine instruction set defined here ([`ToyDispatch`]); the real
//! opcode set is the host's business.
//!
//! ## Aggressive Test Defaults
//!
//! Tests collect garbage after every allocation by default to catch rooting
//! bugs. Override via environment variables:
//!
//! ```bash
//! cargo test                           # Default: aggressive settings
//! GC_THRESHOLD=100 cargo test          # Less aggressive GC for faster runs
//! ```

mod calling_convention;
mod interval;
mod json;
mod path;

use std::rc::Rc;

use aptvm::{
    Dispatch, FunctionDefinition, ManualClock, ObjectId, ParameterSlot, PreloadFlags, Value, Vm, VmConfig,
    VmError,
};

/// Create a VM with aggressive defaults for testing:
/// - GC_THRESHOLD=1 (collect whenever a tick ends with new allocations)
pub fn create_test_vm() -> Vm {
    let mut vm = Vm::new();
    vm.set_gc_threshold(gc_threshold());
    vm
}

/// Like [`create_test_vm`], driven by a manual clock and the toy dispatcher
pub fn create_scripted_vm(functions: Vec<FunctionDefinition>) -> (Vm, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let config = VmConfig {
        gc_threshold: gc_threshold(),
        ..VmConfig::default()
    };
    let mut vm = Vm::with_clock(config, clock.clone());
    vm.set_dispatcher(Rc::new(ToyDispatch::new(functions)));
    (vm, clock)
}

fn gc_threshold() -> usize {
    // GC_THRESHOLD=0 disables automatic collection
    std::env::var("GC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1)
}

/// Unwrap an integer result
#[allow(clippy::panic)]
pub fn int(value: &Value) -> i32 {
    match value {
        Value::Integer(n) => *n,
        other => panic!("expected an integer, got {:?}", other),
    }
}

/// Unwrap an object result
#[allow(clippy::panic)]
pub fn obj(value: &Value) -> ObjectId {
    match value {
        Value::Object(id) => *id,
        other => panic!("expected an object, got {:?}", other),
    }
}

/// Unwrap a string result
#[allow(clippy::panic)]
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => panic!("expected a string, got {:?}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Test instruction set
// ═══════════════════════════════════════════════════════════════════════════

/// Opcodes of the test machine. Operands follow the opcode byte,
/// little-endian.
pub mod op {
    /// Return `undefined`
    pub const END: u8 = 0x00;
    /// `u16` constant index
    pub const PUSH_CONST: u8 = 0x01;
    /// `u8` register
    pub const PUSH_REG: u8 = 0x02;
    /// `u8` register; pops
    pub const STORE_REG: u8 = 0x03;
    /// name -> value
    pub const GET_VAR: u8 = 0x04;
    /// name, value ->
    pub const SET_VAR: u8 = 0x05;
    /// name, value ->
    pub const DEFINE_LOCAL: u8 = 0x06;
    /// target, name -> value
    pub const GET_MEMBER: u8 = 0x07;
    /// target, name, value ->
    pub const SET_MEMBER: u8 = 0x08;
    /// a, b -> a + b
    pub const ADD: u8 = 0x09;
    /// a, b -> a - b
    pub const SUB: u8 = 0x0A;
    /// a, b -> a < b
    pub const LESS: u8 = 0x0B;
    /// args..., argc, function -> result
    pub const CALL: u8 = 0x0C;
    /// args..., argc, target, name -> result
    pub const CALL_METHOD: u8 = 0x0D;
    /// value ->
    pub const RETURN: u8 = 0x0E;
    /// `u8` definition index; -> function
    pub const DEFINE_FUNCTION: u8 = 0x0F;
    pub const POP: u8 = 0x10;
    /// `i16` offset; pops the condition
    pub const JUMP_IF_FALSE: u8 = 0x11;
    /// `i16` offset
    pub const JUMP: u8 = 0x12;
    /// message -> (fails)
    pub const THROW: u8 = 0x13;
    /// args..., argc, constructor -> instance
    pub const NEW: u8 = 0x14;
    pub const DUP: u8 = 0x15;
}

/// Executes [`op`] instructions, one per step.
pub struct ToyDispatch {
    functions: Vec<FunctionDefinition>,
}

impl ToyDispatch {
    pub fn new(functions: Vec<FunctionDefinition>) -> Self {
        Self { functions }
    }
}

fn pop(vm: &mut Vm) -> Result<Value, VmError> {
    Ok(vm.current_context_mut()?.pop())
}

fn push(vm: &mut Vm, value: Value) -> Result<(), VmError> {
    vm.current_context_mut()?.push(value);
    Ok(())
}

fn pop_name(vm: &mut Vm) -> Result<String, VmError> {
    let value = pop(vm)?;
    Ok(vm.to_display_string(&value)?.to_string())
}

/// Pop an argument count and that many arguments, first argument deepest
fn pop_args(vm: &mut Vm) -> Result<Vec<Value>, VmError> {
    let count = pop(vm)?.to_integer();
    let mut args = Vec::new();
    for _ in 0..count {
        args.push(pop(vm)?);
    }
    args.reverse();
    Ok(args)
}

fn add(vm: &Vm, a: &Value, b: &Value) -> Result<Value, VmError> {
    Ok(match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => match x.checked_add(*y) {
            Some(sum) => Value::Integer(sum),
            None => Value::Float(f64::from(*x) + f64::from(*y)),
        },
        (Value::String(_), _) | (_, Value::String(_)) => {
            let joined = format!("{}{}", vm.to_display_string(a)?, vm.to_display_string(b)?);
            Value::from(joined)
        }
        _ => Value::Float(a.to_float() + b.to_float()),
    })
}

fn sub(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => match x.checked_sub(*y) {
            Some(diff) => Value::Integer(diff),
            None => Value::Float(f64::from(*x) - f64::from(*y)),
        },
        _ => Value::Float(a.to_float() - b.to_float()),
    }
}

impl Dispatch for ToyDispatch {
    fn step(&self, vm: &mut Vm) -> Result<(), VmError> {
        let context = vm.current_context_mut()?;
        if context.is_at_end() {
            return vm.return_from_context(Value::Undefined);
        }
        let opcode = context.read_u8()?;
        match opcode {
            op::END => vm.return_from_context(Value::Undefined)?,
            op::PUSH_CONST => {
                let context = vm.current_context_mut()?;
                let index = context.read_u16()?;
                let value = context.constant(usize::from(index))?;
                context.push(value);
            }
            op::PUSH_REG => {
                let context = vm.current_context_mut()?;
                let register = context.read_u8()?;
                let value = context.register(usize::from(register))?;
                context.push(value);
            }
            op::STORE_REG => {
                let context = vm.current_context_mut()?;
                let register = context.read_u8()?;
                let value = context.pop();
                context.set_register(usize::from(register), value)?;
            }
            op::GET_VAR => {
                let name = pop_name(vm)?;
                let value = vm.get_variable(&name)?;
                push(vm, value)?;
            }
            op::SET_VAR => {
                let value = pop(vm)?;
                let name = pop_name(vm)?;
                vm.set_variable(&name, value)?;
            }
            op::DEFINE_LOCAL => {
                let value = pop(vm)?;
                let name = pop_name(vm)?;
                vm.define_local(&name, value)?;
            }
            op::GET_MEMBER => {
                let name = pop_name(vm)?;
                let target = pop(vm)?;
                let value = vm.get_value_member(&target, &name)?;
                push(vm, value)?;
            }
            op::SET_MEMBER => {
                let value = pop(vm)?;
                let name = pop_name(vm)?;
                let target = pop(vm)?;
                let target = vm.to_object(&target)?;
                vm.set_member(target, &name, value)?;
            }
            op::ADD => {
                let b = pop(vm)?;
                let a = pop(vm)?;
                let sum = add(vm, &a, &b)?;
                push(vm, sum)?;
            }
            op::SUB => {
                let b = pop(vm)?;
                let a = pop(vm)?;
                push(vm, sub(&a, &b))?;
            }
            op::LESS => {
                let b = pop(vm)?;
                let a = pop(vm)?;
                push(vm, Value::Boolean(a.to_float() < b.to_float()))?;
            }
            op::CALL => {
                let function = pop(vm)?;
                let args = pop_args(vm)?;
                vm.call_from_context(&function, &Value::Undefined, &args)?;
            }
            op::CALL_METHOD => {
                let name = pop_name(vm)?;
                let target = pop(vm)?;
                let args = pop_args(vm)?;
                vm.call_method_from_context(&target, &name, &args)?;
            }
            op::RETURN => {
                let value = pop(vm)?;
                vm.return_from_context(value)?;
            }
            op::DEFINE_FUNCTION => {
                let index = vm.current_context_mut()?.read_u8()?;
                let definition = self
                    .functions
                    .get(usize::from(index))
                    .cloned()
                    .ok_or_else(|| VmError::invalid_definition(format!("no function #{}", index)))?;
                let function = vm.define_function(definition)?;
                push(vm, Value::Object(function))?;
            }
            op::POP => {
                pop(vm)?;
            }
            op::JUMP_IF_FALSE => {
                let context = vm.current_context_mut()?;
                let offset = context.read_i16()?;
                if !context.pop().to_boolean() {
                    context.jump_by(i32::from(offset))?;
                }
            }
            op::JUMP => {
                let context = vm.current_context_mut()?;
                let offset = context.read_i16()?;
                context.jump_by(i32::from(offset))?;
            }
            op::THROW => {
                let message = pop_name(vm)?;
                return Err(VmError::type_error(message));
            }
            op::NEW => {
                let constructor = pop(vm)?;
                let args = pop_args(vm)?;
                let instance = vm.construct(&constructor, &args)?;
                push(vm, instance)?;
            }
            op::DUP => {
                let context = vm.current_context_mut()?;
                let top = context.peek().cloned().unwrap_or_default();
                context.push(top);
            }
            other => {
                return Err(VmError::unsupported(format!("test opcode {:#04x}", other)));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Assembler
// ═══════════════════════════════════════════════════════════════════════════

/// Builds instruction bytes and a constant pool for the test machine.
#[derive(Default)]
pub struct Asm {
    code: Vec<u8>,
    constants: Vec<Value>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a constant (added to the pool)
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        let index = u16::try_from(self.constants.len()).unwrap_or(u16::MAX);
        self.constants.push(value.into());
        self.code.push(op::PUSH_CONST);
        self.code.extend_from_slice(&index.to_le_bytes());
        self
    }

    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.code.push(opcode);
        self
    }

    pub fn op_u8(&mut self, opcode: u8, operand: u8) -> &mut Self {
        self.code.push(opcode);
        self.code.push(operand);
        self
    }

    /// `name` -> value
    pub fn get_var(&mut self, name: &str) -> &mut Self {
        self.push(name).op(op::GET_VAR)
    }

    /// value on the stack is assigned to `name`
    pub fn set_var(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.push(name).push(value).op(op::SET_VAR)
    }

    /// Emit a forward jump and return the position to patch
    pub fn jump_placeholder(&mut self, opcode: u8) -> usize {
        self.code.push(opcode);
        let at = self.code.len();
        self.code.extend_from_slice(&[0, 0]);
        at
    }

    /// Point a placeholder jump at the current end of code
    #[allow(clippy::indexing_slicing)]
    pub fn patch(&mut self, at: usize) {
        let offset = i16::try_from(self.code.len() - (at + 2)).unwrap_or(i16::MAX);
        let bytes = offset.to_le_bytes();
        self.code[at] = bytes[0];
        self.code[at + 1] = bytes[1];
    }

    pub fn code(&self) -> Rc<[u8]> {
        Rc::from(self.code.clone())
    }

    pub fn constants(&self) -> Rc<[Value]> {
        Rc::from(self.constants.clone())
    }

    /// Run as a top-level script on `target`
    pub fn run(&self, vm: &mut Vm, target: ObjectId) -> Result<Value, VmError> {
        vm.execute_script(self.code(), self.constants(), target)
    }

    /// A function definition with this body
    pub fn function(&self, name: &str, parameters: Vec<ParameterSlot>) -> FunctionDefinition {
        FunctionDefinition {
            name: Some(name.into()),
            instructions: self.code.clone(),
            constants: self.constants.clone(),
            parameters,
            ..FunctionDefinition::default()
        }
    }

    /// A new-calling-convention definition with this body
    pub fn function_v2(
        &self,
        name: &str,
        parameters: Vec<ParameterSlot>,
        register_count: u8,
        flags: PreloadFlags,
    ) -> FunctionDefinition {
        FunctionDefinition {
            register_count,
            preload_flags: flags,
            new_calling_convention: true,
            ..self.function(name, parameters)
        }
    }
}

/// Parameter bound by name
pub fn by_name(name: &str) -> ParameterSlot {
    ParameterSlot::ByName(name.into())
}

/// Parameter bound into a register
pub fn in_register(register: u8, name: &str) -> ParameterSlot {
    ParameterSlot::ByRegisterAndName(register, name.into())
}
