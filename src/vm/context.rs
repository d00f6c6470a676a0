//! Call frames and captured local scopes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::prelude::{IndexMap, index_map_new};
use crate::value::{AsString, Value};

/// Shared handle to a local-variable scope.
///
/// Closures keep the scope of their defining frame alive after that frame
/// returns. Scopes hold only values, never other frames, so `Rc` sharing here
/// cannot form a cycle.
pub type ScopeRef = Rc<RefCell<Scope>>;

/// Local variables of one invocation, linked to the scope it was defined in.
#[derive(Default)]
pub struct Scope {
    vars: IndexMap<AsString, Value>,
    outer: Option<ScopeRef>,
}

impl Scope {
    pub fn new_ref(outer: Option<ScopeRef>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: index_map_new(),
            outer,
        }))
    }

    pub fn outer(&self) -> Option<ScopeRef> {
        self.outer.clone()
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    pub fn contains_own(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bind (or rebind) a variable in this scope
    pub fn define(&mut self, name: AsString, value: Value) {
        self.vars.insert(name, value);
    }

    pub fn names(&self) -> impl Iterator<Item = &AsString> {
        self.vars.keys()
    }

    /// Look a variable up in this scope and then its enclosing scopes
    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let borrowed = s.borrow();
            if let Some(value) = borrowed.get_own(name) {
                return Some(value);
            }
            current = borrowed.outer();
        }
        None
    }

    /// Overwrite an existing variable wherever it lives in the chain.
    /// Returns false if no scope binds `name`.
    pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> bool {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let mut borrowed = s.borrow_mut();
            if let Some(slot) = borrowed.vars.get_mut(name) {
                *slot = value;
                return true;
            }
            current = borrowed.outer();
        }
        false
    }

    /// Report every object held by this scope and its enclosing scopes
    pub fn trace_chain(scope: &ScopeRef, visitor: &mut dyn FnMut(ObjectId)) {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let borrowed = s.borrow();
            for value in borrowed.vars.values() {
                if let Value::Object(id) = value {
                    visitor(*id);
                }
            }
            current = borrowed.outer();
        }
    }
}

/// Lifecycle of one invocation's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Created,
    Binding,
    Preloading,
    /// On the context stack
    Running,
    Returned,
}

/// One live invocation: registers, locals, constant pool, instruction cursor,
/// operand stack and scope chain.
pub struct ActionContext {
    registers: Vec<Value>,
    locals: ScopeRef,
    constants: Rc<[Value]>,
    instructions: Rc<[u8]>,
    pc: usize,
    stack: Vec<Value>,
    /// Outermost first; searched innermost first
    scope_chain: Vec<ObjectId>,
    this: Value,
    callee: Option<ObjectId>,
    arguments: Vec<Value>,
    /// The `arguments` array, created on first use
    arguments_object: Option<ObjectId>,
    state: FrameState,
    name: Option<AsString>,
}

impl ActionContext {
    pub fn new(
        instructions: Rc<[u8]>,
        constants: Rc<[Value]>,
        register_count: usize,
        locals: ScopeRef,
        this: Value,
    ) -> Self {
        Self {
            registers: vec![Value::Undefined; register_count],
            locals,
            constants,
            instructions,
            pc: 0,
            stack: Vec::new(),
            scope_chain: Vec::new(),
            this,
            callee: None,
            arguments: Vec::new(),
            arguments_object: None,
            state: FrameState::Created,
            name: None,
        }
    }

    // ---- instruction cursor ----

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn instructions(&self) -> &[u8] {
        &self.instructions
    }

    /// True once the cursor has run off the end of the instruction stream
    pub fn is_at_end(&self) -> bool {
        self.pc >= self.instructions.len()
    }

    pub fn jump_to(&mut self, pc: usize) -> Result<(), VmError> {
        if pc > self.instructions.len() {
            return Err(VmError::invalid_definition(format!(
                "jump target {} outside {} instruction bytes",
                pc,
                self.instructions.len()
            )));
        }
        self.pc = pc;
        Ok(())
    }

    /// Move the cursor by a signed offset from its current position
    pub fn jump_by(&mut self, offset: i32) -> Result<(), VmError> {
        let target = self.pc as i64 + i64::from(offset);
        if target < 0 {
            return Err(VmError::invalid_definition(format!(
                "jump target {} before start of instructions",
                target
            )));
        }
        self.jump_to(target as usize)
    }

    pub fn read_u8(&mut self) -> Result<u8, VmError> {
        let byte = self.instructions.get(self.pc).copied().ok_or_else(|| {
            VmError::invalid_definition(format!("read past end of instructions at {}", self.pc))
        })?;
        self.pc += 1;
        Ok(byte)
    }

    /// Little-endian, as stored in the movie format
    pub fn read_u16(&mut self) -> Result<u16, VmError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn read_i16(&mut self) -> Result<i16, VmError> {
        Ok(self.read_u16()? as i16)
    }

    // ---- operand stack ----

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop the operand stack. An empty stack yields `undefined`.
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    // ---- registers ----

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn register(&self, index: usize) -> Result<Value, VmError> {
        self.registers
            .get(index)
            .cloned()
            .ok_or(VmError::InvalidRegister {
                index,
                count: self.registers.len(),
            })
    }

    pub fn set_register(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        let count = self.registers.len();
        let slot = self
            .registers
            .get_mut(index)
            .ok_or(VmError::InvalidRegister { index, count })?;
        *slot = value;
        Ok(())
    }

    // ---- constants ----

    pub fn constant(&self, index: usize) -> Result<Value, VmError> {
        self.constants.get(index).cloned().ok_or_else(|| {
            VmError::invalid_definition(format!(
                "constant {} outside pool of {}",
                index,
                self.constants.len()
            ))
        })
    }

    pub fn constants(&self) -> &Rc<[Value]> {
        &self.constants
    }

    // ---- locals ----

    pub fn locals(&self) -> &ScopeRef {
        &self.locals
    }

    /// Read a parameter or local bound in this frame (or a captured scope)
    pub fn param(&self, name: &str) -> Option<Value> {
        Scope::lookup(&self.locals, name)
    }

    /// Bind a parameter or local in this frame's own scope
    pub fn set_param(&mut self, name: AsString, value: Value) {
        self.locals.borrow_mut().define(name, value);
    }

    // ---- scope chain ----

    pub fn push_scope(&mut self, object: ObjectId) {
        self.scope_chain.push(object);
    }

    pub fn pop_scope(&mut self) -> Option<ObjectId> {
        self.scope_chain.pop()
    }

    pub fn scope_chain(&self) -> &[ObjectId] {
        &self.scope_chain
    }

    pub(crate) fn set_scope_chain(&mut self, chain: Vec<ObjectId>) {
        self.scope_chain = chain;
    }

    // ---- invocation data ----

    pub fn this(&self) -> &Value {
        &self.this
    }

    pub fn callee(&self) -> Option<ObjectId> {
        self.callee
    }

    pub(crate) fn set_callee(&mut self, callee: ObjectId) {
        self.callee = Some(callee);
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub(crate) fn set_arguments(&mut self, args: Vec<Value>) {
        self.arguments = args;
    }

    pub(crate) fn arguments_object(&self) -> Option<ObjectId> {
        self.arguments_object
    }

    pub(crate) fn set_arguments_object(&mut self, id: ObjectId) {
        self.arguments_object = Some(id);
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: FrameState) {
        self.state = state;
    }

    /// Name of the function this frame runs, for diagnostics
    pub fn name(&self) -> &str {
        self.name.as_ref().map_or("<anonymous>", |n| n.as_str())
    }

    pub(crate) fn set_name(&mut self, name: Option<AsString>) {
        self.name = name;
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        let values = self
            .registers
            .iter()
            .chain(self.stack.iter())
            .chain(self.arguments.iter())
            .chain(self.constants.iter())
            .chain(std::iter::once(&self.this));
        for value in values {
            if let Value::Object(id) = value {
                visitor(*id);
            }
        }
        for id in &self.scope_chain {
            visitor(*id);
        }
        if let Some(id) = self.callee {
            visitor(id);
        }
        if let Some(id) = self.arguments_object {
            visitor(id);
        }
        Scope::trace_chain(&self.locals, visitor);
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("name", &self.name())
            .field("pc", &self.pc)
            .field("registers", &self.registers.len())
            .field("stack", &self.stack.len())
            .field("state", &self.state)
            .finish()
    }
}

