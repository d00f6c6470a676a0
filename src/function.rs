//! Callable objects: native functions and bytecode-defined functions.

use std::fmt;
use std::rc::Rc;

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::prelude::FxHashSet;
use crate::value::{AsString, CheapClone, Value};
use crate::vm::Vm;
use crate::vm::context::{ActionContext, FrameState, Scope, ScopeRef};

/// Outcome of invoking a function.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The call finished; this is its result.
    Complete(Value),
    /// A frame was pushed. Its return opcode delivers the result.
    Pending,
}

impl From<Value> for Invocation {
    fn from(value: Value) -> Self {
        Invocation::Complete(value)
    }
}

/// Signature of builtin methods
pub type NativeFn = fn(&mut Vm, &Value, &[Value]) -> Result<Invocation, VmError>;

type NativeClosure = dyn Fn(&mut Vm, &Value, &[Value]) -> Result<Invocation, VmError>;

/// A function implemented by the host.
///
/// Runs synchronously in the caller's frame. Closures registered by a host
/// must not capture `ObjectId`s unless those objects are pinned.
#[derive(Clone)]
pub struct NativeFunction {
    name: AsString,
    func: Rc<NativeClosure>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<AsString>, func: F) -> Self
    where
        F: Fn(&mut Vm, &Value, &[Value]) -> Result<Invocation, VmError> + 'static,
    {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn from_fn(name: impl Into<AsString>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &AsString {
        &self.name
    }

    pub fn call(&self, vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
        (self.func)(vm, this, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Where one declared parameter is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSlot {
    /// Bound as a local variable
    ByName(AsString),
    /// Bound into a register; register 0 means "by name"
    ByRegisterAndName(u8, AsString),
}

impl ParameterSlot {
    pub fn name(&self) -> &AsString {
        match self {
            ParameterSlot::ByName(name) | ParameterSlot::ByRegisterAndName(_, name) => name,
        }
    }

    /// The register this slot claims, if any
    pub fn register(&self) -> Option<u8> {
        match self {
            ParameterSlot::ByRegisterAndName(reg, _) if *reg != 0 => Some(*reg),
            _ => None,
        }
    }
}

/// Bitset selecting which well-known values are copied into registers
/// before a new-convention function body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PreloadFlags(u32);

impl PreloadFlags {
    pub const NONE: PreloadFlags = PreloadFlags(0);
    pub const PRELOAD_GLOBAL: PreloadFlags = PreloadFlags(0x0001);
    pub const PRELOAD_THIS: PreloadFlags = PreloadFlags(0x0100);
    pub const SUPPRESS_THIS: PreloadFlags = PreloadFlags(0x0200);
    pub const PRELOAD_ARGUMENTS: PreloadFlags = PreloadFlags(0x0400);
    pub const SUPPRESS_ARGUMENTS: PreloadFlags = PreloadFlags(0x0800);
    pub const PRELOAD_SUPER: PreloadFlags = PreloadFlags(0x1000);
    pub const SUPPRESS_SUPER: PreloadFlags = PreloadFlags(0x2000);
    pub const PRELOAD_ROOT: PreloadFlags = PreloadFlags(0x4000);
    pub const PRELOAD_PARENT: PreloadFlags = PreloadFlags(0x8000);
    pub const PRELOAD_EXTERN: PreloadFlags = PreloadFlags(0x01_0000);

    const ALL: u32 = 0x01_FF01;

    /// Accepts only known bits
    pub fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(PreloadFlags(bits))
        } else {
            None
        }
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: PreloadFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if `kind` is requested and not suppressed
    pub fn preloads(&self, kind: PreloadKind) -> bool {
        let (preload, suppress) = kind.flags();
        self.contains(preload) && !suppress.is_some_and(|s| self.contains(s))
    }
}

impl std::ops::BitOr for PreloadFlags {
    type Output = PreloadFlags;

    fn bitor(self, rhs: PreloadFlags) -> PreloadFlags {
        PreloadFlags(self.0 | rhs.0)
    }
}

/// Well-known values a frame can preload, in register assignment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadKind {
    This,
    Arguments,
    Super,
    Root,
    Parent,
    Global,
    Extern,
}

impl PreloadKind {
    pub const ORDER: [PreloadKind; 7] = [
        PreloadKind::This,
        PreloadKind::Arguments,
        PreloadKind::Super,
        PreloadKind::Root,
        PreloadKind::Parent,
        PreloadKind::Global,
        PreloadKind::Extern,
    ];

    fn flags(self) -> (PreloadFlags, Option<PreloadFlags>) {
        match self {
            PreloadKind::This => (PreloadFlags::PRELOAD_THIS, Some(PreloadFlags::SUPPRESS_THIS)),
            PreloadKind::Arguments => (
                PreloadFlags::PRELOAD_ARGUMENTS,
                Some(PreloadFlags::SUPPRESS_ARGUMENTS),
            ),
            PreloadKind::Super => (
                PreloadFlags::PRELOAD_SUPER,
                Some(PreloadFlags::SUPPRESS_SUPER),
            ),
            PreloadKind::Root => (PreloadFlags::PRELOAD_ROOT, None),
            PreloadKind::Parent => (PreloadFlags::PRELOAD_PARENT, None),
            PreloadKind::Global => (PreloadFlags::PRELOAD_GLOBAL, None),
            PreloadKind::Extern => (PreloadFlags::PRELOAD_EXTERN, None),
        }
    }
}

/// What the bytecode decoder hands over for one function body.
#[derive(Debug, Clone, Default)]
pub struct FunctionDefinition {
    pub name: Option<AsString>,
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
    pub parameters: Vec<ParameterSlot>,
    pub register_count: u8,
    pub preload_flags: PreloadFlags,
    pub new_calling_convention: bool,
}

impl FunctionDefinition {
    /// Reject tuples no consistent decoder would produce.
    pub fn validate(&self) -> Result<(), VmError> {
        if !self.new_calling_convention {
            if self.parameters.iter().any(|p| p.register().is_some()) {
                return Err(VmError::invalid_definition(
                    "register parameters require the new calling convention",
                ));
            }
            if !self.preload_flags.is_empty() {
                return Err(VmError::invalid_definition(
                    "preload flags require the new calling convention",
                ));
            }
            return Ok(());
        }

        let mut claimed = FxHashSet::default();
        for param in &self.parameters {
            let Some(reg) = param.register() else {
                continue;
            };
            if reg >= self.register_count {
                return Err(VmError::invalid_definition(format!(
                    "parameter '{}' uses register {} of {}",
                    param.name(),
                    reg,
                    self.register_count
                )));
            }
            if !claimed.insert(reg) {
                return Err(VmError::invalid_definition(format!(
                    "register {} claimed by more than one parameter",
                    reg
                )));
            }
        }
        Ok(())
    }
}

/// A function whose body is bytecode run by the dispatch loop.
pub struct DefinedFunction {
    name: Option<AsString>,
    instructions: Rc<[u8]>,
    constants: Rc<[Value]>,
    parameters: Vec<ParameterSlot>,
    register_count: u8,
    preload_flags: PreloadFlags,
    new_calling_convention: bool,
    /// Locals of the frame that defined this function
    defining_scope: Option<ScopeRef>,
    /// Scope chain of the defining frame, outermost first
    defining_chain: Rc<[ObjectId]>,
}

impl DefinedFunction {
    /// Build a function from a validated definition and the lexical
    /// environment it closes over.
    pub fn new(
        definition: FunctionDefinition,
        defining_scope: Option<ScopeRef>,
        defining_chain: Vec<ObjectId>,
    ) -> Result<Self, VmError> {
        definition.validate()?;
        Ok(Self {
            name: definition.name,
            instructions: definition.instructions.into(),
            constants: definition.constants.into(),
            parameters: definition.parameters,
            register_count: definition.register_count,
            preload_flags: definition.preload_flags,
            new_calling_convention: definition.new_calling_convention,
            defining_scope,
            defining_chain: defining_chain.into(),
        })
    }

    pub fn name(&self) -> Option<&AsString> {
        self.name.as_ref()
    }

    pub fn parameters(&self) -> &[ParameterSlot] {
        &self.parameters
    }

    pub fn preload_flags(&self) -> PreloadFlags {
        self.preload_flags
    }

    pub fn is_new_calling_convention(&self) -> bool {
        self.new_calling_convention
    }

    /// Registers assigned to preloaded values: successive registers from 1,
    /// skipping any claimed by a parameter.
    pub fn preload_registers(&self) -> Vec<(PreloadKind, usize)> {
        if !self.new_calling_convention {
            return Vec::new();
        }
        let claimed: FxHashSet<usize> = self
            .parameters
            .iter()
            .filter_map(|p| p.register().map(usize::from))
            .collect();

        let mut next = 1;
        let mut assigned = Vec::new();
        for kind in PreloadKind::ORDER {
            if !self.preload_flags.preloads(kind) {
                continue;
            }
            while claimed.contains(&next) {
                next += 1;
            }
            assigned.push((kind, next));
            next += 1;
        }
        assigned
    }

    /// Registers a frame of this function needs
    pub fn frame_register_count(&self) -> usize {
        let declared = usize::from(self.register_count);
        let params = self
            .parameters
            .iter()
            .filter_map(|p| p.register().map(|r| usize::from(r) + 1))
            .max()
            .unwrap_or(0);
        let preloads = self
            .preload_registers()
            .last()
            .map_or(0, |(_, reg)| reg + 1);
        declared.max(params).max(preloads)
    }

    /// Build the frame for one invocation: bind parameters, then preload
    /// well-known values. The frame is returned unpushed.
    pub fn get_context(
        &self,
        vm: &mut Vm,
        callee: ObjectId,
        this: Value,
        args: &[Value],
    ) -> Result<ActionContext, VmError> {
        let locals = Scope::new_ref(self.defining_scope.clone());
        let mut context = ActionContext::new(
            self.instructions.cheap_clone(),
            self.constants.cheap_clone(),
            self.frame_register_count(),
            locals,
            this,
        );
        context.set_name(self.name.clone());
        context.set_callee(callee);
        context.set_arguments(args.to_vec());
        context.set_scope_chain(self.defining_chain.to_vec());

        context.set_state(FrameState::Binding);
        self.bind_parameters(&mut context, args)?;

        if self.new_calling_convention {
            context.set_state(FrameState::Preloading);
            for (kind, register) in self.preload_registers() {
                let value = vm.well_known_value(&mut context, kind)?;
                context.set_register(register, value)?;
            }
        }
        Ok(context)
    }

    fn bind_parameters(&self, context: &mut ActionContext, args: &[Value]) -> Result<(), VmError> {
        for (index, slot) in self.parameters.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or_default();
            match slot.register() {
                Some(reg) => context.set_register(usize::from(reg), value)?,
                None => context.set_param(slot.name().cheap_clone(), value),
            }
        }
        Ok(())
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        for value in self.constants.iter() {
            if let Value::Object(id) = value {
                visitor(*id);
            }
        }
        for id in self.defining_chain.iter() {
            visitor(*id);
        }
        if let Some(scope) = &self.defining_scope {
            Scope::trace_chain(scope, visitor);
        }
    }
}

impl fmt::Debug for DefinedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinedFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("register_count", &self.register_count)
            .field("preload_flags", &self.preload_flags)
            .field("new_calling_convention", &self.new_calling_convention)
            .finish()
    }
}

/// A callable object's payload
#[derive(Clone, Debug)]
pub enum Function {
    Native(NativeFunction),
    Defined(Rc<DefinedFunction>),
}

impl Function {
    pub fn name(&self) -> Option<&str> {
        match self {
            Function::Native(f) => Some(f.name().as_str()),
            Function::Defined(f) => f.name().map(|n| n.as_str()),
        }
    }

    /// Run a native immediately, or push a frame for a defined function.
    pub fn invoke(
        &self,
        vm: &mut Vm,
        callee: ObjectId,
        this: &Value,
        args: &[Value],
    ) -> Result<Invocation, VmError> {
        match self {
            Function::Native(native) => native.call(vm, this, args),
            Function::Defined(defined) => {
                let context = defined.get_context(vm, callee, this.clone(), args)?;
                vm.push_context(context)?;
                Ok(Invocation::Pending)
            }
        }
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        if let Function::Defined(defined) = self {
            defined.trace(visitor);
        }
    }
}
