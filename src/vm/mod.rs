//! The virtual machine: object heap, global object, built-in prototypes,
//! the stack of live frames and the interval table.
//!
//! Opcode semantics live outside this crate. An external dispatch loop,
//! registered through [`Dispatch`], executes instructions of the top frame;
//! the VM owns everything that loop operates on.

pub mod builtins;
mod call;
pub mod config;
pub mod context;
mod interval;
mod json;
mod path;
mod property;
mod variables;

use std::rc::Rc;

pub use config::VmConfig;
pub use context::{ActionContext, FrameState, Scope, ScopeRef};
pub use interval::Interval;

use crate::error::VmError;
use crate::function::{Function, NativeFn, NativeFunction};
use crate::gc::{GcStats, Heap, ObjectId};
use crate::object::{ObjectClass, Property, ScriptObject, StageBinding, StageKind};
use crate::platform::{DisplayHandle, DocumentLoader, HostClock, StdClock};
use crate::prelude::{FxHashMap, IndexMap, index_map_new};
use crate::string_dict::StringDict;
use crate::value::{AsString, CheapClone, Value};

/// Executes instructions of the VM's top frame.
///
/// `step` runs one instruction (or a batch) of `vm.current_context()`. A
/// return opcode must end with [`Vm::return_from_context`]; calls go through
/// [`Vm::call_from_context`] / [`Vm::call_method_from_context`].
pub trait Dispatch {
    fn step(&self, vm: &mut Vm) -> Result<(), VmError>;
}

/// Registers in a top-level script frame
const TOP_LEVEL_REGISTERS: usize = 4;

const MAX_DISPLAY_DEPTH: usize = 8;

pub struct Vm {
    heap: Heap<ScriptObject>,
    global: ObjectId,
    extern_object: ObjectId,
    root: Option<ObjectId>,
    prototypes: FxHashMap<AsString, ObjectId>,
    constructors: FxHashMap<AsString, ObjectId>,
    contexts: Vec<ActionContext>,
    /// Context-stack depth at each active host entry, innermost last
    host_barriers: Vec<usize>,
    /// Value returned by the frame a host entry is waiting on
    host_result: Option<Value>,
    intervals: IndexMap<AsString, Interval>,
    next_interval: u32,
    clock: Rc<dyn HostClock>,
    started_at: u64,
    dispatcher: Option<Rc<dyn Dispatch>>,
    loader: Option<Rc<dyn DocumentLoader>>,
    config: VmConfig,
    strings: StringDict,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self::with_clock(config, Rc::new(StdClock::new()))
    }

    /// Create a VM driven by a host clock and build the built-in classes
    /// and the global object. A bootstrap failure is logged and leaves the
    /// classes installed so far; use [`Vm::try_with_clock`] to observe it.
    pub fn with_clock(config: VmConfig, clock: Rc<dyn HostClock>) -> Self {
        let mut vm = Self::unbootstrapped(config, clock);
        if let Err(e) = builtins::bootstrap(&mut vm) {
            log::error!("vm bootstrap failed: {}", e);
        }
        vm.log_initialized();
        vm
    }

    /// Like [`Vm::with_clock`], failing if any built-in member could not be installed.
    pub fn try_with_clock(config: VmConfig, clock: Rc<dyn HostClock>) -> Result<Self, VmError> {
        let mut vm = Self::unbootstrapped(config, clock);
        builtins::bootstrap(&mut vm)?;
        vm.log_initialized();
        Ok(vm)
    }

    fn unbootstrapped(config: VmConfig, clock: Rc<dyn HostClock>) -> Self {
        let mut heap = Heap::new();
        heap.set_gc_threshold(config.gc_threshold);
        let global = heap.alloc(ScriptObject::default());
        let extern_object = heap.alloc(ScriptObject::default());
        let started_at = clock.now_millis();

        Self {
            heap,
            global,
            extern_object,
            root: None,
            prototypes: FxHashMap::default(),
            constructors: FxHashMap::default(),
            contexts: Vec::new(),
            host_barriers: Vec::new(),
            host_result: None,
            intervals: index_map_new(),
            next_interval: 0,
            clock,
            started_at,
            dispatcher: None,
            loader: None,
            config,
            strings: StringDict::with_common_strings(),
        }
    }

    fn log_initialized(&self) {
        log::debug!(
            "vm initialized with {} builtin classes, {} objects",
            self.prototypes.len(),
            self.heap.stats().live_objects
        );
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Intern a member name
    pub fn intern(&mut self, s: &str) -> AsString {
        self.strings.get_or_insert(s)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Host collaborators
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_dispatcher(&mut self, dispatcher: Rc<dyn Dispatch>) {
        self.dispatcher = Some(dispatcher);
    }

    pub fn set_document_loader(&mut self, loader: Rc<dyn DocumentLoader>) {
        self.loader = Some(loader);
    }

    pub fn document_loader(&self) -> Option<Rc<dyn DocumentLoader>> {
        self.loader.clone()
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Milliseconds since the VM was created
    pub fn elapsed_millis(&self) -> u64 {
        self.clock.now_millis().saturating_sub(self.started_at)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Well-known objects
    // ═══════════════════════════════════════════════════════════════════════

    pub fn global_object(&self) -> ObjectId {
        self.global
    }

    pub fn extern_object(&self) -> ObjectId {
        self.extern_object
    }

    /// The root movie's script object (`_root`)
    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<ObjectId>) {
        self.root = root;
    }

    /// Prototype object of a built-in class
    pub fn prototype(&self, class: &str) -> Option<ObjectId> {
        self.prototypes.get(class).copied()
    }

    /// Constructor function of a built-in class
    pub fn class_constructor(&self, class: &str) -> Option<ObjectId> {
        self.constructors.get(class).copied()
    }

    pub(crate) fn register_class(&mut self, name: &str, prototype: ObjectId, constructor: ObjectId) {
        let name = self.intern(name);
        self.prototypes.insert(name.cheap_clone(), prototype);
        self.constructors.insert(name, constructor);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Object heap
    // ═══════════════════════════════════════════════════════════════════════

    pub fn object(&self, id: ObjectId) -> Result<&ScriptObject, VmError> {
        self.heap.get(id).ok_or(VmError::DanglingReference { id })
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut ScriptObject, VmError> {
        self.heap.get_mut(id).ok_or(VmError::DanglingReference { id })
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.heap.contains(id)
    }

    pub fn alloc_object(&mut self, object: ScriptObject) -> ObjectId {
        self.heap.alloc(object)
    }

    /// Plain object inheriting from `Object.prototype`
    pub fn create_object(&mut self) -> ObjectId {
        let proto = self.prototype("Object");
        self.create_object_with_prototype(proto)
    }

    pub fn create_object_with_prototype(&mut self, prototype: Option<ObjectId>) -> ObjectId {
        self.heap
            .alloc(ScriptObject::new(prototype, ObjectClass::Ordinary))
    }

    pub fn create_array(&mut self, elements: Vec<Value>) -> ObjectId {
        let proto = self.prototype("Array");
        let id = self.heap.alloc(ScriptObject::new(proto, ObjectClass::Array(elements)));
        if let (Some(ctor), Some(obj)) = (self.class_constructor("Array"), self.heap.get_mut(id)) {
            obj.constructor = Some(ctor);
        }
        id
    }

    /// Wrap a function payload in an object inheriting from `Function.prototype`
    pub fn create_function_object(&mut self, function: Function) -> ObjectId {
        let proto = self.prototype("Function");
        self.heap
            .alloc(ScriptObject::new(proto, ObjectClass::Function(function)))
    }

    pub fn create_native_function(&mut self, name: &str, func: NativeFn) -> ObjectId {
        let name = self.intern(name);
        self.create_function_object(Function::Native(NativeFunction::from_fn(name, func)))
    }

    /// Install a builtin method on `target`
    pub fn register_method(&mut self, target: ObjectId, name: &str, func: NativeFn) -> Result<(), VmError> {
        let function = self.create_native_function(name, func);
        let key = self.intern(name);
        self.object_mut(target)?
            .properties
            .insert(key, Property::method(function));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Garbage collection
    // ═══════════════════════════════════════════════════════════════════════

    /// Keep an object alive while the host holds its id
    pub fn pin(&mut self, id: ObjectId) {
        self.heap.pin(id);
    }

    pub fn unpin(&mut self, id: ObjectId) -> bool {
        self.heap.unpin(id)
    }

    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.config.gc_threshold = threshold;
        self.heap.set_gc_threshold(threshold);
    }

    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    /// Run a full collection. Only allowed while no frame is live.
    pub fn collect_garbage(&mut self) -> Result<usize, VmError> {
        if !self.contexts.is_empty() {
            return Err(VmError::unsupported(
                "garbage collection while frames are live",
            ));
        }
        let roots = self.gc_roots();
        let collected = self.heap.collect(roots);
        log::debug!(
            "gc: collected {} objects, {} live",
            collected,
            self.heap.stats().live_objects
        );
        Ok(collected)
    }

    /// Collect if enough allocations happened and nothing is running
    pub(crate) fn maybe_collect(&mut self) -> Result<(), VmError> {
        if self.contexts.is_empty() && self.heap.should_collect() {
            self.collect_garbage()?;
        }
        Ok(())
    }

    fn gc_roots(&self) -> Vec<ObjectId> {
        let mut roots = vec![self.global, self.extern_object];
        roots.extend(self.root);
        roots.extend(self.prototypes.values().copied());
        roots.extend(self.constructors.values().copied());
        for context in &self.contexts {
            context.trace(&mut |id| roots.push(id));
        }
        for interval in self.intervals.values() {
            interval.trace(&mut |id| roots.push(id));
        }
        if let Some(Value::Object(id)) = &self.host_result {
            roots.push(*id);
        }
        roots
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Context stack
    // ═══════════════════════════════════════════════════════════════════════

    /// Push a frame; it becomes the frame the dispatch loop runs next.
    pub fn push_context(&mut self, mut context: ActionContext) -> Result<(), VmError> {
        if self.contexts.len() >= self.config.max_call_depth {
            return Err(VmError::StackExhaustion {
                depth: self.config.max_call_depth,
            });
        }
        context.set_state(FrameState::Running);
        log::trace!(
            "push frame '{}' at depth {}",
            context.name(),
            self.contexts.len()
        );
        self.contexts.push(context);
        Ok(())
    }

    /// Pop the top frame and route its return value: to the host entry
    /// waiting on this depth, else onto the caller frame's operand stack.
    pub fn return_from_context(&mut self, value: Value) -> Result<(), VmError> {
        let mut frame = self
            .contexts
            .pop()
            .ok_or_else(|| VmError::internal("return with no active frame"))?;
        frame.set_state(FrameState::Returned);
        log::trace!(
            "pop frame '{}' at depth {}",
            frame.name(),
            self.contexts.len()
        );

        if self.host_barriers.last() == Some(&self.contexts.len()) {
            self.host_result = Some(value);
        } else if let Some(caller) = self.contexts.last_mut() {
            caller.push(value);
        }
        Ok(())
    }

    pub fn context_depth(&self) -> usize {
        self.contexts.len()
    }

    pub fn current_context(&self) -> Result<&ActionContext, VmError> {
        self.contexts
            .last()
            .ok_or_else(|| VmError::internal("no active frame"))
    }

    pub fn current_context_mut(&mut self) -> Result<&mut ActionContext, VmError> {
        self.contexts
            .last_mut()
            .ok_or_else(|| VmError::internal("no active frame"))
    }

    /// Drive the dispatcher until the stack shrinks back to `depth`.
    pub fn run_frames_above(&mut self, depth: usize) -> Result<(), VmError> {
        if self.contexts.len() <= depth {
            return Ok(());
        }
        let dispatcher = self
            .dispatcher
            .clone()
            .ok_or_else(|| VmError::unsupported("no instruction dispatcher installed"))?;
        while self.contexts.len() > depth {
            dispatcher.step(self)?;
        }
        Ok(())
    }

    /// Run a top-level action block with `target` as `this` and as the only
    /// scope-chain object.
    pub fn execute_script(
        &mut self,
        instructions: Rc<[u8]>,
        constants: Rc<[Value]>,
        target: ObjectId,
    ) -> Result<Value, VmError> {
        self.object(target)?;
        let mut context = ActionContext::new(
            instructions,
            constants,
            TOP_LEVEL_REGISTERS,
            Scope::new_ref(None),
            Value::Object(target),
        );
        context.push_scope(target);

        let base = self.enter_host()?;
        let result = self
            .push_context(context)
            .and_then(|_| self.finish_host_entry(base));
        self.host_barriers.pop();
        if result.is_err() {
            self.contexts.truncate(base);
            self.host_result = None;
        }
        result
    }

    /// Tear down the running document: intervals, frames, host handles.
    pub fn unload(&mut self) -> Result<(), VmError> {
        log::debug!(
            "unloading vm: {} intervals, {} frames",
            self.intervals.len(),
            self.contexts.len()
        );
        self.intervals.clear();
        self.contexts.clear();
        self.host_barriers.clear();
        self.host_result = None;
        self.root = None;
        self.heap.clear_pins();
        self.collect_garbage()?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Coercions needing the heap
    // ═══════════════════════════════════════════════════════════════════════

    /// ToObject: objects pass through, primitives are boxed into fresh wrapper
    /// objects, undefined and null fail.
    pub fn to_object(&mut self, value: &Value) -> Result<ObjectId, VmError> {
        let (class, class_name) = match value {
            Value::Object(id) => return Ok(*id),
            Value::Undefined | Value::Null => {
                return Err(VmError::type_error(format!(
                    "cannot convert {} to an object",
                    value.type_name()
                )));
            }
            Value::Boolean(b) => (ObjectClass::Boolean(*b), "Boolean"),
            Value::Integer(_) | Value::Float(_) => (ObjectClass::Number(value.clone()), "Number"),
            Value::String(s) => (ObjectClass::String(s.cheap_clone()), "String"),
        };
        let proto = self.prototype(class_name);
        let mut object = ScriptObject::new(proto, class);
        object.constructor = self.class_constructor(class_name);
        Ok(self.heap.alloc(object))
    }

    /// ToFunction: the callable object behind `value`
    pub fn to_function(&self, value: &Value) -> Result<(ObjectId, Function), VmError> {
        let Value::Object(id) = value else {
            return Err(VmError::type_error(format!(
                "{:?} is not a function",
                value
            )));
        };
        match self.object(*id)?.as_function() {
            Some(function) => Ok((*id, function.clone())),
            None => Err(VmError::type_error(format!("{:?} is not a function", value))),
        }
    }

    pub fn is_callable(&self, value: &Value) -> bool {
        match value {
            Value::Object(id) => self.heap.get(*id).is_some_and(|o| o.is_callable()),
            _ => false,
        }
    }

    /// `typeof` result
    pub fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Object(id) => match self.heap.get(*id) {
                Some(obj) if obj.is_callable() => "function",
                Some(obj) if obj.as_stage().is_some_and(|s| s.kind == StageKind::MovieClip) => {
                    "movieclip"
                }
                _ => "object",
            },
            other => other.type_name(),
        }
    }

    /// ToString with class-aware formatting of objects
    pub fn to_display_string(&self, value: &Value) -> Result<AsString, VmError> {
        self.display_string_at(value, 0)
    }

    fn display_string_at(&self, value: &Value, depth: usize) -> Result<AsString, VmError> {
        let Value::Object(id) = value else {
            return Ok(value.to_as_string());
        };
        let object = self.object(*id)?;
        Ok(match &object.class {
            ObjectClass::Ordinary => AsString::from("[object Object]"),
            ObjectClass::Function(_) => AsString::from("[type Function]"),
            ObjectClass::String(s) => s.cheap_clone(),
            ObjectClass::Boolean(b) => Value::Boolean(*b).to_as_string(),
            ObjectClass::Number(n) => n.to_as_string(),
            // Nested arrays may be cyclic
            ObjectClass::Array(_) if depth >= MAX_DISPLAY_DEPTH => AsString::from(""),
            ObjectClass::Array(elements) => {
                let mut parts = Vec::with_capacity(elements.len());
                for element in elements {
                    parts.push(match element {
                        Value::Undefined | Value::Null => String::new(),
                        other => self.display_string_at(other, depth + 1)?.to_string(),
                    });
                }
                AsString::from(parts.join(","))
            }
            ObjectClass::Stage(binding) => AsString::from(builtins::stage::target_path(&binding.item)),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Display bridging
    // ═══════════════════════════════════════════════════════════════════════

    /// Create the script wrapper for a display item. The wrapper stays pinned
    /// until [`Vm::release_stage_object`].
    pub fn create_stage_object(&mut self, item: DisplayHandle, kind: StageKind) -> ObjectId {
        let class_name = kind.class_name();
        let proto = self.prototype(class_name);
        let mut object = ScriptObject::new(proto, ObjectClass::Stage(StageBinding { item, kind }));
        object.constructor = self.class_constructor(class_name);
        let id = self.heap.alloc(object);
        self.heap.pin(id);
        id
    }

    pub fn release_stage_object(&mut self, id: ObjectId) -> bool {
        self.heap.unpin(id)
    }

    /// The display item bridged by a stage wrapper
    pub fn display_item(&self, id: ObjectId) -> Result<DisplayHandle, VmError> {
        match self.object(id)?.as_stage() {
            Some(binding) => Ok(binding.item.clone()),
            None => Err(VmError::unsupported(format!(
                "{:?} is not a display object",
                id
            ))),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
