//! Invocation protocol: host calls, calls from the dispatch loop, `new`.

use std::rc::Rc;

use crate::error::VmError;
use crate::function::{DefinedFunction, Function, FunctionDefinition, Invocation};
use crate::gc::ObjectId;
use crate::object::{ObjectClass, Property, ScriptObject};
use crate::value::Value;

use super::Vm;

impl Vm {
    /// Invoke `function` without waiting for a defined function's frame.
    ///
    /// Natives complete immediately; defined functions push a frame and
    /// report [`Invocation::Pending`].
    pub fn invoke(&mut self, function: &Value, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
        let (callee, function) = self.to_function(function)?;
        function.invoke(self, callee, this, args)
    }

    /// Call `function` to completion and return its result.
    ///
    /// This is a host entry point: if a defined function's frame is pushed,
    /// the dispatcher runs until that frame returns. On error every frame
    /// pushed by this call is discarded.
    pub fn call(&mut self, function: &Value, this: &Value, args: &[Value]) -> Result<Value, VmError> {
        let base = self.enter_host()?;
        let result = self
            .invoke(function, this, args)
            .and_then(|invocation| match invocation {
                Invocation::Complete(value) => Ok(value),
                Invocation::Pending => self.finish_host_entry(base),
            });
        self.host_barriers.pop();
        if result.is_err() {
            self.contexts.truncate(base);
            self.host_result = None;
        }
        result
    }

    /// Open a host entry at the current depth. Each one nests on the native
    /// stack, so they are capped separately from frames.
    pub(crate) fn enter_host(&mut self) -> Result<usize, VmError> {
        if self.host_barriers.len() >= self.config.max_host_depth {
            log::warn!("host entry refused at nesting {}", self.host_barriers.len());
            return Err(VmError::StackExhaustion {
                depth: self.config.max_host_depth,
            });
        }
        let base = self.contexts.len();
        self.host_barriers.push(base);
        Ok(base)
    }

    /// Run pushed frames down to `base` and collect the value the bottom one returned.
    pub(crate) fn finish_host_entry(&mut self, base: usize) -> Result<Value, VmError> {
        self.run_frames_above(base)?;
        self.host_result
            .take()
            .ok_or_else(|| VmError::internal("frame finished without a return value"))
    }

    /// Look a method up on `target` (primitives boxed for the lookup) and
    /// call it with `target` as `this`.
    pub fn call_method(&mut self, target: &Value, name: &str, args: &[Value]) -> Result<Value, VmError> {
        let method = self.get_value_member(target, name)?;
        if !self.is_callable(&method) {
            return Err(VmError::type_error(format!("{} is not a function", name)));
        }
        self.call(&method, target, args)
    }

    /// Call from the dispatch loop: a completed result lands on the current
    /// frame's operand stack; a pushed frame will deliver its own.
    pub fn call_from_context(&mut self, function: &Value, this: &Value, args: &[Value]) -> Result<(), VmError> {
        match self.invoke(function, this, args)? {
            Invocation::Complete(value) => {
                self.current_context_mut()?.push(value);
                Ok(())
            }
            Invocation::Pending => Ok(()),
        }
    }

    pub fn call_method_from_context(&mut self, target: &Value, name: &str, args: &[Value]) -> Result<(), VmError> {
        let method = self.get_value_member(target, name)?;
        if !self.is_callable(&method) {
            return Err(VmError::type_error(format!("{} is not a function", name)));
        }
        self.call_from_context(&method, target, args)
    }

    /// `new constructor(args)`: allocate an object inheriting from the
    /// constructor's `prototype`, run the constructor on it and keep an
    /// object result if the constructor returned one.
    pub fn construct(&mut self, constructor: &Value, args: &[Value]) -> Result<Value, VmError> {
        let (ctor, _) = self.to_function(constructor)?;
        let prototype = match self.get_member(ctor, "prototype")? {
            Value::Object(proto) => Some(proto),
            _ => self.prototype("Object"),
        };
        let mut object = ScriptObject::new(prototype, ObjectClass::Ordinary);
        object.constructor = Some(ctor);
        let instance = Value::Object(self.alloc_object(object));

        match self.call(constructor, &instance, args)? {
            result @ Value::Object(_) => Ok(result),
            _ => Ok(instance),
        }
    }

    /// `new` on a built-in class by name
    pub fn construct_class(&mut self, class: &str, args: &[Value]) -> Result<Value, VmError> {
        let ctor = match self.class_constructor(class) {
            Some(ctor) => Value::Object(ctor),
            None => self.get_member(self.global, class)?,
        };
        if !self.is_callable(&ctor) {
            return Err(VmError::type_error(format!("{} is not a constructor", class)));
        }
        self.construct(&ctor, args)
    }

    /// Build a function object from a decoder definition. It closes over the
    /// current frame's locals and scope chain, if a frame is running.
    pub fn define_function(&mut self, definition: FunctionDefinition) -> Result<ObjectId, VmError> {
        let (scope, chain) = match self.contexts.last() {
            Some(context) => (Some(context.locals().clone()), context.scope_chain().to_vec()),
            None => (None, Vec::new()),
        };
        let defined = DefinedFunction::new(definition, scope, chain)?;
        let function = self.create_function_object(Function::Defined(Rc::new(defined)));

        let prototype = self.create_object();
        let key = self.intern("constructor");
        self.object_mut(prototype)?
            .properties
            .insert(key, Property::hidden(Value::Object(function)));
        let key = self.intern("prototype");
        self.object_mut(function)?
            .properties
            .insert(key, Property::hidden(Value::Object(prototype)));
        Ok(function)
    }
}
