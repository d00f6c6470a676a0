//! Variable resolution for the running frame.
//!
//! Lookup order for a plain name: `this`, locals (including captured scopes),
//! `arguments` / `super`, the scope chain innermost first, the global object,
//! then the well-known names `_global`, `_root`, `_parent` and `extern`.
//! Names containing `.` resolve as paths.

use crate::error::VmError;
use crate::function::PreloadKind;
use crate::gc::ObjectId;
use crate::value::Value;

use super::Vm;
use super::context::{ActionContext, Scope};

impl Vm {
    pub fn get_variable(&mut self, name: &str) -> Result<Value, VmError> {
        if name.contains('.') {
            return self.resolve_variable_path(name);
        }
        if name == "this" {
            return Ok(self
                .contexts
                .last()
                .map_or(Value::Undefined, |c| c.this().clone()));
        }

        let (local, chain) = match self.contexts.last() {
            Some(context) => (context.param(name), context.scope_chain().to_vec()),
            None => (None, Vec::new()),
        };
        if let Some(value) = local {
            return Ok(value);
        }

        match name {
            "arguments" if !self.contexts.is_empty() => return self.current_arguments(),
            "super" if !self.contexts.is_empty() => {
                let this = self.current_context()?.this().clone();
                return self.super_of(&this);
            }
            _ => {}
        }

        for object in chain.iter().rev() {
            if self.has_member(*object, name)? {
                return self.get_member(*object, name);
            }
        }
        if self.has_member(self.global, name)? {
            return self.get_member(self.global, name);
        }

        match name {
            "_global" => Ok(Value::Object(self.global)),
            "_root" => Ok(self.root.map_or(Value::Undefined, Value::Object)),
            "extern" => Ok(Value::Object(self.extern_object)),
            "_parent" => match self.path_start_object() {
                Some(object) => self.get_member(object, "_parent"),
                None => Ok(Value::Undefined),
            },
            _ => Ok(Value::Undefined),
        }
    }

    /// Assign to an existing local, else to the scope-chain object (or the
    /// global object) that has the member, else to the innermost scope-chain
    /// object (or a new local when the chain is empty).
    pub fn set_variable(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        if let Some((path, member)) = name.rsplit_once('.') {
            let target = match self.resolve_variable_path(path)? {
                Value::Object(id) => id,
                _ => return Err(VmError::unresolved_path(name, path)),
            };
            return self.set_member(target, member, value);
        }

        let Some(context) = self.contexts.last() else {
            return self.set_member(self.global, name, value);
        };
        let locals = context.locals().clone();
        let chain = context.scope_chain().to_vec();

        if Scope::assign(&locals, name, value.clone()) {
            return Ok(());
        }
        for object in chain.iter().rev() {
            if self.has_member(*object, name)? {
                return self.set_member(*object, name, value);
            }
        }
        if self.has_member(self.global, name)? {
            return self.set_member(self.global, name, value);
        }
        match chain.last() {
            Some(innermost) => self.set_member(*innermost, name, value),
            None => {
                locals.borrow_mut().define(self.intern(name), value);
                Ok(())
            }
        }
    }

    /// Declare a local in the running frame (`var name = value`). Without a
    /// frame the variable goes on the global object.
    pub fn define_local(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        let key = self.intern(name);
        match self.contexts.last_mut() {
            Some(context) => {
                context.set_param(key, value);
                Ok(())
            }
            None => self.set_member(self.global, name, value),
        }
    }

    /// Object a relative path starts from: the innermost scope-chain object,
    /// else `this`, else the global object.
    pub(crate) fn path_start_object(&self) -> Option<ObjectId> {
        let context = self.contexts.last()?;
        context
            .scope_chain()
            .last()
            .copied()
            .or_else(|| context.this().as_object())
    }

    /// `super`: the prototype of the prototype of `this`
    pub(crate) fn super_of(&self, this: &Value) -> Result<Value, VmError> {
        let Value::Object(id) = this else {
            return Ok(Value::Undefined);
        };
        let proto = self.object(*id)?.prototype;
        let grand = match proto {
            Some(p) => self.object(p)?.prototype,
            None => None,
        };
        Ok(grand.map_or(Value::Undefined, Value::Object))
    }

    /// The running frame's `arguments` array, created on first use
    fn current_arguments(&mut self) -> Result<Value, VmError> {
        let context = self.current_context()?;
        if let Some(id) = context.arguments_object() {
            return Ok(Value::Object(id));
        }
        let args = context.arguments().to_vec();
        let id = self.create_array(args);
        self.current_context_mut()?.set_arguments_object(id);
        Ok(Value::Object(id))
    }

    /// Value preloaded into a register for `kind`, for a frame not yet pushed
    pub(crate) fn well_known_value(
        &mut self,
        context: &mut ActionContext,
        kind: PreloadKind,
    ) -> Result<Value, VmError> {
        match kind {
            PreloadKind::This => Ok(context.this().clone()),
            PreloadKind::Arguments => {
                if let Some(id) = context.arguments_object() {
                    return Ok(Value::Object(id));
                }
                let id = self.create_array(context.arguments().to_vec());
                context.set_arguments_object(id);
                Ok(Value::Object(id))
            }
            PreloadKind::Super => self.super_of(context.this()),
            PreloadKind::Root => Ok(self.root.map_or(Value::Undefined, Value::Object)),
            PreloadKind::Parent => match context.this().as_object() {
                Some(this) => self.get_member(this, "_parent"),
                None => Ok(Value::Undefined),
            },
            PreloadKind::Global => Ok(Value::Object(self.global)),
            PreloadKind::Extern => Ok(Value::Object(self.extern_object)),
        }
    }
}
