//! Dotted path resolution (`a.b.c`).

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::platform::DisplayHandle;
use crate::value::Value;

use super::Vm;
use super::builtins::stage::read;

impl Vm {
    /// Walk `path` from `start`. Every intermediate segment must be a member
    /// (own or inherited) holding an object; the last segment is read with
    /// ordinary member lookup.
    pub fn resolve_path(&mut self, start: ObjectId, path: &str) -> Result<Value, VmError> {
        let mut segments = path.split('.');
        let Some(last) = segments.next_back() else {
            return Ok(Value::Object(start));
        };
        let mut current = start;
        for segment in segments {
            current = self.step_into(current, path, segment)?;
        }
        self.get_member(current, last)
    }

    fn step_into(&mut self, object: ObjectId, path: &str, segment: &str) -> Result<ObjectId, VmError> {
        if !self.has_member(object, segment)? {
            return Err(VmError::unresolved_path(path, segment));
        }
        match self.get_member(object, segment)? {
            Value::Object(id) => Ok(id),
            _ => Err(VmError::unresolved_path(path, segment)),
        }
    }

    /// Resolve a dotted variable name from the running frame. The first
    /// segment is a member of the frame's target or, failing that, any
    /// variable visible from the frame (`_root`, `_global`, locals, ...).
    pub(crate) fn resolve_variable_path(&mut self, name: &str) -> Result<Value, VmError> {
        let (first, rest) = name.split_once('.').unwrap_or((name, ""));
        let start = self.path_start_object().unwrap_or(self.global);

        let head = if self.has_member(start, first)? {
            self.get_member(start, first)?
        } else {
            self.get_variable(first)?
        };
        let Value::Object(head) = head else {
            return Err(VmError::unresolved_path(name, first));
        };
        if rest.is_empty() {
            return Ok(Value::Object(head));
        }
        self.resolve_path(head, rest)
    }

    /// Resolve a text field's variable binding. Paths are relative to the
    /// clip containing the field: the immediate parent item, or the nearest
    /// ancestor with a script object when the parent is a bare placement.
    /// Unlike `_parent`, a render-item field does not skip its container.
    pub fn resolve_text_variable(&mut self, stage_object: ObjectId, path: &str) -> Result<Value, VmError> {
        let item = self.display_item(stage_object)?;
        let Some(container) = containing_script_object(&item)? else {
            return Err(VmError::unresolved_path(path, "_parent"));
        };
        self.resolve_path(container, path)
    }
}

fn containing_script_object(item: &DisplayHandle) -> Result<Option<ObjectId>, VmError> {
    let mut current = read(item)?.parent();
    while let Some(node) = current {
        let (script_object, parent) = {
            let borrowed = read(&node)?;
            (borrowed.script_object(), borrowed.parent())
        };
        if script_object.is_some() {
            return Ok(script_object);
        }
        current = parent;
    }
    Ok(None)
}
