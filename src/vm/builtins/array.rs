//! Array built-in methods

use crate::error::VmError;
use crate::function::Invocation;
use crate::gc::ObjectId;
use crate::object::{MAX_ARRAY_LENGTH, ObjectClass};
use crate::value::Value;
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, arg, is_construct_call, set_class};

pub const ARRAY_CLASS: ClassDefinition = ClassDefinition {
    name: "Array",
    base: None,
    constructor: array_constructor,
    properties: &[
        ClassMember::Accessor {
            name: "length",
            get: Some(array_get_length),
            set: Some(array_set_length),
        },
        ClassMember::Method {
            name: "push",
            func: array_push,
        },
        ClassMember::Method {
            name: "join",
            func: array_join,
        },
    ],
    static_properties: &[],
};

/// `Array(n)` makes `n` empty slots; any other argument list becomes the
/// elements.
pub fn array_constructor(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let elements = match args {
        [Value::Integer(n)] => {
            let length = usize::try_from(*n)
                .ok()
                .filter(|len| *len <= MAX_ARRAY_LENGTH)
                .ok_or_else(|| VmError::type_error(format!("invalid array length {}", n)))?;
            vec![Value::Undefined; length]
        }
        _ => args.to_vec(),
    };
    if is_construct_call(vm, this, "Array") {
        set_class(vm, this, ObjectClass::Array(elements))?;
        return Ok(this.clone().into());
    }
    Ok(Value::Object(vm.create_array(elements)).into())
}

fn this_array(vm: &Vm, this: &Value) -> Result<ObjectId, VmError> {
    if let Value::Object(id) = this {
        if vm.object(*id)?.as_array().is_some() {
            return Ok(*id);
        }
    }
    Err(VmError::type_error("Array method called on a non-array"))
}

fn array_elements<'a>(vm: &'a mut Vm, id: ObjectId) -> Result<&'a mut Vec<Value>, VmError> {
    vm.object_mut(id)?
        .as_array_mut()
        .ok_or_else(|| VmError::type_error("Array method called on a non-array"))
}

fn length_value(len: usize) -> Value {
    Value::Integer(i32::try_from(len).unwrap_or(i32::MAX))
}

pub fn array_get_length(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let id = this_array(vm, this)?;
    let len = array_elements(vm, id)?.len();
    Ok(length_value(len).into())
}

/// Assigning `length` truncates or pads with `undefined`.
pub fn array_set_length(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let id = this_array(vm, this)?;
    let requested = arg(args, 0).to_integer();
    let length = usize::try_from(requested)
        .ok()
        .filter(|len| *len <= MAX_ARRAY_LENGTH)
        .ok_or_else(|| VmError::type_error(format!("invalid array length {}", requested)))?;
    array_elements(vm, id)?.resize(length, Value::Undefined);
    Ok(Value::Undefined.into())
}

/// Append the arguments; returns the new length.
pub fn array_push(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let id = this_array(vm, this)?;
    let elements = array_elements(vm, id)?;
    elements.extend_from_slice(args);
    let len = elements.len();
    Ok(length_value(len).into())
}

/// Join element strings with the separator (default `,`). `undefined` and
/// `null` elements contribute empty strings.
pub fn array_join(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let id = this_array(vm, this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => vm.to_display_string(&other)?.to_string(),
    };
    let elements = array_elements(vm, id)?.clone();
    let mut parts = Vec::with_capacity(elements.len());
    for element in &elements {
        parts.push(match element {
            Value::Undefined | Value::Null => String::new(),
            other => vm.to_display_string(other)?.to_string(),
        });
    }
    Ok(Value::from(parts.join(&separator)).into())
}
