//! String built-in methods

use crate::error::VmError;
use crate::function::Invocation;
use crate::object::ObjectClass;
use crate::value::{AsString, CheapClone, Value};
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, arg, is_construct_call, set_class};

pub const STRING_CLASS: ClassDefinition = ClassDefinition {
    name: "String",
    base: None,
    constructor: string_constructor,
    properties: &[
        ClassMember::Accessor {
            name: "length",
            get: Some(string_length),
            set: None,
        },
        ClassMember::Method {
            name: "substr",
            func: string_substr,
        },
        ClassMember::Method {
            name: "valueOf",
            func: string_value_of,
        },
        ClassMember::Method {
            name: "toString",
            func: string_to_string,
        },
    ],
    static_properties: &[],
};

/// String constructor function - `String(value)` converts value to a string.
/// When called with `new`, the fresh instance becomes a String wrapper.
pub fn string_constructor(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let value = match args.first() {
        Some(value) => vm.to_display_string(value)?,
        None => AsString::from(""),
    };
    if is_construct_call(vm, this, "String") {
        set_class(vm, this, ObjectClass::String(value))?;
        return Ok(this.clone().into());
    }
    Ok(Value::String(value).into())
}

/// The string a String method operates on: a primitive or a wrapper's payload
fn this_string(vm: &Vm, this: &Value) -> Result<AsString, VmError> {
    match this {
        Value::String(s) => Ok(s.cheap_clone()),
        Value::Object(id) => match &vm.object(*id)?.class {
            ObjectClass::String(s) => Ok(s.cheap_clone()),
            _ => Err(VmError::type_error("String method called on incompatible object")),
        },
        other => Err(VmError::type_error(format!(
            "String method called on {}",
            other.type_name()
        ))),
    }
}

pub fn string_length(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let s = this_string(vm, this)?;
    let length = i32::try_from(s.char_len()).unwrap_or(i32::MAX);
    Ok(Value::Integer(length).into())
}

/// `substr(start)` / `substr(start, length)` over characters. A negative
/// start counts from the end; out-of-range positions and lengths clamp.
pub fn string_substr(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    if !(1..=2).contains(&args.len()) {
        return Err(VmError::arity("substr", args.len()));
    }
    let s = this_string(vm, this)?;
    let len = i64::try_from(s.char_len()).unwrap_or(i64::MAX);

    let mut start = i64::from(arg(args, 0).to_integer());
    if start < 0 {
        start = (len + start).max(0);
    }
    let start = start.min(len);
    let count = match args.get(1) {
        Some(count) => i64::from(count.to_integer()).clamp(0, len - start),
        None => len - start,
    };

    let start = usize::try_from(start).unwrap_or(0);
    let count = usize::try_from(count).unwrap_or(0);
    let result: String = s.as_str().chars().skip(start).take(count).collect();
    Ok(Value::from(result).into())
}

pub fn string_value_of(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::String(this_string(vm, this)?).into())
}

pub fn string_to_string(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::String(this_string(vm, this)?).into())
}
