//! Boolean built-in methods

use crate::error::VmError;
use crate::function::Invocation;
use crate::object::ObjectClass;
use crate::value::Value;
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, arg, is_construct_call, set_class};

pub const BOOLEAN_CLASS: ClassDefinition = ClassDefinition {
    name: "Boolean",
    base: None,
    constructor: boolean_constructor,
    properties: &[
        ClassMember::Method {
            name: "valueOf",
            func: boolean_value_of,
        },
        ClassMember::Method {
            name: "toString",
            func: boolean_to_string,
        },
    ],
    static_properties: &[],
};

/// `Boolean(value)` converts; `new Boolean(value)` makes a wrapper object.
pub fn boolean_constructor(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let value = arg(args, 0).to_boolean();
    if is_construct_call(vm, this, "Boolean") {
        set_class(vm, this, ObjectClass::Boolean(value))?;
        return Ok(this.clone().into());
    }
    Ok(Value::Boolean(value).into())
}

fn this_boolean(vm: &Vm, this: &Value) -> Result<bool, VmError> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(id) => match &vm.object(*id)?.class {
            ObjectClass::Boolean(b) => Ok(*b),
            _ => Err(VmError::type_error("Boolean method called on incompatible object")),
        },
        other => Err(VmError::type_error(format!(
            "Boolean method called on {}",
            other.type_name()
        ))),
    }
}

pub fn boolean_value_of(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::Boolean(this_boolean(vm, this)?).into())
}

pub fn boolean_to_string(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::String(Value::Boolean(this_boolean(vm, this)?).to_as_string()).into())
}
