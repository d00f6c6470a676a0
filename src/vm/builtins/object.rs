//! Object built-in methods

use crate::error::VmError;
use crate::function::Invocation;
use crate::object::Property;
use crate::value::Value;
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, arg, is_construct_call};

pub const OBJECT_CLASS: ClassDefinition = ClassDefinition {
    name: "Object",
    base: None,
    constructor: object_constructor,
    properties: &[
        ClassMember::Method {
            name: "hasOwnProperty",
            func: object_has_own_property,
        },
        ClassMember::Method {
            name: "toString",
            func: object_to_string,
        },
        ClassMember::Method {
            name: "valueOf",
            func: object_value_of,
        },
        ClassMember::Method {
            name: "addProperty",
            func: object_add_property,
        },
    ],
    static_properties: &[],
};

/// `Object(value)` boxes primitives and passes objects through; `new Object()`
/// keeps the fresh instance.
pub fn object_constructor(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let value = arg(args, 0);
    if let Value::Object(_) = value {
        return Ok(value.into());
    }
    if is_construct_call(vm, this, "Object") && value.is_null_or_undefined() {
        return Ok(this.clone().into());
    }
    let id = match value {
        Value::Undefined | Value::Null => vm.create_object(),
        primitive => vm.to_object(&primitive)?,
    };
    Ok(Value::Object(id).into())
}

pub fn object_has_own_property(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let object = vm.to_object(this)?;
    let name = vm.to_display_string(&arg(args, 0))?;
    Ok(Value::Boolean(vm.has_own_member(object, name.as_str())?).into())
}

pub fn object_to_string(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::String(vm.to_display_string(this)?).into())
}

pub fn object_value_of(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(this.clone().into())
}

/// `addProperty(name, getter, setter)` installs an accessor. The getter must
/// be a function; the setter may be `null` for a read-only property.
/// Returns false instead of failing on bad arguments.
pub fn object_add_property(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let object = vm.to_object(this)?;
    let name = vm.to_display_string(&arg(args, 0))?;
    let getter = arg(args, 1);
    let setter = arg(args, 2);

    if name.is_empty() || !vm.is_callable(&getter) {
        return Ok(Value::Boolean(false).into());
    }
    let setter = match setter {
        Value::Undefined | Value::Null => None,
        ref s if vm.is_callable(s) => s.as_object(),
        _ => return Ok(Value::Boolean(false).into()),
    };
    let defined = vm.define_property(object, name.as_str(), Property::accessor(getter.as_object(), setter))?;
    Ok(Value::Boolean(defined).into())
}
