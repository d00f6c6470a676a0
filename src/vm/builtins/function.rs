//! Function.prototype methods: call and apply

use crate::error::VmError;
use crate::function::Invocation;
use crate::object::ObjectClass;
use crate::value::Value;
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, arg};

pub const FUNCTION_CLASS: ClassDefinition = ClassDefinition {
    name: "Function",
    base: None,
    constructor: function_constructor,
    properties: &[
        ClassMember::Method {
            name: "call",
            func: function_call,
        },
        ClassMember::Method {
            name: "apply",
            func: function_apply,
        },
    ],
    static_properties: &[],
};

/// Functions only come from bytecode definitions
pub fn function_constructor(_vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Err(VmError::unsupported("functions cannot be constructed at runtime"))
}

/// `f.call(thisArg, ...args)`
pub fn function_call(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let this_arg = arg(args, 0);
    let rest = args.get(1..).unwrap_or_default();
    vm.invoke(this, &this_arg, rest)
}

/// `f.apply(thisArg, argsArray)`
pub fn function_apply(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let this_arg = arg(args, 0);
    let call_args = spread_arguments(vm, &arg(args, 1))?;
    vm.invoke(this, &this_arg, &call_args)
}

/// Flatten the argument list given to `apply`: an Array, an array-like
/// object (`length` plus indices), or nothing.
fn spread_arguments(vm: &mut Vm, value: &Value) -> Result<Vec<Value>, VmError> {
    let id = match value {
        Value::Undefined | Value::Null => return Ok(Vec::new()),
        Value::Object(id) => *id,
        other => {
            return Err(VmError::type_error(format!(
                "apply expects an array, got {}",
                other.type_name()
            )));
        }
    };
    if let ObjectClass::Array(elements) = &vm.object(id)?.class {
        return Ok(elements.clone());
    }

    let length = vm.get_member(id, "length")?;
    if !length.is_number() {
        return Err(VmError::type_error("apply expects an array-like object"));
    }
    let length = usize::try_from(length.to_integer()).unwrap_or(0);
    let mut spread = Vec::with_capacity(length.min(256));
    for index in 0..length {
        spread.push(vm.get_member(id, &index.to_string())?);
    }
    Ok(spread)
}
