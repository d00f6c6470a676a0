//! Number built-in methods

use crate::error::VmError;
use crate::function::Invocation;
use crate::object::ObjectClass;
use crate::value::{Value, float_to_integer};
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, ConstantValue, arg, is_construct_call, set_class};

pub const NUMBER_CLASS: ClassDefinition = ClassDefinition {
    name: "Number",
    base: None,
    constructor: number_constructor,
    properties: &[
        ClassMember::Method {
            name: "valueOf",
            func: number_value_of,
        },
        ClassMember::Method {
            name: "toString",
            func: number_to_string,
        },
    ],
    static_properties: &[
        ClassMember::Constant {
            name: "MAX_VALUE",
            value: ConstantValue::Float(f64::MAX),
        },
        ClassMember::Constant {
            name: "MIN_VALUE",
            value: ConstantValue::Float(5e-324),
        },
        ClassMember::Constant {
            name: "NaN",
            value: ConstantValue::Float(f64::NAN),
        },
        ClassMember::Constant {
            name: "POSITIVE_INFINITY",
            value: ConstantValue::Float(f64::INFINITY),
        },
        ClassMember::Constant {
            name: "NEGATIVE_INFINITY",
            value: ConstantValue::Float(f64::NEG_INFINITY),
        },
    ],
};

/// Numeric value of an argument, kept integral when it is exactly an `i32`
fn to_number(value: &Value) -> Value {
    match value {
        Value::Integer(n) => Value::Integer(*n),
        other => {
            let n = other.to_float();
            let truncated = float_to_integer(n);
            if f64::from(truncated) == n && !(n == 0.0 && n.is_sign_negative()) {
                Value::Integer(truncated)
            } else {
                Value::Float(n)
            }
        }
    }
}

/// `Number(value)` converts; `new Number(value)` makes a wrapper object.
pub fn number_constructor(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let value = if args.is_empty() {
        Value::Integer(0)
    } else {
        to_number(&arg(args, 0))
    };
    if is_construct_call(vm, this, "Number") {
        set_class(vm, this, ObjectClass::Number(value))?;
        return Ok(this.clone().into());
    }
    Ok(value.into())
}

fn this_number(vm: &Vm, this: &Value) -> Result<Value, VmError> {
    match this {
        Value::Integer(_) | Value::Float(_) => Ok(this.clone()),
        Value::Object(id) => match &vm.object(*id)?.class {
            ObjectClass::Number(n) => Ok(n.clone()),
            _ => Err(VmError::type_error("Number method called on incompatible object")),
        },
        other => Err(VmError::type_error(format!(
            "Number method called on {}",
            other.type_name()
        ))),
    }
}

pub fn number_value_of(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(this_number(vm, this)?.into())
}

pub fn number_to_string(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::String(this_number(vm, this)?.to_as_string()).into())
}
