//! Tests for JSON import and export of script values

use aptvm::{Invocation, Value, Vm, VmError};
use serde_json::json;

use super::{create_test_vm, int, obj, text};

fn noop(_vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Ok(Value::Undefined.into())
}

#[test]
fn test_value_from_json() {
    let mut vm = create_test_vm();
    let document = json!({
        "title": "Options",
        "volume": 7,
        "ratio": 0.5,
        "muted": false,
        "tags": ["a", null],
    });

    let value = vm.value_from_json(&document).unwrap();
    let object = obj(&value);
    assert_eq!(text(&vm.get_member(object, "title").unwrap()), "Options");
    assert_eq!(int(&vm.get_member(object, "volume").unwrap()), 7);
    assert_eq!(vm.get_member(object, "ratio").unwrap(), Value::Float(0.5));
    assert_eq!(vm.get_member(object, "muted").unwrap(), Value::Boolean(false));

    let tags = vm.get_member(object, "tags").unwrap();
    assert_eq!(vm.type_of(&tags), "object");
    assert_eq!(int(&vm.get_value_member(&tags, "length").unwrap()), 2);
    assert_eq!(vm.get_value_member(&tags, "1").unwrap(), Value::Null);
    assert_eq!(vm.call_method(&tags, "join", &[]).unwrap(), Value::from("a,"));
}

#[test]
fn test_large_numbers_become_floats() {
    let mut vm = create_test_vm();
    let value = vm.value_from_json(&json!(5_000_000_000_i64)).unwrap();
    assert_eq!(value, Value::Float(5_000_000_000.0));
}

#[test]
fn test_value_to_json() {
    let mut vm = create_test_vm();
    let object = vm.create_object();
    vm.set_member(object, "name", Value::from("clip")).unwrap();
    vm.set_member(object, "depth", Value::Integer(3)).unwrap();
    let list = vm.create_array(vec![Value::Boolean(true), Value::Undefined]);
    vm.set_member(object, "flags", Value::Object(list)).unwrap();
    let method = vm.create_native_function("noop", noop);
    vm.set_member(object, "method", Value::Object(method)).unwrap();

    let exported = vm.value_to_json(&Value::Object(object)).unwrap();
    assert_eq!(
        exported,
        json!({ "name": "clip", "depth": 3, "flags": [true, null] })
    );
    // Member order follows insertion order
    let keys: Vec<&String> = exported.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["name", "depth", "flags"]);
}

#[test]
fn test_wrappers_export_their_primitive() {
    let mut vm = create_test_vm();
    let wrapped = vm.construct_class("Number", &[Value::Integer(4)]).unwrap();
    assert_eq!(vm.value_to_json(&wrapped).unwrap(), json!(4));
    let wrapped = vm.construct_class("String", &[Value::from("s")]).unwrap();
    assert_eq!(vm.value_to_json(&wrapped).unwrap(), json!("s"));
    assert_eq!(vm.value_to_json(&Value::Float(f64::NAN)).unwrap(), json!(null));
}

#[test]
fn test_unrepresentable_values_are_rejected() {
    let mut vm = create_test_vm();
    let a = vm.create_object();
    let b = vm.create_object();
    vm.set_member(a, "b", Value::Object(b)).unwrap();
    vm.set_member(b, "a", Value::Object(a)).unwrap();
    let err = vm.value_to_json(&Value::Object(a)).unwrap_err();
    assert!(matches!(err, VmError::UnsupportedOperation { .. }), "got {:?}", err);

    let function = Value::Object(vm.create_native_function("noop", noop));
    let err = vm.value_to_json(&function).unwrap_err();
    assert!(matches!(err, VmError::UnsupportedOperation { .. }), "got {:?}", err);
}

#[test]
fn test_shared_references_are_not_cycles() {
    let mut vm = create_test_vm();
    let shared = vm.create_object();
    vm.set_member(shared, "n", Value::Integer(1)).unwrap();
    let list = vm.create_array(vec![Value::Object(shared), Value::Object(shared)]);

    let exported = vm.value_to_json(&Value::Object(list)).unwrap();
    assert_eq!(exported, json!([{ "n": 1 }, { "n": 1 }]));
}
