//! Tests for parameter binding and register preloading

use aptvm::{ObjectId, PreloadFlags, Value, Vm, VmError};

use super::{Asm, by_name, create_scripted_vm, in_register, int, obj, op, text};

/// Call a new-convention function whose body returns register `register`
fn preloaded(vm: &mut Vm, flags: PreloadFlags, register: u8, this: Value, args: &[Value]) -> Value {
    let mut body = Asm::new();
    body.op_u8(op::PUSH_REG, register).op(op::RETURN);
    let function = vm
        .define_function(body.function_v2("preloaded", Vec::new(), 0, flags))
        .unwrap();
    vm.call(&Value::Object(function), &this, args).unwrap()
}

#[test]
fn test_register_parameters_and_preloads_share_registers() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let receiver = vm.create_object();
    vm.set_member(receiver, "tag", Value::from("t")).unwrap();

    // Parameter `x` claims register 1, so `this` lands in 2 and `_global` in 3
    let mut body = Asm::new();
    body.op_u8(op::PUSH_REG, 2)
        .push("tag")
        .op(op::GET_MEMBER)
        .op_u8(op::PUSH_REG, 1)
        .op(op::ADD)
        .op(op::RETURN);
    let flags = PreloadFlags::PRELOAD_THIS | PreloadFlags::PRELOAD_GLOBAL;
    let definition = body.function_v2("tagged", vec![in_register(1, "x")], 2, flags);
    let function = vm.define_function(definition).unwrap();

    let result = vm
        .call(&Value::Object(function), &Value::Object(receiver), &[Value::from("!")])
        .unwrap();
    assert_eq!(text(&result), "t!");

    let global = preloaded(
        &mut vm,
        PreloadFlags::PRELOAD_THIS | PreloadFlags::PRELOAD_GLOBAL,
        2,
        Value::Null,
        &[],
    );
    assert_eq!(obj(&global), vm.global_object());
}

#[test]
fn test_suppress_wins_over_preload() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let flags = PreloadFlags::PRELOAD_THIS | PreloadFlags::SUPPRESS_THIS | PreloadFlags::PRELOAD_ARGUMENTS;

    // `this` is suppressed, so `arguments` takes register 1
    let arguments = preloaded(
        &mut vm,
        flags,
        1,
        Value::Null,
        &[Value::Integer(7), Value::Integer(8)],
    );
    let arguments = obj(&arguments);
    assert_eq!(int(&vm.get_member(arguments, "length").unwrap()), 2);
    assert_eq!(int(&vm.get_member(arguments, "1").unwrap()), 8);
}

#[test]
fn test_super_root_parent_and_extern_preloads() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let grand = vm.create_object();
    let parent_proto = vm.create_object_with_prototype(Some(grand));
    let this = vm.create_object_with_prototype(Some(parent_proto));
    let clip_parent = vm.create_object();
    vm.set_member(this, "_parent", Value::Object(clip_parent)).unwrap();
    let root = vm.create_object();
    vm.set_root(Some(root));

    let flags = PreloadFlags::PRELOAD_SUPER
        | PreloadFlags::PRELOAD_ROOT
        | PreloadFlags::PRELOAD_PARENT
        | PreloadFlags::PRELOAD_EXTERN;
    let expected: [(u8, ObjectId); 4] = [(1, grand), (2, root), (3, clip_parent), (4, vm.extern_object())];
    for (register, want) in expected {
        let got = preloaded(&mut vm, flags, register, Value::Object(this), &[]);
        assert_eq!(obj(&got), want, "register {}", register);
    }
}

#[test]
fn test_old_convention_binds_by_name() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    // function f(a) { return arguments.length + a; }
    let mut body = Asm::new();
    body.get_var("arguments")
        .push("length")
        .op(op::GET_MEMBER)
        .get_var("a")
        .op(op::ADD)
        .op(op::RETURN);
    let function = vm
        .define_function(body.function("f", vec![by_name("a")]))
        .unwrap();

    let result = vm
        .call(
            &Value::Object(function),
            &Value::Undefined,
            &[Value::Integer(10), Value::Integer(20), Value::Integer(30)],
        )
        .unwrap();
    assert_eq!(int(&result), 13);
}

#[test]
fn test_register_zero_means_by_name() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let mut body = Asm::new();
    body.get_var("named").op(op::RETURN);
    let definition = body.function_v2("f", vec![in_register(0, "named")], 1, PreloadFlags::NONE);
    let function = vm.define_function(definition).unwrap();

    let result = vm
        .call(&Value::Object(function), &Value::Undefined, &[Value::from("v")])
        .unwrap();
    assert_eq!(text(&result), "v");
}

#[test]
fn test_inconsistent_definitions_are_rejected() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let body = Asm::new();

    // Register parameter without the new convention
    let definition = body.function("f", vec![in_register(1, "x")]);
    let err = vm.define_function(definition).unwrap_err();
    assert!(matches!(err, VmError::InvalidDefinition { .. }), "got {:?}", err);

    // Register outside the declared count
    let definition = body.function_v2("f", vec![in_register(4, "x")], 2, PreloadFlags::NONE);
    let err = vm.define_function(definition).unwrap_err();
    assert!(matches!(err, VmError::InvalidDefinition { .. }), "got {:?}", err);

    // Two parameters in one register
    let definition = body.function_v2(
        "f",
        vec![in_register(1, "x"), in_register(1, "y")],
        2,
        PreloadFlags::NONE,
    );
    let err = vm.define_function(definition).unwrap_err();
    assert!(matches!(err, VmError::InvalidDefinition { .. }), "got {:?}", err);
}

#[test]
fn test_register_out_of_range_fails() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let mut body = Asm::new();
    body.op_u8(op::PUSH_REG, 9).op(op::RETURN);
    let function = vm
        .define_function(body.function_v2("f", Vec::new(), 2, PreloadFlags::NONE))
        .unwrap();

    let err = vm
        .call(&Value::Object(function), &Value::Undefined, &[])
        .unwrap_err();
    assert!(matches!(err, VmError::InvalidRegister { index: 9, count: 2 }), "got {:?}", err);
}

#[test]
fn test_well_known_names_from_a_script() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let root = vm.create_object();
    vm.set_root(Some(root));
    let target = vm.create_object();

    for (name, want) in [
        ("_global", vm.global_object()),
        ("_root", root),
        ("extern", vm.extern_object()),
        ("this", target),
    ] {
        let mut script = Asm::new();
        script.get_var(name).op(op::RETURN);
        let got = script.run(&mut vm, target).unwrap();
        assert_eq!(obj(&got), want, "{}", name);
    }
}
