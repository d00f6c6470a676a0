//! Tests for interval registration and tick-driven firing

use aptvm::{Invocation, Value, Vm, VmError};

use super::{Asm, create_scripted_vm, int, obj, op, text};

/// Increments the global `count`
fn bump(vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let global = vm.global_object();
    let count = vm.get_member(global, "count")?.to_integer();
    vm.set_member(global, "count", Value::Integer(count + 1))?;
    Ok(Value::Undefined.into())
}

fn fail(_vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Err(VmError::type_error("callback failed"))
}

/// Stores `this` and the first argument on the global object
fn record(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let global = vm.global_object();
    vm.set_member(global, "seenThis", this.clone())?;
    vm.set_member(global, "seenArg", args.first().cloned().unwrap_or_default())?;
    Ok(Value::Undefined.into())
}

fn count(vm: &mut Vm) -> i32 {
    let global = vm.global_object();
    int(&vm.get_member(global, "count").unwrap())
}

#[test]
fn test_interval_fires_once_per_period() {
    let (mut vm, clock) = create_scripted_vm(Vec::new());
    let global = vm.global_object();
    vm.set_member(global, "count", Value::Integer(0)).unwrap();
    let callback = Value::Object(vm.create_native_function("bump", bump));
    vm.create_interval("every100", 100, &callback, Value::Undefined, Vec::new())
        .unwrap();

    assert_eq!(vm.tick().unwrap(), 0);
    clock.advance(99);
    assert_eq!(vm.tick().unwrap(), 0);
    clock.advance(1);
    assert_eq!(vm.tick().unwrap(), 1);
    clock.advance(50);
    assert_eq!(vm.tick().unwrap(), 0);
    clock.advance(50);
    assert_eq!(vm.tick().unwrap(), 1);
    assert_eq!(count(&mut vm), 2);
}

/// Increments the global `count` and clears "poll" on the third call
fn bump_three_times(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    bump(vm, this, args)?;
    let global = vm.global_object();
    if vm.get_member(global, "count")?.to_integer() >= 3 {
        vm.clear_interval("poll");
    }
    Ok(Value::Undefined.into())
}

#[test]
fn test_half_period_ticks_fire_every_other_tick() {
    let (mut vm, clock) = create_scripted_vm(Vec::new());
    let global = vm.global_object();
    vm.set_member(global, "count", Value::Integer(0)).unwrap();
    let callback = Value::Object(vm.create_native_function("bump", bump));
    vm.create_interval("poll", 100, &callback, Value::Undefined, Vec::new())
        .unwrap();

    // Ticks at 50, 100, ... 350
    for _ in 0..7 {
        clock.advance(50);
        vm.tick().unwrap();
    }
    assert_eq!(count(&mut vm), 3);
}

#[test]
fn test_clearing_on_third_fire_prevents_a_fourth() {
    let (mut vm, clock) = create_scripted_vm(Vec::new());
    let global = vm.global_object();
    vm.set_member(global, "count", Value::Integer(0)).unwrap();
    let callback = Value::Object(vm.create_native_function("bumpThreeTimes", bump_three_times));
    vm.create_interval("poll", 100, &callback, Value::Undefined, Vec::new())
        .unwrap();

    for _ in 0..7 {
        clock.advance(50);
        vm.tick().unwrap();
    }
    assert_eq!(count(&mut vm), 3);
    assert!(!vm.has_interval("poll"));

    for _ in 0..4 {
        clock.advance(50);
        assert_eq!(vm.tick().unwrap(), 0);
    }
    assert_eq!(count(&mut vm), 3);
}

#[test]
fn test_script_callback_clears_its_own_interval() {
    // function() { count = count + 1; if (!(count < 3)) clearInterval(handle); }
    let mut callback = Asm::new();
    callback
        .push("count")
        .get_var("count")
        .push(1)
        .op(op::ADD)
        .op(op::SET_VAR)
        .get_var("count")
        .push(3)
        .op(op::LESS);
    let clear = callback.jump_placeholder(op::JUMP_IF_FALSE);
    callback.op(op::END);
    callback.patch(clear);
    callback
        .get_var("handle")
        .push(1)
        .get_var("clearInterval")
        .op(op::CALL)
        .op(op::POP)
        .op(op::END);

    let (mut vm, clock) = create_scripted_vm(vec![callback.function("onTick", Vec::new())]);
    let target = vm.create_object();
    vm.pin(target);

    // count = 0; handle = setInterval(function..., 100);
    let mut script = Asm::new();
    script
        .set_var("count", 0)
        .push("handle")
        .op_u8(op::DEFINE_FUNCTION, 0)
        .push(100)
        .push(2)
        .get_var("setInterval")
        .op(op::CALL)
        .op(op::SET_VAR)
        .op(op::END);
    script.run(&mut vm, target).unwrap();

    let handle = text(&vm.get_member(target, "handle").unwrap());
    assert_eq!(handle, "__interval1");
    assert!(vm.has_interval(&handle));

    let mut fired = 0;
    for _ in 0..5 {
        clock.advance(100);
        fired += vm.tick().unwrap();
    }
    assert_eq!(fired, 3);
    assert_eq!(int(&vm.get_member(target, "count").unwrap()), 3);
    assert!(!vm.has_interval(&handle));
    assert!(vm.interval_names().is_empty());
}

#[test]
fn test_failing_callback_does_not_stop_others() {
    let (mut vm, clock) = create_scripted_vm(Vec::new());
    let global = vm.global_object();
    vm.set_member(global, "count", Value::Integer(0)).unwrap();
    let broken = Value::Object(vm.create_native_function("fail", fail));
    let working = Value::Object(vm.create_native_function("bump", bump));
    vm.create_interval("broken", 10, &broken, Value::Undefined, Vec::new())
        .unwrap();
    vm.create_interval("working", 10, &working, Value::Undefined, Vec::new())
        .unwrap();

    clock.advance(10);
    assert_eq!(vm.tick().unwrap(), 2);
    assert_eq!(count(&mut vm), 1);
    assert_eq!(vm.context_depth(), 0);
    assert!(vm.has_interval("broken"));
}

#[test]
fn test_reregistering_keeps_firing_order() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let callback = Value::Object(vm.create_native_function("bump", bump));
    vm.create_interval("a", 10, &callback, Value::Undefined, Vec::new())
        .unwrap();
    vm.create_interval("b", 10, &callback, Value::Undefined, Vec::new())
        .unwrap();
    vm.create_interval("a", 50, &callback, Value::Undefined, Vec::new())
        .unwrap();

    let names: Vec<String> = vm.interval_names().iter().map(|n| n.to_string()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(vm.interval("a").unwrap().period_ms, 50);

    assert!(vm.clear_interval("a"));
    assert!(!vm.clear_interval("a"));
}

/// Registers a zero-period interval named "late"
fn register_late(vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    if !vm.has_interval("late") {
        let global = vm.global_object();
        let callback = vm.get_member(global, "bumpFn")?;
        vm.create_interval("late", 0, &callback, Value::Undefined, Vec::new())?;
    }
    Ok(Value::Undefined.into())
}

#[test]
fn test_interval_registered_during_tick_waits_for_next_tick() {
    let (mut vm, clock) = create_scripted_vm(Vec::new());
    let global = vm.global_object();
    vm.set_member(global, "count", Value::Integer(0)).unwrap();
    let bump_fn = Value::Object(vm.create_native_function("bump", bump));
    vm.set_member(global, "bumpFn", bump_fn).unwrap();
    let registrar = Value::Object(vm.create_native_function("register", register_late));
    vm.create_interval("first", 100, &registrar, Value::Undefined, Vec::new())
        .unwrap();

    clock.advance(100);
    assert_eq!(vm.tick().unwrap(), 1);
    assert_eq!(count(&mut vm), 0);

    assert_eq!(vm.tick().unwrap(), 1);
    assert_eq!(count(&mut vm), 1);
}

/// Calls `tick` re-entrantly and reports the error kind
fn nested_tick(vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let kind = match vm.tick() {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    Ok(Value::from(kind).into())
}

#[test]
fn test_tick_rejected_while_frames_are_live() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let global = vm.global_object();
    let nested = vm.create_native_function("nestedTick", nested_tick);
    vm.set_member(global, "nestedTick", Value::Object(nested)).unwrap();

    let mut script = Asm::new();
    script.push(0).get_var("nestedTick").op(op::CALL).op(op::RETURN);
    let result = script.run(&mut vm, global).unwrap();
    assert_eq!(text(&result), "UnsupportedOperation");
}

#[test]
fn test_set_interval_forms() {
    let (mut vm, clock) = create_scripted_vm(Vec::new());
    let global = Value::Object(vm.global_object());
    let callback = Value::Object(vm.create_native_function("record", record));

    // setInterval(callback, ms, arg) with an explicit receiver
    let receiver = vm.create_object();
    vm.pin(receiver);
    let set_interval = vm.get_value_member(&global, "setInterval").unwrap();
    let name = vm
        .call(
            &set_interval,
            &Value::Object(receiver),
            &[callback.clone(), Value::Integer(20), Value::from("extra")],
        )
        .unwrap();
    assert_eq!(text(&name), "__interval1");

    clock.advance(20);
    assert_eq!(vm.tick().unwrap(), 1);
    assert_eq!(obj(&vm.get_value_member(&global, "seenThis").unwrap()), receiver);
    assert_eq!(text(&vm.get_value_member(&global, "seenArg").unwrap()), "extra");
    vm.call_method(&global, "clearInterval", &[name]).unwrap();

    // setInterval(object, "method", ms)
    let holder = vm.create_object();
    vm.pin(holder);
    vm.set_member(holder, "onTick", callback).unwrap();
    let name = vm
        .call_method(&global, "setInterval", &[Value::Object(holder), Value::from("onTick"), Value::Integer(5)])
        .unwrap();
    assert_eq!(text(&name), "__interval2");

    clock.advance(5);
    assert_eq!(vm.tick().unwrap(), 1);
    assert_eq!(obj(&vm.get_value_member(&global, "seenThis").unwrap()), holder);
    assert_eq!(vm.get_value_member(&global, "seenArg").unwrap(), Value::Undefined);

    let err = vm
        .call_method(&global, "setInterval", &[Value::Object(holder), Value::from("missing"), Value::Integer(5)])
        .unwrap_err();
    assert!(matches!(err, VmError::TypeCoercion { .. }), "got {:?}", err);
    let err = vm
        .call_method(&global, "setInterval", &[Value::Object(holder), Value::from("onTick")])
        .unwrap_err();
    assert!(matches!(err, VmError::Arity { .. }), "got {:?}", err);
}
