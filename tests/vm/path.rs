//! Tests for dotted path resolution

use aptvm::{ObjectId, Value, Vm, VmError};

use super::{Asm, create_scripted_vm, create_test_vm, obj, op, text};

/// root -> menu -> title = "Main"; returns (root, menu)
fn menu_tree(vm: &mut Vm) -> (ObjectId, ObjectId) {
    let root = vm.create_object();
    let menu = vm.create_object();
    vm.set_member(menu, "title", Value::from("Main")).unwrap();
    vm.set_member(root, "menu", Value::Object(menu)).unwrap();
    (root, menu)
}

#[test]
fn test_resolve_path_walks_members() {
    let mut vm = create_test_vm();
    let (root, menu) = menu_tree(&mut vm);

    assert_eq!(text(&vm.resolve_path(root, "menu.title").unwrap()), "Main");
    assert_eq!(obj(&vm.resolve_path(root, "menu").unwrap()), menu);
    // A missing last segment is just undefined
    assert_eq!(vm.resolve_path(root, "menu.subtitle").unwrap(), Value::Undefined);
}

#[test]
fn test_resolve_path_through_prototype() {
    let mut vm = create_test_vm();
    let (root, _menu) = menu_tree(&mut vm);
    let child = vm.create_object_with_prototype(Some(root));

    assert_eq!(text(&vm.resolve_path(child, "menu.title").unwrap()), "Main");
}

#[test]
fn test_unresolved_intermediate_segments() {
    let mut vm = create_test_vm();
    let (root, _menu) = menu_tree(&mut vm);
    vm.set_member(root, "score", Value::Integer(5)).unwrap();

    let err = vm.resolve_path(root, "missing.title").unwrap_err();
    assert!(
        matches!(err, VmError::UnresolvedPath { ref segment, .. } if segment == "missing"),
        "got {:?}",
        err
    );
    let err = vm.resolve_path(root, "score.value").unwrap_err();
    assert!(
        matches!(err, VmError::UnresolvedPath { ref segment, .. } if segment == "score"),
        "got {:?}",
        err
    );
}

#[test]
fn test_dotted_variables_from_a_script() {
    let (mut vm, _clock) = create_scripted_vm(Vec::new());
    let (root, menu) = menu_tree(&mut vm);
    vm.set_root(Some(root));
    let target = vm.create_object();
    vm.set_member(target, "menu", Value::Object(menu)).unwrap();

    let mut script = Asm::new();
    script.get_var("menu.title").op(op::RETURN);
    assert_eq!(text(&script.run(&mut vm, target).unwrap()), "Main");

    // The head segment falls back to well-known variables
    let mut script = Asm::new();
    script
        .set_var("_root.menu.title", "Changed")
        .get_var("_root.menu.title")
        .op(op::RETURN);
    assert_eq!(text(&script.run(&mut vm, target).unwrap()), "Changed");
    assert_eq!(text(&vm.get_member(menu, "title").unwrap()), "Changed");

    let mut script = Asm::new();
    script.get_var("nothing.here").op(op::RETURN);
    let err = script.run(&mut vm, target).unwrap_err();
    assert!(matches!(err, VmError::UnresolvedPath { .. }), "got {:?}", err);
    assert_eq!(vm.context_depth(), 0);
}
