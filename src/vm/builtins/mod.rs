//! Built-in classes and global functions.
//!
//! Each class is a static table of members. Bootstrap turns every table into
//! one prototype object (inheriting from its base class's prototype) and one
//! constructor function, so instances pick members up through the ordinary
//! prototype chain.

pub mod array;
pub mod boolean;
pub mod function;
pub mod global;
pub mod number;
pub mod object;
pub mod stage;
pub mod string;

use crate::error::VmError;
use crate::function::NativeFn;
use crate::gc::ObjectId;
use crate::object::{ObjectClass, Property, ScriptObject};
use crate::value::Value;

use super::Vm;

/// One entry of a class's member table
pub enum ClassMember {
    Method {
        name: &'static str,
        func: NativeFn,
    },
    Accessor {
        name: &'static str,
        get: Option<NativeFn>,
        set: Option<NativeFn>,
    },
    /// Read-only, non-enumerable data member
    Constant {
        name: &'static str,
        value: ConstantValue,
    },
}

/// Value of a [`ClassMember::Constant`]
#[derive(Debug, Clone, Copy)]
pub enum ConstantValue {
    Integer(i32),
    Float(f64),
}

impl ConstantValue {
    fn to_value(self) -> Value {
        match self {
            ConstantValue::Integer(n) => Value::Integer(n),
            ConstantValue::Float(n) => Value::Float(n),
        }
    }
}

/// Static description of a built-in class
pub struct ClassDefinition {
    pub name: &'static str,
    /// Class whose prototype this class's prototype inherits from
    pub base: Option<&'static str>,
    pub constructor: NativeFn,
    /// Installed on the prototype
    pub properties: &'static [ClassMember],
    /// Installed on the constructor
    pub static_properties: &'static [ClassMember],
}

/// Classes in bootstrap order; a base always precedes its subclasses.
const CLASSES: &[&ClassDefinition] = &[
    &object::OBJECT_CLASS,
    &function::FUNCTION_CLASS,
    &boolean::BOOLEAN_CLASS,
    &number::NUMBER_CLASS,
    &string::STRING_CLASS,
    &array::ARRAY_CLASS,
    &stage::STAGE_OBJECT_CLASS,
    &stage::TEXT_FIELD_CLASS,
    &stage::MOVIE_CLIP_CLASS,
];

/// Build every prototype and constructor and populate the global object.
pub(crate) fn bootstrap(vm: &mut Vm) -> Result<(), VmError> {
    // Object.prototype and Function.prototype must exist before any function
    // object is created.
    let object_proto = vm.alloc_object(ScriptObject::default());
    let function_proto = vm.alloc_object(ScriptObject::new(Some(object_proto), ObjectClass::Ordinary));
    vm.prototypes.insert(vm.strings.get_or_insert("Object"), object_proto);
    vm.prototypes.insert(vm.strings.get_or_insert("Function"), function_proto);

    for class in CLASSES {
        let proto = match vm.prototype(class.name) {
            Some(existing) => existing,
            None => {
                let base = class.base.and_then(|b| vm.prototype(b)).or(Some(object_proto));
                vm.create_object_with_prototype(base)
            }
        };
        let ctor = vm.create_native_function(class.name, class.constructor);
        link_constructor(vm, ctor, proto)?;
        install_members(vm, proto, class.properties)?;
        install_members(vm, ctor, class.static_properties)?;
        vm.register_class(class.name, proto, ctor);
        install(vm, vm.global, class.name, Property::hidden(Value::Object(ctor)))?;
        log::debug!("bootstrap: class {}", class.name);
    }

    let global = vm.global;
    let extern_object = vm.extern_object;
    for id in [global, extern_object] {
        vm.object_mut(id)?.prototype = Some(object_proto);
    }
    install_members(vm, global, global::GLOBAL_FUNCTIONS)
}

/// `ctor.prototype = proto` and `proto.constructor = ctor`
fn link_constructor(vm: &mut Vm, ctor: ObjectId, proto: ObjectId) -> Result<(), VmError> {
    install(vm, ctor, "prototype", Property::hidden(Value::Object(proto)))?;
    install(vm, proto, "constructor", Property::hidden(Value::Object(ctor)))
}

/// Define a builtin member; a refused definition is an error.
fn install(vm: &mut Vm, target: ObjectId, name: &str, property: Property) -> Result<(), VmError> {
    if vm.define_property(target, name, property)? {
        Ok(())
    } else {
        Err(VmError::unsupported(format!(
            "builtin member '{}' refused by a non-configurable property",
            name
        )))
    }
}

fn install_members(vm: &mut Vm, target: ObjectId, members: &[ClassMember]) -> Result<(), VmError> {
    for member in members {
        let (name, property) = match member {
            ClassMember::Method { name, func } => {
                let function = vm.create_native_function(name, *func);
                (*name, Property::method(function))
            }
            ClassMember::Accessor { name, get, set } => {
                let getter = get.map(|f| vm.create_native_function(name, f));
                let setter = set.map(|f| vm.create_native_function(name, f));
                (
                    *name,
                    Property::Accessor {
                        getter,
                        setter,
                        enumerable: false,
                        configurable: false,
                    },
                )
            }
            ClassMember::Constant { name, value } => (*name, Property::with_attributes(value.to_value(), false, false, false)),
        };
        install(vm, target, name, property)?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers shared by the builtin implementations
// ═══════════════════════════════════════════════════════════════════════════

/// Argument `index`, or `undefined` when absent
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// True when `this` is the fresh object `new` allocated for `class`:
/// an ordinary object whose prototype is the class prototype.
pub(crate) fn is_construct_call(vm: &Vm, this: &Value, class: &str) -> bool {
    let Value::Object(id) = this else {
        return false;
    };
    let Ok(obj) = vm.object(*id) else {
        return false;
    };
    matches!(obj.class, ObjectClass::Ordinary)
        && obj.prototype.is_some()
        && obj.prototype == vm.prototype(class)
}

/// Replace the payload of a freshly constructed instance
pub(crate) fn set_class(vm: &mut Vm, this: &Value, class: ObjectClass) -> Result<(), VmError> {
    if let Value::Object(id) = this {
        vm.object_mut(*id)?.class = class;
    }
    Ok(())
}
