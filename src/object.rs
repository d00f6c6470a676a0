//! Script objects and their property slots.

use std::fmt;

use crate::function::Function;
use crate::gc::{ObjectId, Reset, Traceable};
use crate::platform::DisplayHandle;
use crate::prelude::{IndexMap, index_map_new};
use crate::value::{AsString, Value};

/// A named slot on an object.
#[derive(Debug, Clone)]
pub enum Property {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    /// A data property with default attributes (all true)
    pub fn data(value: Value) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn with_attributes(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    /// Builtin method slot: writable, hidden from enumeration, permanent
    pub fn method(function: ObjectId) -> Self {
        Property::Data {
            value: Value::Object(function),
            writable: true,
            enumerable: false,
            configurable: false,
        }
    }

    /// Hidden internal link such as `prototype` or `constructor`
    pub fn hidden(value: Value) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    pub fn accessor(getter: Option<ObjectId>, setter: Option<ObjectId>) -> Self {
        Property::Accessor {
            getter,
            setter,
            enumerable: false,
            configurable: true,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Property::Accessor { .. })
    }

    pub fn enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }

    /// Stored value of a data property
    pub fn value(&self) -> Option<&Value> {
        match self {
            Property::Data { value, .. } => Some(value),
            Property::Accessor { .. } => None,
        }
    }

    fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        match self {
            Property::Data {
                value: Value::Object(id),
                ..
            } => visitor(*id),
            Property::Data { .. } => {}
            Property::Accessor { getter, setter, .. } => {
                if let Some(id) = getter {
                    visitor(*id);
                }
                if let Some(id) = setter {
                    visitor(*id);
                }
            }
        }
    }
}

/// Which display prototype a stage wrapper uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    StageObject,
    TextField,
    MovieClip,
}

impl StageKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            StageKind::StageObject => "StageObject",
            StageKind::TextField => "TextField",
            StageKind::MovieClip => "MovieClip",
        }
    }
}

/// Link from a script wrapper to the display item it bridges
#[derive(Clone)]
pub struct StageBinding {
    pub item: DisplayHandle,
    pub kind: StageKind,
}

impl fmt::Debug for StageBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .item
            .try_borrow()
            .map(|item| item.name().to_string())
            .unwrap_or_default();
        write!(f, "StageBinding({:?}, {})", self.kind, name)
    }
}

/// Native payload of an object
#[derive(Debug, Clone, Default)]
pub enum ObjectClass {
    #[default]
    Ordinary,
    Function(Function),
    String(AsString),
    Boolean(bool),
    Number(Value),
    Array(Vec<Value>),
    Stage(StageBinding),
}

impl ObjectClass {
    /// Class name used for display and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ObjectClass::Ordinary => "Object",
            ObjectClass::Function(_) => "Function",
            ObjectClass::String(_) => "String",
            ObjectClass::Boolean(_) => "Boolean",
            ObjectClass::Number(_) => "Number",
            ObjectClass::Array(_) => "Array",
            ObjectClass::Stage(binding) => binding.kind.class_name(),
        }
    }
}

/// A runtime object: ordered own properties, a prototype link and a native payload.
#[derive(Debug)]
pub struct ScriptObject {
    pub properties: IndexMap<AsString, Property>,
    pub prototype: Option<ObjectId>,
    /// Function this object was constructed by
    pub constructor: Option<ObjectId>,
    pub class: ObjectClass,
}

impl ScriptObject {
    pub fn new(prototype: Option<ObjectId>, class: ObjectClass) -> Self {
        Self {
            properties: index_map_new(),
            prototype,
            constructor: None,
            class,
        }
    }

    pub fn get_own(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.class, ObjectClass::Function(_))
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.class {
            ObjectClass::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match &self.class {
            ObjectClass::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.class {
            ObjectClass::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_stage(&self) -> Option<&StageBinding> {
        match &self.class {
            ObjectClass::Stage(binding) => Some(binding),
            _ => None,
        }
    }
}

impl Default for ScriptObject {
    fn default() -> Self {
        Self::new(None, ObjectClass::Ordinary)
    }
}

impl Reset for ScriptObject {
    fn reset(&mut self) {
        self.properties.clear();
        self.prototype = None;
        self.constructor = None;
        // Drops closures and display handles held by the payload
        self.class = ObjectClass::Ordinary;
    }
}

impl Traceable for ScriptObject {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        for property in self.properties.values() {
            property.trace(visitor);
        }
        if let Some(id) = self.prototype {
            visitor(id);
        }
        if let Some(id) = self.constructor {
            visitor(id);
        }
        match &self.class {
            ObjectClass::Function(function) => function.trace(visitor),
            ObjectClass::Number(Value::Object(id)) => visitor(*id),
            ObjectClass::Array(elements) => {
                for value in elements {
                    if let Value::Object(id) = value {
                        visitor(*id);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Largest length an array may reach through index writes or `length`
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Parse a member name as an array index
pub fn array_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
