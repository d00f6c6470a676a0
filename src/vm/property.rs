//! Member resolution over prototype chains.

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::object::{MAX_ARRAY_LENGTH, ObjectClass, Property, array_index};
use crate::prelude::FxHashSet;
use crate::value::{AsString, CheapClone, Value};

use super::Vm;

/// Where a member name resolved
enum Lookup {
    Value(Value),
    Accessor {
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
    },
    Missing,
}

impl Vm {
    /// Resolve `name` on the object and then along its prototype chain,
    /// without running accessors.
    fn lookup(&self, object: ObjectId, name: &str) -> Result<Lookup, VmError> {
        let mut current = Some(object);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > self.config.max_prototype_depth {
                break;
            }
            let obj = self.object(id)?;
            if let (ObjectClass::Array(elements), Some(index)) = (&obj.class, array_index(name)) {
                if let Some(element) = elements.get(index) {
                    return Ok(Lookup::Value(element.clone()));
                }
            }
            match obj.get_own(name) {
                Some(Property::Data { value, .. }) => return Ok(Lookup::Value(value.clone())),
                Some(Property::Accessor { getter, setter, .. }) => {
                    return Ok(Lookup::Accessor {
                        getter: *getter,
                        setter: *setter,
                    });
                }
                None => {}
            }
            current = obj.prototype;
            depth += 1;
        }
        Ok(Lookup::Missing)
    }

    /// GetMember: own properties first, then the prototype chain. A miss is
    /// `undefined`; an accessor runs its getter with `this` bound to `object`.
    pub fn get_member(&mut self, object: ObjectId, name: &str) -> Result<Value, VmError> {
        match self.lookup(object, name)? {
            Lookup::Value(value) => Ok(value),
            Lookup::Missing => Ok(Value::Undefined),
            Lookup::Accessor {
                getter: Some(getter),
                ..
            } => self.call(&Value::Object(getter), &Value::Object(object), &[]),
            Lookup::Accessor { getter: None, .. } => {
                Err(VmError::property_access(name, "has no getter"))
            }
        }
    }

    /// GetMember on any value; primitives are boxed first.
    pub fn get_value_member(&mut self, value: &Value, name: &str) -> Result<Value, VmError> {
        let object = self.to_object(value)?;
        self.get_member(object, name)
    }

    /// SetMember: an accessor anywhere on the chain runs its setter bound to
    /// `object`; otherwise an own data property is created or overwritten.
    /// Writes to an own read-only property are ignored.
    pub fn set_member(&mut self, object: ObjectId, name: &str, value: Value) -> Result<(), VmError> {
        if let Some(index) = array_index(name) {
            let obj = self.object_mut(object)?;
            if let Some(elements) = obj.as_array_mut() {
                if index < MAX_ARRAY_LENGTH {
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    if let Some(slot) = elements.get_mut(index) {
                        *slot = value;
                    }
                    return Ok(());
                }
            }
        }

        let own_writable = match self.object(object)?.get_own(name) {
            Some(Property::Data { writable, .. }) => Some(*writable),
            _ => None,
        };
        match own_writable {
            Some(false) => return Ok(()),
            Some(true) => {
                if let Some(Property::Data { value: slot, .. }) =
                    self.object_mut(object)?.properties.get_mut(name)
                {
                    *slot = value;
                }
                return Ok(());
            }
            None => {}
        }

        if let Lookup::Accessor { setter, .. } = self.lookup(object, name)? {
            return match setter {
                Some(setter) => {
                    self.call(&Value::Object(setter), &Value::Object(object), &[value])?;
                    Ok(())
                }
                None => Err(VmError::property_access(name, "has no setter")),
            };
        }

        let key = self.intern(name);
        self.object_mut(object)?
            .properties
            .insert(key, Property::data(value));
        Ok(())
    }

    /// HasMember: resolvable anywhere on the chain
    pub fn has_member(&self, object: ObjectId, name: &str) -> Result<bool, VmError> {
        Ok(!matches!(self.lookup(object, name)?, Lookup::Missing))
    }

    pub fn has_own_member(&self, object: ObjectId, name: &str) -> Result<bool, VmError> {
        let obj = self.object(object)?;
        if let (Some(elements), Some(index)) = (obj.as_array(), array_index(name)) {
            if index < elements.len() {
                return Ok(true);
            }
        }
        Ok(obj.properties.contains_key(name))
    }

    /// Delete an own configurable property. Returns whether anything was removed.
    pub fn delete_member(&mut self, object: ObjectId, name: &str) -> Result<bool, VmError> {
        let obj = self.object_mut(object)?;
        if let Some(index) = array_index(name) {
            if let Some(slot) = obj.as_array_mut().and_then(|e| e.get_mut(index)) {
                *slot = Value::Undefined;
                return Ok(true);
            }
        }
        let configurable = obj.properties.get(name).is_some_and(|p| p.configurable());
        if configurable {
            obj.properties.shift_remove(name);
        }
        Ok(configurable)
    }

    /// Install a property verbatim. Refused (`false`) over an own
    /// non-configurable property.
    pub fn define_property(
        &mut self,
        object: ObjectId,
        name: &str,
        property: Property,
    ) -> Result<bool, VmError> {
        if let Some(existing) = self.object(object)?.get_own(name) {
            if !existing.configurable() {
                return Ok(false);
            }
        }
        let key = self.intern(name);
        self.object_mut(object)?.properties.insert(key, property);
        Ok(true)
    }

    /// Enumerable member names: array indices, own properties, then inherited
    /// ones, each name once.
    pub fn enumerate_members(&self, object: ObjectId) -> Result<Vec<AsString>, VmError> {
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();
        let mut current = Some(object);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > self.config.max_prototype_depth {
                break;
            }
            let obj = self.object(id)?;
            if let Some(elements) = obj.as_array() {
                for index in 0..elements.len() {
                    let name = AsString::from(index.to_string());
                    if seen.insert(name.cheap_clone()) {
                        names.push(name);
                    }
                }
            }
            for (name, property) in &obj.properties {
                // Shadowing hides inherited names even when not enumerable
                if seen.insert(name.cheap_clone()) && property.enumerable() {
                    names.push(name.cheap_clone());
                }
            }
            current = obj.prototype;
            depth += 1;
        }
        Ok(names)
    }

    pub fn get_prototype(&self, object: ObjectId) -> Result<Option<ObjectId>, VmError> {
        Ok(self.object(object)?.prototype)
    }

    /// Relink an object's prototype. Links that would close a cycle are rejected.
    pub fn set_prototype(&mut self, object: ObjectId, prototype: Option<ObjectId>) -> Result<(), VmError> {
        let mut current = prototype;
        let mut depth = 0;
        while let Some(id) = current {
            if id == object {
                return Err(VmError::unsupported("cyclic prototype chain"));
            }
            if depth > self.config.max_prototype_depth {
                return Err(VmError::unsupported("prototype chain too deep"));
            }
            current = self.object(id)?.prototype;
            depth += 1;
        }
        self.object_mut(object)?.prototype = prototype;
        Ok(())
    }
}
