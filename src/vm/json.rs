//! Conversion between host JSON documents and script values.

use serde_json::{Map, Number, Value as JsonValue};

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::object::ObjectClass;
use crate::prelude::FxHashSet;
use crate::value::Value;

use super::Vm;

impl Vm {
    /// Build script values from JSON: objects become plain objects, arrays
    /// become `Array` instances, integral numbers that fit become integers.
    pub fn value_from_json(&mut self, json: &JsonValue) -> Result<Value, VmError> {
        Ok(match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => number_from_json(n),
            JsonValue::String(s) => Value::from(s.as_str()),
            JsonValue::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.value_from_json(item)?);
                }
                Value::Object(self.create_array(elements))
            }
            JsonValue::Object(map) => {
                let object = self.create_object();
                for (key, item) in map {
                    let value = self.value_from_json(item)?;
                    self.set_member(object, key, value)?;
                }
                Value::Object(object)
            }
        })
    }

    /// Convert a script value to JSON. Functions, stage objects and cyclic
    /// graphs cannot be represented.
    pub fn value_to_json(&mut self, value: &Value) -> Result<JsonValue, VmError> {
        let mut visiting = FxHashSet::default();
        self.value_to_json_inner(value, &mut visiting)
    }

    fn value_to_json_inner(
        &mut self,
        value: &Value,
        visiting: &mut FxHashSet<ObjectId>,
    ) -> Result<JsonValue, VmError> {
        let id = match value {
            Value::Undefined | Value::Null => return Ok(JsonValue::Null),
            Value::Boolean(b) => return Ok(JsonValue::Bool(*b)),
            Value::Integer(n) => return Ok(JsonValue::from(*n)),
            Value::Float(n) => return Ok(Number::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number)),
            Value::String(s) => return Ok(JsonValue::String(s.to_string())),
            Value::Object(id) => *id,
        };

        if !visiting.insert(id) {
            return Err(VmError::unsupported("cannot convert a cyclic structure to JSON"));
        }
        let result = match &self.object(id)?.class {
            ObjectClass::Function(_) | ObjectClass::Stage(_) => Err(VmError::unsupported(format!(
                "cannot convert {} to JSON",
                self.object(id)?.class.name()
            ))),
            ObjectClass::String(s) => Ok(JsonValue::String(s.to_string())),
            ObjectClass::Boolean(b) => Ok(JsonValue::Bool(*b)),
            ObjectClass::Number(n) => {
                let n = n.clone();
                self.value_to_json_inner(&n, visiting)
            }
            ObjectClass::Array(elements) => {
                let elements = elements.clone();
                let mut items = Vec::with_capacity(elements.len());
                for element in &elements {
                    items.push(self.value_to_json_inner(element, visiting)?);
                }
                Ok(JsonValue::Array(items))
            }
            ObjectClass::Ordinary => {
                let mut map = Map::new();
                let names: Vec<_> = self
                    .object(id)?
                    .properties
                    .iter()
                    .filter(|(_, p)| p.enumerable())
                    .map(|(name, _)| name.clone())
                    .collect();
                for name in names {
                    let member = self.get_member(id, name.as_str())?;
                    if self.is_callable(&member) {
                        continue;
                    }
                    map.insert(name.to_string(), self.value_to_json_inner(&member, visiting)?);
                }
                Ok(JsonValue::Object(map))
            }
        };
        visiting.remove(&id);
        result
    }
}

fn number_from_json(n: &Number) -> Value {
    match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
        Some(i) => Value::Integer(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}
