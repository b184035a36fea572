// src/record.rs

use crate::error::ModelError;
use crate::types::ParseDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// The narrow interface the dispatch layer needs from a generic key-value
/// record: tagged creation, keyed get/set, and an extension point for the
/// record's wider native surface.
///
/// [`ParseRecord`] is the collaborator-shaped implementation; the trait exists
/// so dispatch stays independent of it (user records layer identity storage on
/// top of the same mechanism through this trait).
pub trait GenericRecord {
    fn with_class(class_name: &str) -> Self
    where
        Self: Sized;

    fn class_name(&self) -> &str;

    /// Raw value stored under `key`, if any.
    fn get_value(&self, key: &str) -> Option<&Value>;

    /// Stores `value` under `key`. Always succeeds; no schema type checking.
    fn set_value(&mut self, key: &str, value: Value);

    /// Native read surface beyond the key-value store. `None` means the
    /// record does not support `name`, which the dispatcher turns into an
    /// `UnknownOperation` failure.
    fn native_get(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Native operation surface. `None` means unsupported; `Some(Err(..))`
    /// means the operation exists but rejected its arguments.
    fn native_call(&mut self, operation: &str, args: &[Value]) -> Option<Result<Value, ModelError>> {
        let _ = (operation, args);
        None
    }
}

/// A schemaless Parse object: server-owned identity and timestamps plus a
/// dynamic field map, (de)serializable in the REST wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRecord {
    #[serde(skip_serializing_if = "Option::is_none", rename = "objectId")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "createdAt")]
    pub created_at: Option<ParseDate>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "updatedAt")]
    pub updated_at: Option<ParseDate>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
    #[serde(skip_serializing, default)]
    // Not on the wire; set from context (query class, model class name).
    pub class_name: String,
}

impl ParseRecord {
    pub fn new(class_name: &str) -> Self {
        ParseRecord {
            class_name: class_name.to_string(),
            fields: HashMap::new(),
            object_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn set<T: Serialize>(&mut self, field_name: &str, value: T) {
        self.fields
            .insert(field_name.to_string(), serde_json::to_value(value).unwrap());
    }

    pub fn get<T: DeserializeOwned>(&self, field_name: &str) -> Option<T> {
        self.fields
            .get(field_name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn has(&self, field_name: &str) -> bool {
        self.fields.contains_key(field_name)
    }

    pub fn unset(&mut self, field_name: &str) -> Option<Value> {
        self.fields.remove(field_name)
    }

    pub fn increment(&mut self, field_name: &str, amount: i64) {
        let op = json!({
            "__op": "Increment",
            "amount": amount
        });
        self.fields.insert(field_name.to_string(), op);
    }

    pub fn decrement(&mut self, field_name: &str, amount: i64) {
        self.increment(field_name, -amount);
    }

    pub fn add_to_array<T: Serialize>(&mut self, field_name: &str, items: &[T]) {
        let op = json!({
            "__op": "Add",
            "objects": items
        });
        self.fields.insert(field_name.to_string(), op);
    }

    pub fn add_unique_to_array<T: Serialize>(&mut self, field_name: &str, items: &[T]) {
        let op = json!({
            "__op": "AddUnique",
            "objects": items
        });
        self.fields.insert(field_name.to_string(), op);
    }

    pub fn remove_from_array<T: Serialize>(&mut self, field_name: &str, items: &[T]) {
        let op = json!({
            "__op": "Remove",
            "objects": items
        });
        self.fields.insert(field_name.to_string(), op);
    }

    fn key_arg<'a>(args: &'a [Value], operation: &str) -> Result<&'a str, ModelError> {
        args.first().and_then(Value::as_str).ok_or_else(|| {
            ModelError::InvalidInput(format!(
                "`{}` expects a field name as its first argument",
                operation
            ))
        })
    }
}

impl GenericRecord for ParseRecord {
    fn with_class(class_name: &str) -> Self {
        ParseRecord::new(class_name)
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn set_value(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    fn native_get(&self, name: &str) -> Option<Value> {
        match name {
            "objectId" => Some(
                self.object_id
                    .as_deref()
                    .map(|id| Value::String(id.to_string()))
                    .unwrap_or(Value::Null),
            ),
            "createdAt" => Some(
                self.created_at
                    .as_ref()
                    .map(|date| Value::String(date.iso.clone()))
                    .unwrap_or(Value::Null),
            ),
            "updatedAt" => Some(
                self.updated_at
                    .as_ref()
                    .map(|date| Value::String(date.iso.clone()))
                    .unwrap_or(Value::Null),
            ),
            "className" => Some(Value::String(self.class_name.clone())),
            _ => None,
        }
    }

    fn native_call(&mut self, operation: &str, args: &[Value]) -> Option<Result<Value, ModelError>> {
        let result = match operation {
            "unset" => Self::key_arg(args, operation)
                .map(|key| self.unset(key).unwrap_or(Value::Null)),
            "has" => Self::key_arg(args, operation).map(|key| Value::Bool(self.has(key))),
            "increment" | "decrement" => Self::key_arg(args, operation).map(|key| {
                let key = key.to_string();
                let amount = args.get(1).and_then(Value::as_i64).unwrap_or(1);
                if operation == "increment" {
                    self.increment(&key, amount);
                } else {
                    self.decrement(&key, amount);
                }
                Value::Null
            }),
            "addToArray" | "addUniqueToArray" | "removeFromArray" => {
                Self::key_arg(args, operation).map(|key| {
                    let key = key.to_string();
                    let items: Vec<Value> = args
                        .get(1)
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    match operation {
                        "addToArray" => self.add_to_array(&key, &items),
                        "addUniqueToArray" => self.add_unique_to_array(&key, &items),
                        _ => self.remove_from_array(&key, &items),
                    }
                    Value::Null
                })
            }
            _ => return None,
        };
        Some(result)
    }
}
