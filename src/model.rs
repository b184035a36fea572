// src/model.rs

use crate::backend::Collaborator;
use crate::error::ModelError;
use crate::query::ModelQuery;
use crate::record::{GenericRecord, ParseRecord};
use crate::schema::Schema;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A model type: a declared [`Schema`] wrapped around exactly one
/// [`ParseRecord`].
///
/// Implementors supply the schema (built once, typically behind a `OnceLock`)
/// and the record plumbing; everything else — construction modes, attribute
/// dispatch, persistence — is provided by [`ModelExt`].
///
/// ```
/// use parse_model::{Model, ModelExt, ParseRecord, Schema};
/// use std::sync::OnceLock;
///
/// struct Post {
///     record: ParseRecord,
/// }
///
/// impl Model for Post {
///     fn schema() -> &'static Schema {
///         static SCHEMA: OnceLock<Schema> = OnceLock::new();
///         SCHEMA.get_or_init(|| Schema::builder("Post").fields(["title", "body"]).build())
///     }
///
///     fn from_record(record: ParseRecord) -> Self {
///         Post { record }
///     }
///
///     fn record(&self) -> &ParseRecord {
///         &self.record
///     }
///
///     fn record_mut(&mut self) -> &mut ParseRecord {
///         &mut self.record
///     }
/// }
///
/// let mut post = Post::create();
/// post.write("title", "Hello").unwrap();
/// assert_eq!(post.read("title").unwrap(), "Hello");
/// assert!(post.read("publishedAt").is_err());
/// ```
pub trait Model: Sized + Send + 'static {
    fn schema() -> &'static Schema;

    /// Adopts an existing record directly; no copy. Records coming off a
    /// query are wrapped through this.
    fn from_record(record: ParseRecord) -> Self;

    fn record(&self) -> &ParseRecord;

    fn record_mut(&mut self) -> &mut ParseRecord;

    fn class_name() -> &'static str {
        Self::schema().class_name()
    }
}

/// Two-stage attribute read: declared field, then the record's native
/// surface, then failure.
pub(crate) fn read_attribute<R: GenericRecord>(
    schema: &Schema,
    record: &R,
    name: &str,
) -> Result<Value, ModelError> {
    if schema.declares(name) {
        return Ok(record.get_value(name).cloned().unwrap_or(Value::Null));
    }
    record
        .native_get(name)
        .ok_or_else(|| ModelError::unknown_operation(schema.class_name(), name))
}

/// Two-stage attribute write. Writes to declared fields always succeed; the
/// failure operation carries a trailing `=` to mark the setter form.
pub(crate) fn write_attribute<R: GenericRecord>(
    schema: &Schema,
    record: &mut R,
    name: &str,
    value: Value,
) -> Result<(), ModelError> {
    if schema.declares(name) {
        record.set_value(name, value);
        return Ok(());
    }
    Err(ModelError::unknown_operation(
        schema.class_name(),
        format!("{}=", name),
    ))
}

/// Full dynamic dispatch: declared getter/setter forms first, then the
/// record's native reads and operations, then failure.
pub(crate) fn invoke_operation<R: GenericRecord>(
    schema: &Schema,
    record: &mut R,
    operation: &str,
    args: &[Value],
) -> Result<Value, ModelError> {
    if args.is_empty() && schema.declares(operation) {
        return Ok(record.get_value(operation).cloned().unwrap_or(Value::Null));
    }
    if let Some(base) = operation.strip_suffix('=') {
        if schema.declares(base) {
            record.set_value(base, args.first().cloned().unwrap_or(Value::Null));
            return Ok(Value::Null);
        }
    }
    if args.is_empty() {
        if let Some(value) = record.native_get(operation) {
            return Ok(value);
        }
    }
    match record.native_call(operation, args) {
        Some(result) => result,
        None => Err(ModelError::unknown_operation(schema.class_name(), operation)),
    }
}

/// Provided behavior for every [`Model`]: construction modes, the attribute
/// dispatcher, and persistence delegation to a [`Collaborator`].
#[async_trait]
pub trait ModelExt: Model {
    /// Allocates a fresh, empty record tagged with the model's class name.
    fn create() -> Self {
        Self::from_record(ParseRecord::new(Self::class_name()))
    }

    /// Allocates a fresh record and writes every entry whose key is a
    /// declared field; entries with undeclared keys are silently dropped.
    fn with_fields<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let schema = Self::schema();
        let mut record = ParseRecord::new(schema.class_name());
        for (key, value) in values {
            if schema.declares(&key) {
                record.set_value(&key, value);
            } else {
                log::debug!(
                    "dropping undeclared key `{}` while building `{}`",
                    key,
                    schema.class_name()
                );
            }
        }
        Self::from_record(record)
    }

    /// Reads attribute `name`: a declared field's stored value (`Null` when
    /// absent), or the record's native surface, or `UnknownOperation`.
    fn read(&self, name: &str) -> Result<Value, ModelError> {
        read_attribute(Self::schema(), self.record(), name)
    }

    /// Writes attribute `name`. Declared fields store through immediately
    /// with no type checking; anything else is `UnknownOperation`.
    fn write<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), ModelError> {
        let value = serde_json::to_value(value)?;
        write_attribute(Self::schema(), self.record_mut(), name, value)
    }

    /// Dynamic pass-through to the record's native operation set.
    fn invoke(&mut self, operation: &str, args: &[Value]) -> Result<Value, ModelError> {
        invoke_operation(Self::schema(), self.record_mut(), operation, args)
    }

    fn object_id(&self) -> Option<&str> {
        self.record().object_id.as_deref()
    }

    /// A query over this model's class, executing against `backend`.
    fn query<C: Collaborator>(backend: C) -> ModelQuery<Self, C> {
        ModelQuery::new(backend)
    }

    /// Persists the record: create when it has no `objectId` (adopting the
    /// server-assigned identity and `createdAt`), update otherwise.
    async fn save<C: Collaborator>(&mut self, backend: &C) -> Result<(), ModelError> {
        if self.record().object_id.is_none() {
            let response = backend.create(self.record()).await?;
            let record = self.record_mut();
            record.object_id = Some(response.object_id);
            record.created_at = Some(response.created_at);
        } else {
            let response = backend.update(self.record()).await?;
            self.record_mut().updated_at = Some(response.updated_at);
        }
        Ok(())
    }

    /// Deletes the saved record from the backend.
    async fn destroy<C: Collaborator>(self, backend: &C) -> Result<(), ModelError> {
        match self.record().object_id.as_deref() {
            Some(object_id) => backend.delete(Self::class_name(), object_id).await,
            None => Err(ModelError::InvalidInput(
                "cannot destroy an object that was never saved".to_string(),
            )),
        }
    }
}

impl<M: Model> ModelExt for M {}
