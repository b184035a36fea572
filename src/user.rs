// src/user.rs

use crate::backend::Collaborator;
use crate::error::ModelError;
use crate::model;
use crate::query::QueryPlan;
use crate::record::{GenericRecord, ParseRecord};
use crate::schema::Schema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

/// Identity keys with dedicated accessors. These always dispatch ahead of
/// declared fields and never touch the generic key-value map; the backend
/// enforces their semantics (uniqueness, hashing) server-side.
pub const RESERVED_KEYS: [&str; 3] = ["username", "password", "email"];

/// The class name Parse reserves for users.
pub const USER_CLASS_NAME: &str = "_User";

/// A Parse user: dedicated identity storage layered in front of the same
/// generic record mechanism every other class uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "emailVerified", skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(flatten)]
    pub record: ParseRecord,
}

impl UserRecord {
    pub fn new() -> Self {
        UserRecord {
            username: None,
            password: None,
            email: None,
            email_verified: None,
            session_token: None,
            record: ParseRecord::new(USER_CLASS_NAME),
        }
    }

    /// Dedicated read path for the reserved identity keys; `None` for any
    /// other name.
    pub fn identity_get(&self, key: &str) -> Option<Value> {
        let slot = match key {
            "username" => &self.username,
            "password" => &self.password,
            "email" => &self.email,
            _ => return None,
        };
        Some(
            slot.as_deref()
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null),
        )
    }

    /// Dedicated write path for the reserved identity keys. Identity values
    /// are strings; `Null` clears.
    pub fn identity_set(&mut self, key: &str, value: Value) -> Result<(), ModelError> {
        let parsed = match value {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => {
                return Err(ModelError::InvalidInput(format!(
                    "identity key `{}` takes a string, got {}",
                    key, other
                )))
            }
        };
        match key {
            "username" => self.username = parsed,
            "password" => self.password = parsed,
            "email" => self.email = parsed,
            other => {
                return Err(ModelError::InvalidInput(format!(
                    "`{}` is not a reserved identity key",
                    other
                )))
            }
        }
        Ok(())
    }
}

impl Default for UserRecord {
    fn default() -> Self {
        UserRecord::new()
    }
}

impl GenericRecord for UserRecord {
    fn with_class(class_name: &str) -> Self {
        let mut user = UserRecord::new();
        user.record.class_name = class_name.to_string();
        user
    }

    fn class_name(&self) -> &str {
        self.record.class_name()
    }

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.record.get_value(key)
    }

    fn set_value(&mut self, key: &str, value: Value) {
        self.record.set_value(key, value);
    }

    fn native_get(&self, name: &str) -> Option<Value> {
        match name {
            "sessionToken" => Some(
                self.session_token
                    .as_deref()
                    .map(|t| Value::String(t.to_string()))
                    .unwrap_or(Value::Null),
            ),
            "emailVerified" => Some(
                self.email_verified
                    .map(Value::Bool)
                    .unwrap_or(Value::Null),
            ),
            _ => self.record.native_get(name),
        }
    }

    fn native_call(&mut self, operation: &str, args: &[Value]) -> Option<Result<Value, ModelError>> {
        self.record.native_call(operation, args)
    }
}

/// A user model type: a declared [`Schema`] wrapped around one
/// [`UserRecord`]. Dispatch and identity operations are provided by
/// [`UserModelExt`].
pub trait UserModel: Sized + Send + 'static {
    fn schema() -> &'static Schema;

    fn from_user(user: UserRecord) -> Self;

    fn user(&self) -> &UserRecord;

    fn user_mut(&mut self) -> &mut UserRecord;

    fn class_name() -> &'static str {
        Self::schema().class_name()
    }
}

/// Provided behavior for every [`UserModel`]: the three-stage dispatcher
/// (reserved identity keys → declared fields → native passthrough) and the
/// identity operations delegated to a [`Collaborator`].
#[async_trait]
pub trait UserModelExt: UserModel {
    /// Allocates a fresh, empty user record.
    fn create() -> Self {
        Self::from_user(UserRecord::with_class(Self::class_name()))
    }

    /// Reads attribute `name`; reserved identity keys route to the
    /// dedicated accessors ahead of any declared field.
    fn read(&self, name: &str) -> Result<Value, ModelError> {
        if let Some(value) = self.user().identity_get(name) {
            return Ok(value);
        }
        model::read_attribute(Self::schema(), self.user(), name)
    }

    /// Writes attribute `name`; reserved identity keys route to the
    /// dedicated accessors ahead of any declared field.
    fn write<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), ModelError> {
        let value = serde_json::to_value(value)?;
        if RESERVED_KEYS.contains(&name) {
            return self.user_mut().identity_set(name, value);
        }
        model::write_attribute(Self::schema(), self.user_mut(), name, value)
    }

    /// Dynamic dispatch with the reserved identity stage in front.
    fn invoke(&mut self, operation: &str, args: &[Value]) -> Result<Value, ModelError> {
        if args.is_empty() {
            if let Some(value) = self.user().identity_get(operation) {
                return Ok(value);
            }
        }
        if let Some(base) = operation.strip_suffix('=') {
            if RESERVED_KEYS.contains(&base) {
                self.user_mut()
                    .identity_set(base, args.first().cloned().unwrap_or(Value::Null))?;
                return Ok(Value::Null);
            }
        }
        model::invoke_operation(Self::schema(), self.user_mut(), operation, args)
    }

    fn object_id(&self) -> Option<&str> {
        self.user().record.object_id.as_deref()
    }

    fn session_token(&self) -> Option<&str> {
        self.user().session_token.as_deref()
    }

    /// Wraps the currently authenticated user, or `None` when no session is
    /// active.
    async fn current<C: Collaborator>(backend: &C) -> Result<Option<Self>, ModelError> {
        let user = backend.current_user().await?;
        Ok(user.map(Self::adopt))
    }

    /// Every record of the user type, wrapped.
    async fn all<C: Collaborator>(backend: &C) -> Result<Vec<Self>, ModelError> {
        let plan = QueryPlan::new(Self::class_name());
        let users = backend.find_users(&plan).await?;
        Ok(users.into_iter().map(Self::adopt).collect())
    }

    /// Background form of [`all`](Self::all); `callback` is invoked exactly
    /// once with the mapped result.
    fn all_in_background<C, F>(backend: &C, callback: F) -> JoinHandle<()>
    where
        C: Collaborator + Clone + 'static,
        F: FnOnce(Result<Vec<Self>, ModelError>) + Send + 'static,
    {
        let backend = backend.clone();
        tokio::spawn(async move {
            let plan = QueryPlan::new(Self::class_name());
            let result = backend
                .find_users(&plan)
                .await
                .map(|users| users.into_iter().map(Self::adopt).collect());
            callback(result);
        })
    }

    /// Registers this user with the backend, adopting the assigned
    /// identity, timestamp, and session token.
    async fn signup<C: Collaborator>(&mut self, backend: &C) -> Result<(), ModelError> {
        let response = backend.signup(self.user()).await?;
        let user = self.user_mut();
        user.record.object_id = Some(response.object_id);
        user.record.created_at = Some(response.created_at);
        user.session_token = Some(response.session_token);
        Ok(())
    }

    /// Authenticates and wraps the logged-in user.
    async fn login<C: Collaborator>(
        backend: &C,
        username: &str,
        password: &str,
    ) -> Result<Self, ModelError> {
        let user = backend.login(username, password).await?;
        Ok(Self::adopt(user))
    }

    #[doc(hidden)]
    fn adopt(mut user: UserRecord) -> Self {
        user.record.class_name = Self::class_name().to_string();
        Self::from_user(user)
    }
}

impl<U: UserModel> UserModelExt for U {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::OnceLock;

    struct Account {
        user: UserRecord,
    }

    impl UserModel for Account {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder(USER_CLASS_NAME)
                    .fields(["bio", "karma"])
                    .build()
            })
        }

        fn from_user(user: UserRecord) -> Self {
            Account { user }
        }

        fn user(&self) -> &UserRecord {
            &self.user
        }

        fn user_mut(&mut self) -> &mut UserRecord {
            &mut self.user
        }
    }

    #[test]
    fn reserved_keys_route_to_identity_accessors() {
        let mut account = Account::create();
        account.write("username", "alice").unwrap();
        assert_eq!(account.user().username.as_deref(), Some("alice"));
        // Nothing leaked into the generic map.
        assert!(!account.user().record.has("username"));
        assert_eq!(account.read("username").unwrap(), json!("alice"));
    }

    #[test]
    fn reserved_read_wins_over_generic_map_entry() {
        let mut account = Account::create();
        account.user_mut().username = Some("alice".to_string());
        // Even a poisoned map entry under the same name is shadowed.
        account.user_mut().record.set("username", "impostor");
        assert_eq!(account.read("username").unwrap(), json!("alice"));
    }

    #[test]
    fn identity_values_must_be_strings() {
        let mut account = Account::create();
        let err = account.write("email", 42).unwrap_err();
        assert!(matches!(err, ModelError::InvalidInput(_)));
    }

    #[test]
    fn declared_fields_use_the_generic_path() {
        let mut account = Account::create();
        account.write("bio", "hello").unwrap();
        assert_eq!(account.user().record.get::<String>("bio").as_deref(), Some("hello"));
        assert_eq!(account.read("bio").unwrap(), json!("hello"));
        assert!(account.read("missing").is_err());
    }

    #[test]
    fn session_token_reads_through_native_surface() {
        let mut account = Account::create();
        assert_eq!(account.read("sessionToken").unwrap(), Value::Null);
        account.user_mut().session_token = Some("r:abc".to_string());
        assert_eq!(account.read("sessionToken").unwrap(), json!("r:abc"));
    }

    #[test]
    fn invoke_handles_reserved_setter_form() {
        let mut account = Account::create();
        account.invoke("email=", &[json!("a@b.c")]).unwrap();
        assert_eq!(account.user().email.as_deref(), Some("a@b.c"));
        assert_eq!(account.invoke("email", &[]).unwrap(), json!("a@b.c"));
    }

    #[test]
    fn user_wire_shape_flattens_identity_and_fields() {
        let parsed: UserRecord = serde_json::from_value(json!({
            "objectId": "u1",
            "username": "alice",
            "sessionToken": "r:abc",
            "bio": "hello"
        }))
        .unwrap();
        assert_eq!(parsed.username.as_deref(), Some("alice"));
        assert_eq!(parsed.session_token.as_deref(), Some("r:abc"));
        assert_eq!(parsed.record.object_id.as_deref(), Some("u1"));
        assert_eq!(parsed.record.fields["bio"], json!("hello"));
    }
}
