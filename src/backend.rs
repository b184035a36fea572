// src/backend.rs

use crate::error::ModelError;
use crate::query::QueryPlan;
use crate::record::ParseRecord;
use crate::types::ParseDate;
use crate::user::UserRecord;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Server response to creating an object.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateObjectResponse {
    pub object_id: String,
    pub created_at: ParseDate,
}

/// Server response to updating an object.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObjectResponse {
    pub updated_at: ParseDate,
}

/// Server response to signing up a user.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub object_id: String,
    pub session_token: String,
    pub created_at: ParseDate,
}

/// The collaborator's service capability set, as the adapters see it.
///
/// Everything network- or identity-shaped is delegated through this trait:
/// query execution, object persistence, user identity, and cloud functions.
/// [`Parse`](crate::Parse) is the bundled REST implementation; tests stand in
/// an in-memory double. The adapters never add retries, timeouts, or ordering
/// on top of what an implementation provides.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Executes `plan` and returns the raw matching records, in the order
    /// the backend reports them.
    async fn find(&self, plan: &QueryPlan) -> Result<Vec<ParseRecord>, ModelError>;

    /// First record matching `plan`, if any.
    async fn first(&self, plan: &QueryPlan) -> Result<Option<ParseRecord>, ModelError> {
        let mut limited = plan.clone();
        limited.limit(1);
        Ok(self.find(&limited).await?.into_iter().next())
    }

    /// Fetches one record by identifier; `ObjectNotFound` when absent.
    async fn get(&self, class_name: &str, object_id: &str) -> Result<ParseRecord, ModelError>;

    /// Number of records matching `plan`.
    async fn count(&self, plan: &QueryPlan) -> Result<u64, ModelError>;

    async fn create(&self, record: &ParseRecord) -> Result<CreateObjectResponse, ModelError>;

    async fn update(&self, record: &ParseRecord) -> Result<UpdateObjectResponse, ModelError>;

    async fn delete(&self, class_name: &str, object_id: &str) -> Result<(), ModelError>;

    /// Registers a new user; the backend enforces identity semantics
    /// (username/email uniqueness) that the generic path does not.
    async fn signup(&self, user: &UserRecord) -> Result<SignupResponse, ModelError>;

    async fn login(&self, username: &str, password: &str) -> Result<UserRecord, ModelError>;

    /// The currently authenticated user record, or `None` when no session
    /// is active.
    async fn current_user(&self) -> Result<Option<UserRecord>, ModelError>;

    /// Executes `plan` against the user class.
    async fn find_users(&self, plan: &QueryPlan) -> Result<Vec<UserRecord>, ModelError>;

    /// Invokes a cloud function by name with JSON parameters, returning the
    /// raw unwrapped result.
    async fn call_function(&self, function_name: &str, params: &Value)
        -> Result<Value, ModelError>;
}
