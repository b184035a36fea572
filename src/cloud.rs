// src/cloud.rs

use crate::{backend::Collaborator, error::ModelError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

/// Stateless gateway to the backend's cloud functions.
///
/// `run` blocks (awaits) and returns the deserialized result in place;
/// `run_in_background` submits the call to the collaborator's executor and
/// invokes its callback exactly once with the raw `Result`. No retry, no
/// timeout — everything is delegated.
#[derive(Debug, Clone)]
pub struct Cloud<C> {
    backend: C,
}

impl<C: Collaborator> Cloud<C> {
    pub fn new(backend: C) -> Self {
        Cloud { backend }
    }

    /// Runs a cloud function and deserializes its unwrapped `result`.
    pub async fn run<P, R>(&self, function_name: &str, params: &P) -> Result<R, ModelError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned + Send + Sync + 'static,
    {
        let params = serde_json::to_value(params)?;
        let result = self.backend.call_function(function_name, &params).await?;
        serde_json::from_value(result).map_err(|e| {
            ModelError::JsonDeserializationFailed(format!(
                "cloud function `{}` result: {}",
                function_name, e
            ))
        })
    }
}

impl<C> Cloud<C>
where
    C: Collaborator + Clone + 'static,
{
    /// Background form of [`run`](Self::run); `callback` is invoked exactly
    /// once with the raw result.
    pub fn run_in_background<F>(&self, function_name: &str, params: Value, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value, ModelError>) + Send + 'static,
    {
        let backend = self.backend.clone();
        let function_name = function_name.to_string();
        tokio::spawn(async move {
            callback(backend.call_function(&function_name, &params).await);
        })
    }
}
