// src/client.rs

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::{Collaborator, CreateObjectResponse, SignupResponse, UpdateObjectResponse};
use crate::error::ModelError;
use crate::query::QueryPlan;
use crate::record::ParseRecord;
use crate::user::{UserRecord, USER_CLASS_NAME};

// Response wrappers for the REST wire shapes.
#[derive(serde::Deserialize, Debug)]
struct QueryResponse<T> {
    results: Vec<T>,
}

#[derive(serde::Deserialize, Debug)]
struct CountResponse {
    count: u64,
}

// Parse Server wraps a cloud function's return value under "result".
#[derive(serde::Deserialize, Debug)]
struct CloudFunctionResponse {
    result: Value,
}

/// The bundled [`Collaborator`] implementation: a client for Parse Server's
/// REST interface.
///
/// Handles server URL normalization, the application id / API key headers,
/// and the session token obtained from `login`/`signup`. Cloning is cheap;
/// clones share the session token, so a login through one clone is visible
/// to the others.
///
/// # Key precedence
///
/// When building request headers: an explicit session token override, then
/// the master key (when requested for the operation), then the client's
/// session token, then the JavaScript key, then the REST API key.
#[derive(Debug, Clone)]
pub struct Parse {
    pub server_url: String,
    pub(crate) app_id: String,
    pub(crate) javascript_key: Option<String>,
    pub(crate) rest_api_key: Option<String>,
    pub(crate) master_key: Option<String>,
    pub(crate) http_client: Client,
    session_token: Arc<RwLock<Option<String>>>,
}

impl Parse {
    /// Creates a new client for the Parse Server at `server_url`.
    ///
    /// The URL is normalized: a missing scheme defaults to `http://`, and a
    /// trailing `/parse` segment is stripped so the client is resilient to
    /// either form of the server URL.
    pub fn new(
        server_url: &str,
        app_id: &str,
        javascript_key: Option<&str>,
        rest_api_key: Option<&str>,
        master_key: Option<&str>,
    ) -> Result<Self, ModelError> {
        let mut temp_url_string = server_url.to_string();

        // Ensure scheme is present
        if !temp_url_string.starts_with("http://") && !temp_url_string.starts_with("https://") {
            temp_url_string = format!("http://{}", temp_url_string);
        }

        let parsed_server_url = Url::parse(&temp_url_string)?;

        if parsed_server_url.cannot_be_a_base() {
            return Err(ModelError::SdkError(format!(
                "The server_url '{}' (after ensuring scheme) resolved to '{}', which cannot be a base URL.",
                server_url, parsed_server_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "X-Parse-Application-Id",
            HeaderValue::from_str(app_id).map_err(ModelError::InvalidHeaderValue)?,
        );

        let http_client = Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(ModelError::ReqwestError)?;

        let mut final_server_url = parsed_server_url.as_str().trim_end_matches('/').to_string();

        // If the URL ends with /parse, strip it to get the true base server
        // URL; _request adds the /parse prefix back per call.
        if final_server_url.ends_with("/parse") {
            final_server_url.truncate(final_server_url.len() - "/parse".len());
        }

        log::debug!("Parse client initialized with base server_url: {}", final_server_url);

        Ok(Self {
            server_url: final_server_url,
            app_id: app_id.to_string(),
            javascript_key: javascript_key.map(|s| s.to_string()),
            rest_api_key: rest_api_key.map(|s| s.to_string()),
            master_key: master_key.map(|s| s.to_string()),
            http_client,
            session_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns the current session token, if one is set on the client.
    pub fn session_token(&self) -> Option<String> {
        match self.session_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Sets or clears the session token used for subsequent requests.
    pub fn set_session_token(&self, token: Option<String>) {
        match self.session_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Whether the client currently holds a session token.
    pub fn is_authenticated(&self) -> bool {
        self.session_token().is_some()
    }

    fn validate_class_name(class_name: &str) -> Result<(), ModelError> {
        if class_name.is_empty() {
            return Err(ModelError::InvalidInput(
                "Class name cannot be empty".to_string(),
            ));
        }
        if !class_name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            return Err(ModelError::InvalidInput(
                "Invalid class name: must start with a letter or underscore.".to_string(),
            ));
        }
        if !class_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ModelError::InvalidInput(
                "Invalid class name: can only contain letters, numbers, or underscores."
                    .to_string(),
            ));
        }
        Ok(())
    }

    // The _User class lives under /users; everything else under /classes.
    fn object_endpoint(class_name: &str, object_id: Option<&str>) -> String {
        let base = if class_name == USER_CLASS_NAME {
            "users".to_string()
        } else {
            format!("classes/{}", class_name)
        };
        match object_id {
            Some(id) => format!("{}/{}", base, id),
            None => base,
        }
    }

    fn auth_headers(
        &self,
        use_master_key: bool,
        session_token_override: Option<&str>,
    ) -> Result<HeaderMap, ModelError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Parse-Application-Id",
            HeaderValue::from_str(&self.app_id).map_err(ModelError::InvalidHeaderValue)?,
        );

        if let Some(token_override) = session_token_override {
            headers.insert(
                "X-Parse-Session-Token",
                HeaderValue::from_str(token_override).map_err(ModelError::InvalidHeaderValue)?,
            );
        } else if use_master_key {
            match &self.master_key {
                Some(master_key) => {
                    headers.insert(
                        "X-Parse-Master-Key",
                        HeaderValue::from_str(master_key)
                            .map_err(ModelError::InvalidHeaderValue)?,
                    );
                }
                None => {
                    log::warn!("Master key requested for operation but not configured.");
                    return Err(ModelError::MasterKeyRequired(
                        "Master key is required for this operation but not configured."
                            .to_string(),
                    ));
                }
            }
        } else if let Some(session_token) = self.session_token() {
            headers.insert(
                "X-Parse-Session-Token",
                HeaderValue::from_str(&session_token).map_err(ModelError::InvalidHeaderValue)?,
            );
        } else if let Some(js_key) = &self.javascript_key {
            headers.insert(
                "X-Parse-Javascript-Key",
                HeaderValue::from_str(js_key).map_err(ModelError::InvalidHeaderValue)?,
            );
        } else if let Some(rest_key) = &self.rest_api_key {
            headers.insert(
                "X-Parse-REST-API-Key",
                HeaderValue::from_str(rest_key).map_err(ModelError::InvalidHeaderValue)?,
            );
        }

        Ok(headers)
    }

    fn build_url(&self, endpoint: &str) -> Result<Url, ModelError> {
        let base_url = Url::parse(&self.server_url).map_err(|e| {
            ModelError::InvalidUrl(format!(
                "Base server URL '{}' is invalid: {}",
                self.server_url, e
            ))
        })?;

        let api_path = format!("/parse/{}", endpoint.trim_start_matches('/'));

        base_url.join(&api_path).map_err(|e| {
            ModelError::InvalidUrl(format!(
                "Failed to join base URL '{}' with API path '{}': {}",
                base_url, api_path, e
            ))
        })
    }

    // Central request method for body-carrying and parameterless calls.
    pub(crate) async fn _request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&T>,
        use_master_key: bool,
        session_token_override: Option<&str>,
    ) -> Result<R, ModelError>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send + 'static,
    {
        let full_url = self.build_url(endpoint)?;

        log::debug!(
            "Preparing request: Method={}, URL={}, UseMasterKey={}",
            method,
            full_url.as_str(),
            use_master_key
        );

        let mut request_builder = self.http_client.request(method.clone(), full_url);

        let mut headers = self.auth_headers(use_master_key, session_token_override)?;
        if method == Method::POST || method == Method::PUT {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        request_builder = request_builder.headers(headers);

        if let Some(body_data) = body {
            let body_str = serde_json::to_string(body_data).map_err(ModelError::JsonError)?;
            log::debug!("Request body: {}", body_str);
            request_builder = request_builder.body(body_str);
        }

        let response = request_builder
            .send()
            .await
            .map_err(ModelError::ReqwestError)?;

        Self::process_response(response).await
    }

    // GET requests carrying URL query parameters (query execution, login).
    pub(crate) async fn _get_with_url_params<R>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        use_master_key: bool,
        session_token_override: Option<&str>,
    ) -> Result<R, ModelError>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let mut full_url = self.build_url(endpoint)?;

        if !params.is_empty() {
            for (key, value) in params {
                full_url.query_pairs_mut().append_pair(key, value);
            }
        }

        log::debug!("Preparing GET request with params: URL={}", full_url.as_str());

        let mut headers = self.auth_headers(use_master_key, session_token_override)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .http_client
            .get(full_url)
            .headers(headers)
            .send()
            .await
            .map_err(ModelError::ReqwestError)?;

        Self::process_response(response).await
    }

    // Public HTTP method wrappers for endpoints the typed surface does not
    // cover.
    pub async fn get<R: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: &str,
    ) -> Result<R, ModelError> {
        self._request(Method::GET, endpoint, None::<&Value>, false, None)
            .await
    }

    pub async fn post<T: Serialize + Send + Sync, R: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: &str,
        data: &T,
    ) -> Result<R, ModelError> {
        self._request(Method::POST, endpoint, Some(data), false, None)
            .await
    }

    pub async fn put<T: Serialize + Send + Sync, R: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: &str,
        data: &T,
    ) -> Result<R, ModelError> {
        self._request(Method::PUT, endpoint, Some(data), false, None)
            .await
    }

    pub async fn delete_endpoint<R: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: &str,
    ) -> Result<R, ModelError> {
        self._request(Method::DELETE, endpoint, None::<&Value>, false, None)
            .await
    }

    async fn process_response<R>(response: reqwest::Response) -> Result<R, ModelError>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let status = response.status();
        let response_url = response.url().to_string();

        if status.is_success() {
            if status == reqwest::StatusCode::NO_CONTENT {
                return serde_json::from_str("{}").map_err(ModelError::JsonError);
            }
            let body_bytes = response.bytes().await.map_err(ModelError::ReqwestError)?;
            log::debug!(
                "Request successful. Response body: {}",
                String::from_utf8_lossy(&body_bytes)
            );
            serde_json::from_slice(&body_bytes).map_err(|e| {
                ModelError::JsonDeserializationFailed(format!(
                    "Failed to deserialize successful response from '{}': {}. Body: {}",
                    response_url,
                    e,
                    String::from_utf8_lossy(&body_bytes)
                ))
            })
        } else {
            let error_body_bytes = response.bytes().await.map_err(ModelError::ReqwestError)?;
            let error_body_string = String::from_utf8_lossy(&error_body_bytes).to_string();
            log::warn!(
                "Request failed with status {} and body: {}",
                status,
                error_body_string
            );
            match serde_json::from_slice::<Value>(&error_body_bytes) {
                Ok(json_value) => Err(ModelError::from_response(status.as_u16(), json_value)),
                Err(_) => {
                    let fallback_json = serde_json::json!({
                        "code": status.as_u16(),
                        "error": error_body_string
                    });
                    Err(ModelError::from_response(status.as_u16(), fallback_json))
                }
            }
        }
    }
}

#[async_trait]
impl Collaborator for Parse {
    async fn find(&self, plan: &QueryPlan) -> Result<Vec<ParseRecord>, ModelError> {
        Self::validate_class_name(plan.class_name())?;
        let endpoint = Self::object_endpoint(plan.class_name(), None);
        let params = plan.build_query_params();
        let response: QueryResponse<ParseRecord> = self
            ._get_with_url_params(&endpoint, &params, false, None)
            .await?;
        let mut records = response.results;
        for record in records.iter_mut() {
            record.class_name = plan.class_name().to_string();
        }
        Ok(records)
    }

    async fn get(&self, class_name: &str, object_id: &str) -> Result<ParseRecord, ModelError> {
        Self::validate_class_name(class_name)?;
        if object_id.is_empty() {
            return Err(ModelError::InvalidInput(
                "Object ID cannot be empty".to_string(),
            ));
        }
        let endpoint = Self::object_endpoint(class_name, Some(object_id));
        let mut record: ParseRecord = self
            ._request(Method::GET, &endpoint, None::<&Value>, false, None)
            .await?;
        record.class_name = class_name.to_string();
        Ok(record)
    }

    async fn count(&self, plan: &QueryPlan) -> Result<u64, ModelError> {
        Self::validate_class_name(plan.class_name())?;
        let mut counting = plan.clone();
        counting.limit(0); // Limit 0 is for count
        let endpoint = Self::object_endpoint(plan.class_name(), None);
        let mut params = counting.build_query_params();
        params.push(("count".to_string(), "1".to_string()));
        let response: CountResponse = self
            ._get_with_url_params(&endpoint, &params, false, None)
            .await?;
        Ok(response.count)
    }

    async fn create(&self, record: &ParseRecord) -> Result<CreateObjectResponse, ModelError> {
        Self::validate_class_name(&record.class_name)?;
        let endpoint = Self::object_endpoint(&record.class_name, None);
        self._request(Method::POST, &endpoint, Some(&record.fields), false, None)
            .await
    }

    async fn update(&self, record: &ParseRecord) -> Result<UpdateObjectResponse, ModelError> {
        Self::validate_class_name(&record.class_name)?;
        let object_id = record.object_id.as_deref().ok_or_else(|| {
            ModelError::InvalidInput("cannot update an object without an objectId".to_string())
        })?;
        let endpoint = Self::object_endpoint(&record.class_name, Some(object_id));
        self._request(Method::PUT, &endpoint, Some(&record.fields), false, None)
            .await
    }

    async fn delete(&self, class_name: &str, object_id: &str) -> Result<(), ModelError> {
        Self::validate_class_name(class_name)?;
        if object_id.is_empty() {
            return Err(ModelError::InvalidInput(
                "Object ID cannot be empty".to_string(),
            ));
        }
        let endpoint = Self::object_endpoint(class_name, Some(object_id));
        let response_value: Value = self
            ._request(Method::DELETE, &endpoint, None::<&Value>, false, None)
            .await?;

        if response_value.is_object()
            && response_value.as_object().is_some_and(|obj| obj.is_empty())
        {
            Ok(())
        } else {
            Err(ModelError::UnexpectedResponse(format!(
                "Expected empty JSON object {{}} for delete, got: {:?}",
                response_value
            )))
        }
    }

    async fn signup(&self, user: &UserRecord) -> Result<SignupResponse, ModelError> {
        let response: SignupResponse = self
            ._request(Method::POST, "users", Some(user), false, None)
            .await?;
        self.set_session_token(Some(response.session_token.clone()));
        Ok(response)
    }

    async fn login(&self, username: &str, password: &str) -> Result<UserRecord, ModelError> {
        let params = vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ];
        let mut user: UserRecord = self._get_with_url_params("login", &params, false, None).await?;
        user.record.class_name = USER_CLASS_NAME.to_string();
        self.set_session_token(user.session_token.clone());
        Ok(user)
    }

    async fn current_user(&self) -> Result<Option<UserRecord>, ModelError> {
        let Some(token) = self.session_token() else {
            return Ok(None);
        };
        let mut user: UserRecord = self
            ._request(Method::GET, "users/me", None::<&Value>, false, Some(&token))
            .await?;
        user.record.class_name = USER_CLASS_NAME.to_string();
        Ok(Some(user))
    }

    async fn find_users(&self, plan: &QueryPlan) -> Result<Vec<UserRecord>, ModelError> {
        let params = plan.build_query_params();
        let response: QueryResponse<UserRecord> = self
            ._get_with_url_params("users", &params, false, None)
            .await?;
        let mut users = response.results;
        for user in users.iter_mut() {
            user.record.class_name = USER_CLASS_NAME.to_string();
        }
        Ok(users)
    }

    async fn call_function(
        &self,
        function_name: &str,
        params: &Value,
    ) -> Result<Value, ModelError> {
        let endpoint = format!("functions/{}", function_name);
        let response: CloudFunctionResponse =
            self._request(Method::POST, &endpoint, Some(params), false, None).await?;
        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url_scheme_and_parse_suffix_normalize() {
        let client = Parse::new("localhost:1338/parse", "appId", None, None, None).unwrap();
        assert_eq!(client.server_url, "http://localhost:1338");
    }

    #[test]
    fn class_name_validation() {
        assert!(Parse::validate_class_name("GameScore").is_ok());
        assert!(Parse::validate_class_name("_User").is_ok());
        assert!(Parse::validate_class_name("").is_err());
        assert!(Parse::validate_class_name("9lives").is_err());
        assert!(Parse::validate_class_name("bad-name").is_err());
    }

    #[test]
    fn user_class_routes_to_users_endpoint() {
        assert_eq!(Parse::object_endpoint("_User", None), "users");
        assert_eq!(Parse::object_endpoint("_User", Some("u1")), "users/u1");
        assert_eq!(Parse::object_endpoint("Post", None), "classes/Post");
        assert_eq!(Parse::object_endpoint("Post", Some("p1")), "classes/Post/p1");
    }

    #[test]
    fn session_token_is_shared_across_clones() {
        let client = Parse::new("http://localhost:1338/parse", "appId", None, None, None).unwrap();
        let clone = client.clone();
        client.set_session_token(Some("r:abc".to_string()));
        assert_eq!(clone.session_token().as_deref(), Some("r:abc"));
        assert!(clone.is_authenticated());
    }
}
