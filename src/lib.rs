pub mod backend;
pub mod client;
pub mod cloud;
pub mod error;
pub mod model;
pub mod query;
pub mod record;
pub mod schema;
pub mod types;
pub mod user;

pub use backend::{Collaborator, CreateObjectResponse, SignupResponse, UpdateObjectResponse};
pub use client::Parse;
pub use cloud::Cloud;
pub use error::ModelError;
pub use model::{Model, ModelExt};
pub use query::{ModelQuery, QueryPlan};
pub use record::{GenericRecord, ParseRecord};
pub use schema::{Schema, SchemaBuilder};
pub use user::{UserModel, UserModelExt, UserRecord, RESERVED_KEYS, USER_CLASS_NAME};

// Re-export key types from the types module if needed directly
pub use types::{ParseDate, Pointer};
