//! Form session payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::drafts::Role;
use crate::forms::Provenance;

fn default_prefer_draft() -> bool {
    true
}

/// Request body for mounting a form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountFormRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: Role,
    pub defaults: Value,
    #[serde(default)]
    pub server_data: Option<Value>,
    #[serde(default = "default_prefer_draft")]
    pub prefer_draft: bool,
    #[serde(default)]
    pub schema_version: Option<u32>,
    /// Wait for a later server-data call before hydrating
    #[serde(default)]
    pub defer_hydration: bool,
}

/// Request body delivering server data to a mounted form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDataRequest {
    #[serde(default)]
    pub server_data: Option<Value>,
}

/// Request body for replacing one field.
#[derive(Debug, Clone, Deserialize)]
pub struct SetFieldRequest {
    pub value: Value,
}

/// Request body for replacing the whole form.
#[derive(Debug, Clone, Deserialize)]
pub struct SetAllRequest {
    pub form: Value,
}

/// Request body for a dot-path write.
#[derive(Debug, Clone, Deserialize)]
pub struct SetNestedRequest {
    pub path: String,
    pub value: Value,
}

/// State of a mounted form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub id: Uuid,
    pub key: String,
    pub hydrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Value>,
}

/// Result of delivering server data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDataOutcome {
    /// Whether this delivery hydrated the form
    pub applied: bool,
    pub form: FormView,
}
