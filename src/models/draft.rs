//! Draft and navigation payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::drafts::{DraftRecord, Role};

/// Request body for writing a draft directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDraftRequest {
    pub value: Value,
}

/// A draft together with the key it is stored under.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub key: String,
    #[serde(flatten)]
    pub record: DraftRecord,
}

/// Query string selecting a user's draft namespace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Draft keys of every role for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleKey {
    pub role: Role,
    pub key: String,
}

/// Navigation event reported by the frontend router.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub pathname: String,
    #[serde(default)]
    pub user_id: Option<String>,
}
