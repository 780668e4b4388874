use serde::{Deserialize, Serialize};

/// An idea on a tenant's board, serialized with the field names the API
/// exposes (camelCase).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author_email: String,
    pub votes: i64,
    pub created_at: i64,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author_email: String,
    pub created_at: i64,
}

/// A tenant's admin identity. `passkey_json` is the serialized WebAuthn
/// credential; `None` means the board's admin role is still unclaimed.
#[derive(Debug, Clone)]
pub struct AdminRecord {
    pub username: String,
    pub passkey_json: Option<String>,
}

impl AdminRecord {
    pub fn is_configured(&self) -> bool {
        self.passkey_json.is_some()
    }
}
