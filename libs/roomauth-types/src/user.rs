use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical user record.
///
/// Treated as an immutable value: a newer record replaces the old one
/// wholesale, it is never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID
    pub id: String,

    /// Email address (may be a placeholder for provisional records)
    pub email: String,

    /// Name shown to other participants
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,

    pub is_active: bool,

    pub is_verified: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,

    /// Set on records synthesized from token claims rather than fetched
    /// from the profile store. Such records should later be replaced by a
    /// real profile.
    #[serde(default)]
    pub is_provisional: bool,
}

impl User {
    /// "first last" when both parts are present and non-empty.
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.trim().is_empty() && !last.trim().is_empty() => {
                Some(format!("{} {}", first.trim(), last.trim()))
            }
            _ => None,
        }
    }
}
