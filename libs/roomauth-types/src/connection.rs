use serde::{Deserialize, Serialize};

/// Identity presented when asking for room connection details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantUser {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Inbound body of a connection-details request.
///
/// An empty body (the legacy parameterless form) deserializes to the guest
/// default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetailsRequest {
    #[serde(default)]
    pub user: Option<GrantUser>,

    #[serde(default)]
    pub is_guest: bool,
}

impl ConnectionDetailsRequest {
    pub fn guest() -> Self {
        Self {
            user: None,
            is_guest: true,
        }
    }

    pub fn authenticated(user: GrantUser) -> Self {
        Self {
            user: Some(user),
            is_guest: false,
        }
    }
}

/// Everything a participant needs to join a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub server_url: String,
    pub room_name: String,
    pub participant_name: String,
    pub participant_identity: String,
    pub participant_token: String,
}
