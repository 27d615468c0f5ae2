//! Edges of the Mojang authentication collaborators: the JSON shapes the
//! core consumes and the session-join seam the login flow calls. The HTTPS
//! transport itself lives outside this crate; callers bring their own
//! [`SessionService`] implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL of the authentication server the request shapes target.
pub const AUTH_BASE_URL: &str = "https://authserver.mojang.com";

#[derive(Debug, Error)]
pub enum AuthError {
    /// The server answered with its `{error, errorMessage}` JSON.
    #[error("{error}: {error_message}")]
    Server { error: String, error_message: String },

    #[error("{0}")]
    Other(String),
}

/// A game profile attached to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub name: String,
    pub version: i32,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            name: "Minecraft".to_string(),
            version: 1,
        }
    }
}

/// Body of the `/authenticate` POST.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub agent: Agent,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub access_token: String,
    pub client_token: String,
    pub selected_profile: Profile,
    #[serde(default)]
    pub available_profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    error_message: String,
}

/// Parses an `/authenticate` response body, turning the server's error JSON
/// into [`AuthError::Server`].
pub fn parse_authenticate_response(body: &str) -> Result<AuthenticateResponse, AuthError> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Err(AuthError::Server {
            error: err.error,
            error_message: err.error_message,
        });
    }
    serde_json::from_str(body).map_err(|err| AuthError::Other(err.to_string()))
}

/// What the login flow needs from a previous authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub profile_id: String,
}

impl From<&AuthenticateResponse> for Credentials {
    fn from(response: &AuthenticateResponse) -> Self {
        Self {
            access_token: response.access_token.clone(),
            profile_id: response.selected_profile.id.clone(),
        }
    }
}

/// The session-join collaborator: reports whether the session server
/// accepted the (access token, profile, server hash) triple (an HTTP 204 in
/// the real service).
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn join(
        &self,
        access_token: &str,
        profile_id: &str,
        server_hash: &str,
    ) -> Result<bool, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_response_parses() {
        let body = r#"{
            "accessToken": "token-a",
            "clientToken": "token-c",
            "selectedProfile": {"id": "p1", "name": "Memelord"},
            "availableProfiles": [{"id": "p1", "name": "Memelord", "legacy": true}]
        }"#;
        let response = parse_authenticate_response(body).unwrap();
        assert_eq!(response.access_token, "token-a");
        assert_eq!(response.selected_profile.name, "Memelord");
        assert!(!response.selected_profile.legacy);
        assert!(response.available_profiles[0].legacy);

        let credentials = Credentials::from(&response);
        assert_eq!(credentials.access_token, "token-a");
        assert_eq!(credentials.profile_id, "p1");
    }

    #[test]
    fn error_json_becomes_auth_error() {
        let body = r#"{"error": "ForbiddenOperationException",
                       "errorMessage": "Invalid credentials."}"#;
        match parse_authenticate_response(body) {
            Err(AuthError::Server { error, error_message }) => {
                assert_eq!(error, "ForbiddenOperationException");
                assert_eq!(error_message, "Invalid credentials.");
            }
            other => panic!("expected a server error, got {other:?}"),
        }
    }

    #[test]
    fn request_body_shape() {
        let request = AuthenticateRequest {
            agent: Agent::default(),
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
            client_token: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["agent"]["name"], "Minecraft");
        assert_eq!(json["agent"]["version"], 1);
        assert_eq!(json["username"], "user@example.com");
        assert!(json.get("clientToken").is_none());
    }
}
