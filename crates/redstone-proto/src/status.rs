//! The server-list status response JSON.

use serde::Deserialize;

use crate::error::ProtoError;

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub version: StatusVersion,
    #[serde(default)]
    pub players: Option<StatusPlayers>,
    /// A chat component: either a plain string or an object.
    #[serde(default)]
    pub description: serde_json::Value,
    #[serde(default)]
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPlayers {
    pub max: i32,
    pub online: i32,
    #[serde(default)]
    pub sample: Vec<StatusPlayerSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPlayerSample {
    pub name: String,
    pub id: String,
}

impl StatusResponse {
    pub fn from_json(body: &str) -> Result<Self, ProtoError> {
        Ok(serde_json::from_str(body)?)
    }
}
