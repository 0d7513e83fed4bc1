use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::entities::{server, user};
use crate::docker::{ContainerAction, RunSpec};

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user_id: i32,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub user_id: i32,
    pub role: String,
    /// "access" or "refresh".
    #[serde(rename = "typ")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub exp: usize,
}

/// Struct to hold authenticated user details, to be passed as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
}

fn default_ssh_port() -> i32 {
    22
}

fn default_ssh_user() -> String {
    "root".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: i32,
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    /// Plaintext PEM; sealed before it is stored.
    pub ssh_private_key: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateServerRequest {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub ssh_user: Option<String>,
    pub ssh_private_key: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub id: i32,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub ssh_user: String,
    pub description: Option<String>,
    pub owner_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<server::Model> for ServerResponse {
    fn from(server: server::Model) -> Self {
        Self {
            id: server.id,
            name: server.name,
            host: server.host,
            port: server.port,
            ssh_user: server.ssh_user,
            description: server.description,
            owner_id: server.owner_id,
            created_at: server.created_at,
            updated_at: server.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerRequest {
    pub name: String,
    pub image: String,
    pub ports: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(alias = "extra_args")]
    pub extra_args: Option<String>,
}

impl From<CreateContainerRequest> for RunSpec {
    fn from(req: CreateContainerRequest) -> Self {
        RunSpec {
            name: req.name,
            image: req.image,
            ports: req.ports,
            env: req.env,
            extra_args: req.extra_args,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContainerRequest {
    #[serde(alias = "is_active")]
    pub is_active: bool,
}

/// Acknowledgement returned by create and lifecycle actions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerActionResponse {
    pub container_id: i32,
    pub status: String,
    pub message: String,
}

impl ContainerActionResponse {
    fn with_status(container_id: i32, status: &str) -> Self {
        Self {
            container_id,
            status: status.to_string(),
            message: format!("Container is {status}. Please check the status later."),
        }
    }

    pub fn creating(container_id: i32) -> Self {
        Self::with_status(container_id, "creating")
    }

    pub fn for_action(container_id: i32, action: ContainerAction) -> Self {
        Self::with_status(container_id, action.progress_label())
    }
}
