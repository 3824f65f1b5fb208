use serde::{Deserialize, Serialize};

/// The resolved "current user". Session handling lives outside the core;
/// this is the shape the auth collaborator hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
}
