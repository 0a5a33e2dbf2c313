use serde::{Deserialize, Serialize};

/// The user object returned by the login endpoint.
///
/// Only `name` is guaranteed; anything else the endpoint sends is kept verbatim
/// so it can be written back to the local store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
