use serde::{Deserialize, Serialize};

/// The authenticated identity attached to a session. The rights vector is a
/// denormalized copy taken at login time; it is advisory display state only.
/// Every sensitive operation re-reads the user and profile catalogs through
/// the authorizer instead of trusting this copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub rights: Vec<String>,
}
