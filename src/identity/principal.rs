use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated identity a session carries: who signed in and which
/// roles were materialized for them at sign-in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: Uuid,
    pub login_handle: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
