//! Provider models.

use serde::{Deserialize, Serialize};

/// A clinical provider record linked to a user account.
///
/// Check-in defaults its provider from the acting user, which requires the
/// user to map to exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    /// Stable UUID
    pub id: String,
    /// User account that acts through this provider
    pub user_id: String,
    /// Display name
    pub name: String,
}

impl Provider {
    /// Create a new provider with a generated id.
    pub fn new(user_id: String, name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            name,
        }
    }
}
