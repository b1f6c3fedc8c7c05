//! Stored OAuth credential for a mailbox user

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Seconds before expiry at which an access token is treated as stale
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth credential record for one authorized user
///
/// Written wholesale on authorization and on token refresh; never patched
/// field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    /// Stable identifier (the user's email when known)
    pub id: String,
    pub email: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: String,
    /// Access token expiry, seconds since the Unix epoch
    pub token_expiry: i64,
}

impl UserCredential {
    /// Create a credential record
    pub fn new(
        id: impl Into<String>,
        email: Option<String>,
        refresh_token: Option<String>,
        access_token: impl Into<String>,
        token_expiry: i64,
    ) -> Self {
        Self {
            id: id.into(),
            email,
            refresh_token,
            access_token: access_token.into(),
            token_expiry,
        }
    }

    /// Whether the access token is still usable (with a 5 minute buffer)
    pub fn access_token_valid(&self) -> bool {
        self.token_expiry > Utc::now().timestamp() + EXPIRY_BUFFER_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_valid() {
        let now = Utc::now().timestamp();
        let fresh = UserCredential::new("u", None, None, "tok", now + 3600);
        assert!(fresh.access_token_valid());

        let stale = UserCredential::new("u", None, None, "tok", now + 60);
        assert!(!stale.access_token_valid());

        let expired = UserCredential::new("u", None, None, "tok", now - 10);
        assert!(!expired.access_token_valid());
    }
}
