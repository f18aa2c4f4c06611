use serde::{Deserialize, Serialize};

/// Claims carried by an auth token.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: u64,
}

/// The authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl Identity {
    /// Name used when attributing report activity.
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.uid)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}
