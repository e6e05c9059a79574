use crate::application_port::*;
use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct AuthCredentialsRecord {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
}

/// Credential storage, external to the token core.
#[async_trait::async_trait]
pub trait AuthRepo: Send + Sync {
    /// Fetch credentials by username (for login).
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthCredentialsRecord>, AuthError>;
}
