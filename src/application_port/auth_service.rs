use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Error taxonomy for the token lifecycle.
///
/// Validation failures are detected locally and never retried. Store I/O
/// failures stay `Store` and must not be collapsed into `InvalidToken`,
/// otherwise a storage outage masquerades as "everyone is logged out".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Malformed, expired, wrong-audience or wrong-signature token. The
    /// sub-reason is deliberately not carried; callers must not be able to
    /// tell a forged token from a replayed one.
    #[error("token invalid")]
    InvalidToken,
    #[error("token revoked")]
    TokenRevoked,
    #[error("subject not found")]
    SubjectNotFound,
    /// A required capability is missing. Raised at construction time, never
    /// per-request.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Transient store failure; surfaces as 5xx, never as 401.
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub tokens: AuthTokens,
}

/// Key/value set merged into the access-token payload at issuance
/// (role/permission hints and the like).
pub type ExtraClaims = serde_json::Map<String, serde_json::Value>;

/// Claims extracted from a token that passed signature, audience and expiry
/// verification. For access tokens `token_id` is the `rid` claim; for
/// refresh tokens it is the `jti`.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedClaims {
    pub user_id: UserId,
    pub family_id: FamilyId,
    pub token_id: TokenId,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        refresh_id: TokenId,
        extra_claims: Option<ExtraClaims>,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    async fn issue_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    async fn verify_access_token(&self, token: &AccessToken)
    -> Result<VerifiedClaims, AuthError>;

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<VerifiedClaims, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Authentication event: verifies credentials and founds a new session
    /// family.
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;

    /// Refresh rotation: consumes the presented refresh token and mints a
    /// new pair under the same family. A token that is not live is treated
    /// as a compromise signal and destroys the whole family.
    async fn redeem_refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;

    /// Access-token guard for protected routes.
    async fn authorize(&self, access_token: &str) -> Result<AuthContext, AuthError>;

    /// Invalidates the context's family only; other sessions of the same
    /// user stay valid.
    async fn logout(&self, ctx: AuthContext) -> Result<(), AuthError>;

    /// Invalidates every family of the context's user.
    async fn logout_everywhere(&self, ctx: AuthContext) -> Result<(), AuthError>;
}
