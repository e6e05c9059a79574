use crate::application_port::*;
use crate::domain_model::*;

/// What a store implementation can do beyond the mandatory surface.
/// Checked once at service construction; a missing capability is a
/// `Configuration` error at startup, never a silent no-op at first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCapabilities {
    /// Whether `invalidate_user_refresh_tokens` is supported
    /// (logout-everywhere needs it).
    pub user_scoped_invalidation: bool,
}

/// Durable record of live refresh tokens, keyed by `(user, family, token)`
/// with family- and user-scoped secondary indexes for bulk invalidation.
#[async_trait::async_trait]
pub trait SessionFamilyStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    /// Allocate a fresh, globally-unique refresh token id.
    async fn create_token_id(&self) -> Result<TokenId, AuthError>;

    /// Persist a refresh token record with TTL. Exactly one record is live
    /// per `(user, family, token)` key.
    async fn save_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
        token: &RefreshToken,
        ttl_secs: u64,
    ) -> Result<(), AuthError>;

    async fn is_refresh_token_valid(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<bool, AuthError>;

    /// Atomic test-and-invalidate. Returns whether the record was live at
    /// the moment of removal; two concurrent consumers of the same record
    /// cannot both observe `true`.
    async fn consume_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<bool, AuthError>;

    async fn invalidate_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<(), AuthError>;

    /// Invalidates every refresh token ever issued under the family,
    /// regardless of rotation count.
    async fn invalidate_refresh_token_family(
        &self,
        user_id: UserId,
        family_id: FamilyId,
    ) -> Result<(), AuthError>;

    /// Invalidates every family of the user. Only callable when
    /// `capabilities().user_scoped_invalidation` is set.
    async fn invalidate_user_refresh_tokens(&self, user_id: UserId) -> Result<(), AuthError>;
}
