use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Mints an access/refresh pair for a user, optionally continuing an
/// existing family. By convention a new family's identity is its founding
/// refresh token's identity.
pub struct TokenIssuer {
    token_codec: Arc<dyn TokenCodec>,
    session_store: Arc<dyn SessionFamilyStore>,
}

impl TokenIssuer {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn SessionFamilyStore>,
    ) -> Self {
        Self {
            token_codec,
            session_store,
        }
    }

    /// The refresh record is persisted before the pair is returned; a store
    /// write failure aborts the whole call and no partial pair escapes.
    pub async fn issue(
        &self,
        user_id: UserId,
        family_id: Option<FamilyId>,
        extra_claims: Option<ExtraClaims>,
    ) -> Result<AuthTokens, AuthError> {
        let token_id = self.session_store.create_token_id().await?;
        let family_id = family_id.unwrap_or_else(|| FamilyId::from(token_id));

        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(user_id, family_id, token_id, extra_claims)
            .await?;
        let (refresh_token, refresh_exp) = self
            .token_codec
            .issue_refresh_token(user_id, family_id, token_id)
            .await?;

        self.session_store
            .save_refresh_token(
                user_id,
                family_id,
                token_id,
                &refresh_token,
                ttl_secs(refresh_exp),
            )
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

pub(crate) fn ttl_secs(until: DateTime<Utc>) -> u64 {
    let secs = (until - Utc::now()).num_seconds();
    if secs <= 0 { 1 } else { secs as u64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtHs256Codec};
    use crate::infra_memory::MemorySessionFamilyStore;
    use std::time::Duration;
    use uuid::Uuid;

    fn issuer() -> (TokenIssuer, Arc<dyn TokenCodec>, Arc<MemorySessionFamilyStore>) {
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(4 * 3600),
            signing_key: b"test-secret".to_vec(),
        }));
        let store = Arc::new(MemorySessionFamilyStore::new());
        (
            TokenIssuer::new(codec.clone(), store.clone()),
            codec,
            store,
        )
    }

    /// Hands out token ids but refuses every write, the shape of a redis
    /// node going away between `create_token_id` and `save_refresh_token`.
    struct WriteFailingStore;

    #[async_trait::async_trait]
    impl SessionFamilyStore for WriteFailingStore {
        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities {
                user_scoped_invalidation: true,
            }
        }

        async fn create_token_id(&self) -> Result<TokenId, AuthError> {
            Ok(TokenId(Uuid::new_v4()))
        }

        async fn save_refresh_token(
            &self,
            _user_id: UserId,
            _family_id: FamilyId,
            _token_id: TokenId,
            _token: &RefreshToken,
            _ttl_secs: u64,
        ) -> Result<(), AuthError> {
            Err(AuthError::Store("connection reset by peer".to_string()))
        }

        async fn is_refresh_token_valid(
            &self,
            _user_id: UserId,
            _family_id: FamilyId,
            _token_id: TokenId,
        ) -> Result<bool, AuthError> {
            Ok(false)
        }

        async fn consume_refresh_token(
            &self,
            _user_id: UserId,
            _family_id: FamilyId,
            _token_id: TokenId,
        ) -> Result<bool, AuthError> {
            Err(AuthError::Store("connection reset by peer".to_string()))
        }

        async fn invalidate_refresh_token(
            &self,
            _user_id: UserId,
            _family_id: FamilyId,
            _token_id: TokenId,
        ) -> Result<(), AuthError> {
            Ok(())
        }

        async fn invalidate_refresh_token_family(
            &self,
            _user_id: UserId,
            _family_id: FamilyId,
        ) -> Result<(), AuthError> {
            Ok(())
        }

        async fn invalidate_user_refresh_tokens(&self, _user_id: UserId) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_write_failure_aborts_the_issue() {
        let (_, codec, _) = issuer();
        let issuer = TokenIssuer::new(codec, Arc::new(WriteFailingStore));

        let err = issuer
            .issue(UserId(Uuid::new_v4()), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn new_family_id_equals_founding_token_id() {
        let (issuer, codec, _) = issuer();
        let user_id = UserId(Uuid::new_v4());

        let tokens = issuer.issue(user_id, None, None).await.unwrap();
        let claims = codec
            .verify_refresh_token(&tokens.refresh_token)
            .await
            .unwrap();

        assert_eq!(claims.family_id.0, claims.token_id.0);
    }

    #[tokio::test]
    async fn issuing_into_an_existing_family_keeps_its_id() {
        let (issuer, codec, _) = issuer();
        let user_id = UserId(Uuid::new_v4());
        let family_id = FamilyId(Uuid::new_v4());

        let tokens = issuer.issue(user_id, Some(family_id), None).await.unwrap();
        let claims = codec
            .verify_refresh_token(&tokens.refresh_token)
            .await
            .unwrap();

        assert_eq!(claims.family_id, family_id);
        assert_ne!(claims.token_id.0, family_id.0);
    }

    #[tokio::test]
    async fn refresh_record_is_persisted_on_issue() {
        let (issuer, codec, store) = issuer();
        let user_id = UserId(Uuid::new_v4());

        let tokens = issuer.issue(user_id, None, None).await.unwrap();
        let claims = codec
            .verify_refresh_token(&tokens.refresh_token)
            .await
            .unwrap();

        assert!(
            store
                .is_refresh_token_valid(user_id, claims.family_id, claims.token_id)
                .await
                .unwrap()
        );
    }
}
