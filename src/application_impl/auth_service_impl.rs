use crate::application_impl::TokenIssuer;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RealAuthService {
    auth_repo: Arc<dyn AuthRepo>,
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    session_store: Arc<dyn SessionFamilyStore>,
    token_issuer: TokenIssuer,
    check_access_token: bool,
}

impl RealAuthService {
    /// `check_access_token` enables the stateful guard mode: every
    /// authorize call cross-checks the live refresh record, trading a store
    /// round-trip per protected request for immediate revocation (logout
    /// takes effect on the very next request instead of after the access
    /// token's own TTL).
    pub fn new(
        auth_repo: Arc<dyn AuthRepo>,
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn SessionFamilyStore>,
        check_access_token: bool,
    ) -> Result<Self, AuthError> {
        // Logout-everywhere is part of the public surface, so a store that
        // cannot do user-scoped invalidation must be rejected here, not at
        // first use.
        if !session_store.capabilities().user_scoped_invalidation {
            return Err(AuthError::Configuration(
                "session store does not support user-scoped invalidation".to_string(),
            ));
        }

        let token_issuer = TokenIssuer::new(token_codec.clone(), session_store.clone());
        Ok(Self {
            auth_repo,
            user_repo,
            credential_hasher,
            token_codec,
            session_store,
            token_issuer,
            check_access_token,
        })
    }

    async fn destroy_family(&self, user_id: UserId, family_id: FamilyId) -> Result<(), AuthError> {
        self.session_store
            .invalidate_refresh_token_family(user_id, family_id)
            .await
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { username, password } = request;

        // Unknown user, inactive user and bad password are converted into
        // the same error before anything observable happens.
        let rec = self
            .auth_repo
            .get_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !rec.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.token_issuer.issue(rec.user_id, None, None).await?;
        info!(user_id = %rec.user_id, "session family founded");

        Ok(LoginResult {
            user_id: rec.user_id,
            tokens,
        })
    }

    async fn redeem_refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self
            .token_codec
            .verify_refresh_token(&RefreshToken(refresh_token.to_string()))
            .await?;

        // Atomic consume: exactly one concurrent redeemer of a given token
        // wins. A token that is not live is a replay/compromise signal and
        // the whole family is sacrificed; the invalidation completes before
        // the error surfaces so a retried call cannot race ahead of it.
        let consumed = self
            .session_store
            .consume_refresh_token(claims.user_id, claims.family_id, claims.token_id)
            .await?;
        if !consumed {
            warn!(
                user_id = %claims.user_id,
                family_id = %claims.family_id,
                "refresh token replay detected, invalidating family"
            );
            self.destroy_family(claims.user_id, claims.family_id).await?;
            return Err(AuthError::InvalidToken);
        }

        if !self.user_repo.id_exists(claims.user_id).await? {
            warn!(
                user_id = %claims.user_id,
                family_id = %claims.family_id,
                "refresh token for missing subject, invalidating family"
            );
            self.destroy_family(claims.user_id, claims.family_id).await?;
            return Err(AuthError::InvalidToken);
        }

        self.token_issuer
            .issue(claims.user_id, Some(claims.family_id), None)
            .await
    }

    async fn authorize(&self, access_token: &str) -> Result<AuthContext, AuthError> {
        let claims = self
            .token_codec
            .verify_access_token(&AccessToken(access_token.to_string()))
            .await?;

        if !self.user_repo.id_exists(claims.user_id).await? {
            return Err(AuthError::SubjectNotFound);
        }

        if self.check_access_token {
            let live = self
                .session_store
                .is_refresh_token_valid(claims.user_id, claims.family_id, claims.token_id)
                .await?;
            if !live {
                return Err(AuthError::TokenRevoked);
            }
        }

        Ok(AuthContext {
            user_id: claims.user_id,
            family_id: claims.family_id,
            refresh_id: claims.token_id,
        })
    }

    async fn logout(&self, ctx: AuthContext) -> Result<(), AuthError> {
        self.destroy_family(ctx.user_id, ctx.family_id).await?;
        info!(user_id = %ctx.user_id, family_id = %ctx.family_id, "session family logged out");
        Ok(())
    }

    async fn logout_everywhere(&self, ctx: AuthContext) -> Result<(), AuthError> {
        self.session_store
            .invalidate_user_refresh_tokens(ctx.user_id)
            .await?;
        info!(user_id = %ctx.user_id, "all session families logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::token_codec_impl::RefreshClaims;
    use super::*;
    use crate::application_impl::{Argon2PasswordHasher, JwtConfig, JwtHs256Codec};
    use crate::infra_memory::{MemoryAuthRepo, MemorySessionFamilyStore, MemoryUserRepo};
    use chrono::Utc;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use std::time::Duration;
    use uuid::Uuid;

    const SECRET: &[u8] = b"test-signing-secret";

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(4 * 3600),
            signing_key: SECRET.to_vec(),
        }
    }

    struct Harness {
        service: RealAuthService,
        codec: Arc<dyn TokenCodec>,
        store: Arc<MemorySessionFamilyStore>,
        user_repo: Arc<MemoryUserRepo>,
        user_id: UserId,
    }

    impl Harness {
        async fn login(&self) -> AuthTokens {
            self.service
                .login(LoginInput {
                    username: "alice".to_string(),
                    password: "hunter22".to_string(),
                })
                .await
                .unwrap()
                .tokens
        }

        async fn refresh_claims(&self, token: &RefreshToken) -> VerifiedClaims {
            self.codec.verify_refresh_token(token).await.unwrap()
        }
    }

    async fn harness(check_access_token: bool) -> Harness {
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(jwt_config()));
        let store = Arc::new(MemorySessionFamilyStore::new());
        let user_repo = Arc::new(MemoryUserRepo::new());
        let auth_repo = Arc::new(MemoryAuthRepo::new());

        let user_id = UserId(Uuid::new_v4());
        user_repo.insert(user_id);
        let hasher = Argon2PasswordHasher;
        auth_repo.insert(AuthCredentialsRecord {
            user_id,
            username: "alice".to_string(),
            password_hash: hasher.hash_password("hunter22").await.unwrap(),
            is_active: true,
        });

        let service = RealAuthService::new(
            auth_repo.clone(),
            user_repo.clone(),
            Arc::new(Argon2PasswordHasher),
            codec.clone(),
            store.clone(),
            check_access_token,
        )
        .unwrap();

        Harness {
            service,
            codec,
            store,
            user_repo,
            user_id,
        }
    }

    #[tokio::test]
    async fn login_founds_a_new_family() {
        let h = harness(false).await;
        let tokens = h.login().await;
        let claims = h.refresh_claims(&tokens.refresh_token).await;

        assert_eq!(claims.user_id, h.user_id);
        assert_eq!(claims.family_id.0, claims.token_id.0);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let h = harness(false).await;

        let bad_password = h.service.login(LoginInput {
            username: "alice".to_string(),
            password: "wrong".to_string(),
        });
        let unknown_user = h.service.login(LoginInput {
            username: "mallory".to_string(),
            password: "hunter22".to_string(),
        });

        assert!(matches!(
            bad_password.await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            unknown_user.await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn redeeming_keeps_the_family() {
        let h = harness(false).await;
        let tokens = h.login().await;
        let before = h.refresh_claims(&tokens.refresh_token).await;

        let rotated = h
            .service
            .redeem_refresh_token(&tokens.refresh_token.0)
            .await
            .unwrap();
        let after = h.refresh_claims(&rotated.refresh_token).await;

        assert_eq!(after.family_id, before.family_id);
        assert_ne!(after.token_id, before.token_id);
    }

    #[tokio::test]
    async fn double_redemption_destroys_the_whole_family() {
        let h = harness(false).await;
        let rt0 = h.login().await.refresh_token;

        let rt1 = h
            .service
            .redeem_refresh_token(&rt0.0)
            .await
            .unwrap()
            .refresh_token;

        // Replay of the consumed token fails and takes the successor down
        // with it.
        assert!(matches!(
            h.service.redeem_refresh_token(&rt0.0).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            h.service.redeem_refresh_token(&rt1.0).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn concurrent_redemptions_of_one_token_cannot_both_succeed() {
        let h = harness(false).await;
        let rt0 = h.login().await.refresh_token;

        let (a, b) = tokio::join!(
            h.service.redeem_refresh_token(&rt0.0),
            h.service.redeem_refresh_token(&rt0.0),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn families_are_isolated() {
        let h = harness(false).await;
        let session_a = h.login().await;
        let session_b = h.login().await;

        let ctx_a = h
            .service
            .authorize(&session_a.access_token.0)
            .await
            .unwrap();
        h.service.logout(ctx_a).await.unwrap();

        assert!(matches!(
            h.service
                .redeem_refresh_token(&session_a.refresh_token.0)
                .await,
            Err(AuthError::InvalidToken)
        ));
        assert!(
            h.service
                .redeem_refresh_token(&session_b.refresh_token.0)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn logout_everywhere_spans_all_families() {
        let h = harness(false).await;
        let session_a = h.login().await;
        let session_b = h.login().await;

        let ctx = h
            .service
            .authorize(&session_a.access_token.0)
            .await
            .unwrap();
        h.service.logout_everywhere(ctx).await.unwrap();

        assert!(matches!(
            h.service
                .redeem_refresh_token(&session_a.refresh_token.0)
                .await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            h.service
                .redeem_refresh_token(&session_b.refresh_token.0)
                .await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn forged_refresh_token_is_rejected_without_touching_state() {
        let h = harness(false).await;
        let tokens = h.login().await;
        let claims = h.refresh_claims(&tokens.refresh_token).await;

        let forged_codec = JwtHs256Codec::new(JwtConfig {
            signing_key: b"other-secret".to_vec(),
            ..jwt_config()
        });
        let (forged, _) = forged_codec
            .issue_refresh_token(claims.user_id, claims.family_id, claims.token_id)
            .await
            .unwrap();

        assert!(matches!(
            h.service.redeem_refresh_token(&forged.0).await,
            Err(AuthError::InvalidToken)
        ));
        // The legitimate token survived the forgery attempt.
        assert!(
            h.service
                .redeem_refresh_token(&tokens.refresh_token.0)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn expired_refresh_token_is_rejected_even_if_live_in_store() {
        let h = harness(false).await;
        let family_id = FamilyId(Uuid::new_v4());
        let token_id = TokenId(Uuid::new_v4());

        let now = Utc::now();
        let claims = RefreshClaims {
            uid: h.user_id.to_string(),
            fid: family_id.to_string(),
            jti: token_id.to_string(),
            exp: (now - chrono::Duration::hours(1)).timestamp(),
            iat: (now - chrono::Duration::hours(5)).timestamp(),
            aud: Audience::ApiRefresh,
        };
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        h.store
            .save_refresh_token(
                h.user_id,
                family_id,
                token_id,
                &RefreshToken(expired.clone()),
                60,
            )
            .await
            .unwrap();

        assert!(matches!(
            h.service.redeem_refresh_token(&expired).await,
            Err(AuthError::InvalidToken)
        ));
        // Rejected before any state was read or written.
        assert!(
            h.store
                .is_refresh_token_valid(h.user_id, family_id, token_id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn redemption_for_a_deleted_subject_destroys_the_family() {
        let h = harness(false).await;
        let tokens = h.login().await;
        let claims = h.refresh_claims(&tokens.refresh_token).await;

        h.user_repo.remove(h.user_id);

        assert!(matches!(
            h.service
                .redeem_refresh_token(&tokens.refresh_token.0)
                .await,
            Err(AuthError::InvalidToken)
        ));
        assert!(
            !h.store
                .is_refresh_token_valid(h.user_id, claims.family_id, claims.token_id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn authorize_for_a_deleted_subject_fails() {
        let h = harness(false).await;
        let tokens = h.login().await;

        h.user_repo.remove(h.user_id);

        assert!(matches!(
            h.service.authorize(&tokens.access_token.0).await,
            Err(AuthError::SubjectNotFound)
        ));
    }

    #[tokio::test]
    async fn stateless_guard_trusts_access_tokens_after_logout() {
        let h = harness(false).await;
        let tokens = h.login().await;

        let ctx = h.service.authorize(&tokens.access_token.0).await.unwrap();
        h.service.logout(ctx).await.unwrap();

        // Without the stateful cross-check the access token rides out its
        // own TTL.
        assert!(h.service.authorize(&tokens.access_token.0).await.is_ok());
    }

    #[tokio::test]
    async fn stateful_guard_revokes_access_tokens_on_logout() {
        let h = harness(true).await;
        let tokens = h.login().await;

        let ctx = h.service.authorize(&tokens.access_token.0).await.unwrap();
        h.service.logout(ctx).await.unwrap();

        assert!(matches!(
            h.service.authorize(&tokens.access_token.0).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn stateful_guard_follows_rotation() {
        let h = harness(true).await;
        let tokens = h.login().await;

        // Rotating consumes the refresh record the access token points at,
        // so the old access token is no longer trusted.
        h.service
            .redeem_refresh_token(&tokens.refresh_token.0)
            .await
            .unwrap();

        assert!(matches!(
            h.service.authorize(&tokens.access_token.0).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn missing_store_capability_fails_at_construction() {
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(jwt_config()));
        let store = Arc::new(MemorySessionFamilyStore::without_user_scoped_invalidation());

        let result = RealAuthService::new(
            Arc::new(MemoryAuthRepo::new()),
            Arc::new(MemoryUserRepo::new()),
            Arc::new(Argon2PasswordHasher),
            codec,
            store,
            false,
        );

        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }
}
