use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::fmt::Display;
use uuid::Uuid;

/// Redis-backed session family store.
///
/// One record key per `(user, family, token)` with the refresh TTL, plus a
/// family set and a user set as secondary indexes for bulk invalidation.
/// `GETDEL` is the atomic consume: only one of two concurrent redeemers can
/// observe the value.
pub struct RedisSessionFamilyStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionFamilyStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionFamilyStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn record_key(&self, user_id: UserId, family_id: FamilyId, token_id: impl Display) -> String {
        format!("{}:rt:{}:{}:{}", self.prefix, user_id, family_id, token_id)
    }

    fn family_key(&self, user_id: UserId, family_id: FamilyId) -> String {
        format!("{}:fam:{}:{}", self.prefix, user_id, family_id)
    }

    fn user_key(&self, user_id: UserId) -> String {
        format!("{}:usr:{}", self.prefix, user_id)
    }

    fn store_err(e: redis::RedisError) -> AuthError {
        AuthError::Store(e.to_string())
    }
}

#[async_trait::async_trait]
impl SessionFamilyStore for RedisSessionFamilyStore {
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
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
        token: &RefreshToken,
        ttl_secs: u64,
    ) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();

        let record_key = self.record_key(user_id, family_id, token_id);
        let _: () = conn
            .set_ex(&record_key, token.0.as_str(), ttl_secs)
            .await
            .map_err(Self::store_err)?;

        // Index entries live at least as long as the newest family member.
        let family_key = self.family_key(user_id, family_id);
        let _: () = conn
            .sadd(&family_key, token_id.to_string())
            .await
            .map_err(Self::store_err)?;
        let _: () = conn
            .expire(&family_key, ttl_secs as i64)
            .await
            .map_err(Self::store_err)?;

        let user_key = self.user_key(user_id);
        let _: () = conn
            .sadd(&user_key, family_id.to_string())
            .await
            .map_err(Self::store_err)?;
        let _: () = conn
            .expire(&user_key, ttl_secs as i64)
            .await
            .map_err(Self::store_err)?;

        Ok(())
    }

    async fn is_refresh_token_valid(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(self.record_key(user_id, family_id, token_id))
            .await
            .map_err(Self::store_err)?;
        Ok(exists)
    }

    async fn consume_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let consumed: Option<String> = conn
            .get_del(self.record_key(user_id, family_id, token_id))
            .await
            .map_err(Self::store_err)?;
        if consumed.is_some() {
            let _: () = conn
                .srem(self.family_key(user_id, family_id), token_id.to_string())
                .await
                .map_err(Self::store_err)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn invalidate_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.record_key(user_id, family_id, token_id))
            .await
            .map_err(Self::store_err)?;
        let _: () = conn
            .srem(self.family_key(user_id, family_id), token_id.to_string())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn invalidate_refresh_token_family(
        &self,
        user_id: UserId,
        family_id: FamilyId,
    ) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let family_key = self.family_key(user_id, family_id);

        let members: Vec<String> = conn.smembers(&family_key).await.map_err(Self::store_err)?;
        for token_id in &members {
            let _: () = conn
                .del(self.record_key(user_id, family_id, token_id))
                .await
                .map_err(Self::store_err)?;
        }
        let _: () = conn.del(&family_key).await.map_err(Self::store_err)?;
        let _: () = conn
            .srem(self.user_key(user_id), family_id.to_string())
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn invalidate_user_refresh_tokens(&self, user_id: UserId) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let user_key = self.user_key(user_id);

        let families: Vec<String> = conn.smembers(&user_key).await.map_err(Self::store_err)?;
        for family in families {
            let family_id = family
                .parse::<FamilyId>()
                .map_err(|e| AuthError::Store(format!("invalid family id in index: {e}")))?;
            self.invalidate_refresh_token_family(user_id, family_id)
                .await?;
        }
        let _: () = conn.del(&user_key).await.map_err(Self::store_err)?;
        Ok(())
    }
}
