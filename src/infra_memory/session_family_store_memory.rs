use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

struct StoredToken {
    #[allow(dead_code)]
    token: String,
    expires_at: DateTime<Utc>,
}

/// Flat-keyed in-memory store: one record per `(user, family, token)` plus
/// family- and user-scoped index sets. Backs the `memory` backend and the
/// test suites. `DashMap::remove` is the atomic consume primitive.
pub struct MemorySessionFamilyStore {
    records: DashMap<(UserId, FamilyId, TokenId), StoredToken>,
    families: DashMap<(UserId, FamilyId), HashSet<TokenId>>,
    users: DashMap<UserId, HashSet<FamilyId>>,
    user_scoped_invalidation: bool,
}

impl MemorySessionFamilyStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            families: DashMap::new(),
            users: DashMap::new(),
            user_scoped_invalidation: true,
        }
    }

    /// A store that does not track the per-user family index. Mirrors
    /// deployments whose storage cannot answer user-scoped bulk
    /// invalidation; constructing a service with logout-everywhere on top
    /// of it must fail at startup.
    pub fn without_user_scoped_invalidation() -> Self {
        Self {
            user_scoped_invalidation: false,
            ..Self::new()
        }
    }

    fn live(record: &StoredToken) -> bool {
        record.expires_at > Utc::now()
    }
}

impl Default for MemorySessionFamilyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionFamilyStore for MemorySessionFamilyStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            user_scoped_invalidation: self.user_scoped_invalidation,
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
        self.records.insert(
            (user_id, family_id, token_id),
            StoredToken {
                token: token.0.clone(),
                expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs as i64),
            },
        );
        self.families
            .entry((user_id, family_id))
            .or_default()
            .insert(token_id);
        if self.user_scoped_invalidation {
            self.users.entry(user_id).or_default().insert(family_id);
        }
        Ok(())
    }

    async fn is_refresh_token_valid(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<bool, AuthError> {
        Ok(self
            .records
            .get(&(user_id, family_id, token_id))
            .map(|r| Self::live(&r))
            .unwrap_or(false))
    }

    async fn consume_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<bool, AuthError> {
        match self.records.remove(&(user_id, family_id, token_id)) {
            Some((_, record)) => {
                if let Some(mut members) = self.families.get_mut(&(user_id, family_id)) {
                    members.remove(&token_id);
                }
                Ok(Self::live(&record))
            }
            None => Ok(false),
        }
    }

    async fn invalidate_refresh_token(
        &self,
        user_id: UserId,
        family_id: FamilyId,
        token_id: TokenId,
    ) -> Result<(), AuthError> {
        self.records.remove(&(user_id, family_id, token_id));
        if let Some(mut members) = self.families.get_mut(&(user_id, family_id)) {
            members.remove(&token_id);
        }
        Ok(())
    }

    async fn invalidate_refresh_token_family(
        &self,
        user_id: UserId,
        family_id: FamilyId,
    ) -> Result<(), AuthError> {
        if let Some((_, members)) = self.families.remove(&(user_id, family_id)) {
            for token_id in members {
                self.records.remove(&(user_id, family_id, token_id));
            }
        }
        if let Some(mut families) = self.users.get_mut(&user_id) {
            families.remove(&family_id);
        }
        Ok(())
    }

    async fn invalidate_user_refresh_tokens(&self, user_id: UserId) -> Result<(), AuthError> {
        if !self.user_scoped_invalidation {
            return Err(AuthError::Configuration(
                "store does not support user-scoped invalidation".to_string(),
            ));
        }
        if let Some((_, families)) = self.users.remove(&user_id) {
            for family_id in families {
                if let Some((_, members)) = self.families.remove(&(user_id, family_id)) {
                    for token_id in members {
                        self.records.remove(&(user_id, family_id, token_id));
                    }
                }
            }
        }
        Ok(())
    }
}
