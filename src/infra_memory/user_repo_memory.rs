use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

pub struct MemoryUserRepo {
    users: DashMap<UserId, ()>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn insert(&self, user_id: UserId) {
        self.users.insert(user_id, ());
    }

    pub fn remove(&self, user_id: UserId) {
        self.users.remove(&user_id);
    }
}

impl Default for MemoryUserRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn id_exists(&self, user_id: UserId) -> Result<bool, AuthError> {
        Ok(self.users.contains_key(&user_id))
    }
}
