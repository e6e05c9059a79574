use crate::application_port::*;
use crate::domain_port::*;
use dashmap::DashMap;

pub struct MemoryAuthRepo {
    by_username: DashMap<String, AuthCredentialsRecord>,
}

impl MemoryAuthRepo {
    pub fn new() -> Self {
        Self {
            by_username: DashMap::new(),
        }
    }

    pub fn insert(&self, record: AuthCredentialsRecord) {
        self.by_username.insert(record.username.clone(), record);
    }
}

impl Default for MemoryAuthRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuthRepo for MemoryAuthRepo {
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthCredentialsRecord>, AuthError> {
        Ok(self.by_username.get(username).map(|r| r.clone()))
    }
}
