use crate::application_port::*;
use crate::domain_model::*;

/// Subject lookup. The token payload is the only source of the user id;
/// this repo answers whether that subject still exists.
#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn id_exists(&self, user_id: UserId) -> Result<bool, AuthError>;
}
