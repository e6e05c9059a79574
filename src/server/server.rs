use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let signing_key = std::env::var("JWT_SIGNING_KEY")
            .unwrap_or_else(|_| settings.jwt.secret.clone())
            .into_bytes();
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            access_ttl: Duration::from_secs(settings.jwt.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.jwt.refresh_ttl_secs),
            signing_key,
        }));

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher {});

        let session_store: Arc<dyn SessionFamilyStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemorySessionFamilyStore::new()),
            "redis" => {
                let redis_client = redis::Client::open(settings.store.redis_url.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisSessionFamilyStore::new(
                    redis_manager,
                    settings.store.key_prefix.clone(),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let (user_repo, auth_repo, pool): (Arc<dyn UserRepo>, Arc<dyn AuthRepo>, _) =
            match settings.subjects.backend.as_str() {
                "memory" => (
                    Arc::new(MemoryUserRepo::new()),
                    Arc::new(MemoryAuthRepo::new()),
                    None,
                ),
                "mysql" => {
                    let pool = Pool::<MySql>::connect(&settings.subjects.mysql_url).await?;
                    (
                        Arc::new(MySqlUserRepo::new(pool.clone())),
                        Arc::new(MySqlAuthRepo::new(pool.clone())),
                        Some(pool),
                    )
                }
                other => return Err(anyhow::anyhow!("Unknown subjects backend: {}", other)),
            };

        // Capability problems (e.g. a store without user-scoped
        // invalidation) surface here, before the first request.
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            auth_repo,
            user_repo,
            credential_hasher,
            token_codec,
            session_store,
            settings.jwt.check_access_token,
        )?);

        info!("server started");

        Ok(Self { auth_service, pool })
    }

    pub fn with_auth_service(auth_service: Arc<dyn AuthService>) -> Self {
        Self {
            auth_service,
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
