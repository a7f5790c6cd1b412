use std::sync::Arc;

use crate::{
    auth::{
        jwt::JwtKeys,
        memory::{InMemoryLoginHistoryRepository, InMemoryUserRepository},
        password::PasswordHashing,
        repo::{PgLoginHistoryRepository, PgUserRepository},
        services::AuthService,
    },
    config::AppConfig,
    db,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub auth: AuthService,
}

impl AppState {
    /// Postgres-backed state. Migrations are applied before returning.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await?;

        let keys = JwtKeys::new(&config.jwt);
        let auth = AuthService::new(
            Arc::new(PgUserRepository::new(pool.clone())),
            PasswordHashing::default(),
            keys.clone(),
        )
        .with_history(Arc::new(PgLoginHistoryRepository::new(pool)));

        Ok(Self { config, keys, auth })
    }

    /// State backed by in-process stores, including the login history.
    pub fn in_memory(config: AppConfig, hasher: PasswordHashing) -> Self {
        let config = Arc::new(config);
        let keys = JwtKeys::new(&config.jwt);
        let auth = AuthService::new(Arc::new(InMemoryUserRepository::new()), hasher, keys.clone())
            .with_history(Arc::new(InMemoryLoginHistoryRepository::new()));
        Self { config, keys, auth }
    }

    pub fn fake() -> Self {
        let hasher = PasswordHashing::with_params(1024, 1, 1).unwrap_or_default();
        Self::in_memory(AppConfig::for_tests(), hasher)
    }
}
