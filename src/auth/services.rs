use std::sync::Arc;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginOutcome, LoginRequest, NgoRegistrationRequest, PublicUser, SignupRequest},
        jwt::JwtKeys,
        password::PasswordHashing,
        repo::{LoginHistoryRepository, UserRepository},
        repo_types::{LoginHistoryEntry, NewLoginAttempt, NewUser, Provenance, Role},
        validation::{self, Registration},
    },
    config::AdminSeed,
    error::{AuthError, AuthResult},
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Registration, authentication and login-history bookkeeping.
///
/// Role checks are not done here: privileged operations such as
/// [`AuthService::register_ngo`] are guarded by the HTTP layer.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    history: Option<Arc<dyn LoginHistoryRepository>>,
    hasher: PasswordHashing,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, hasher: PasswordHashing, keys: JwtKeys) -> Self {
        Self {
            users,
            history: None,
            hasher,
            keys,
        }
    }

    /// Record every login attempt into `history`.
    pub fn with_history(mut self, history: Arc<dyn LoginHistoryRepository>) -> Self {
        self.history = Some(history);
        self
    }

    #[instrument(skip(self, req))]
    pub async fn register(&self, req: &SignupRequest) -> AuthResult<PublicUser> {
        let reg = validation::validate_signup(req)?;
        let user = self.create_account(reg, Role::Citizen).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, req))]
    pub async fn register_ngo(&self, req: &NgoRegistrationRequest) -> AuthResult<PublicUser> {
        let reg = validation::validate_ngo(req)?;
        let user = self.create_account(reg, Role::Ngo).await?;
        info!(user_id = %user.id, email = %user.email, "ngo registered");
        Ok(user)
    }

    #[instrument(skip(self, req, provenance))]
    pub async fn authenticate(
        &self,
        req: &LoginRequest,
        provenance: Provenance,
    ) -> AuthResult<LoginOutcome> {
        let creds = validation::validate_login(req)?;

        let Some(user) = self.users.find_by_email(&creds.email).await? else {
            warn!(email = %creds.email, "login unknown email");
            self.record_attempt(None, &creds.email, false, &provenance)
                .await?;
            return Err(AuthError::InvalidCredentials);
        };

        let verified = self
            .verify_password(creds.password, user.password_hash.clone())
            .await
            .and_then(|ok| {
                if ok {
                    Ok(self.keys.sign(user.id, user.role)?)
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            });

        let token = match verified {
            Ok(token) => token,
            Err(e) => {
                if matches!(e, AuthError::InvalidCredentials) {
                    warn!(email = %creds.email, user_id = %user.id, "login invalid password");
                }
                self.record_attempt(Some(user.id), &creds.email, false, &provenance)
                    .await?;
                return Err(e);
            }
        };

        self.record_attempt(Some(user.id), &creds.email, true, &provenance)
            .await?;

        info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginOutcome {
            token,
            user: PublicUser::from(&user),
        })
    }

    /// Login history for a user, newest first. Empty when no audit log is wired.
    pub async fn login_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AuthResult<Vec<LoginHistoryEntry>> {
        match &self.history {
            Some(history) => Ok(history.find_by_user_id(user_id, limit).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn login_history_by_email(
        &self,
        email: &str,
        limit: i64,
    ) -> AuthResult<Vec<LoginHistoryEntry>> {
        let email = validation::normalize_email(email);
        match &self.history {
            Some(history) => Ok(history.find_by_email(&email, limit).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Create the bootstrap admin unless an account already holds that email.
    /// Returns the new admin, or `None` when nothing was created.
    #[instrument(skip(self, seed))]
    pub async fn seed_admin(&self, seed: &AdminSeed) -> AuthResult<Option<PublicUser>> {
        let reg = validation::validate_signup(&SignupRequest {
            email: seed.email.clone(),
            password: seed.password.clone(),
            full_name: seed.full_name.clone(),
        })?;

        let email = reg.email.clone();
        match self.create_account(reg, Role::Admin).await {
            Ok(user) => {
                info!(user_id = %user.id, email = %user.email, "admin account seeded");
                Ok(Some(user))
            }
            Err(AuthError::Conflict) => {
                info!(email = %email, "admin account already present");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_account(&self, reg: Registration, role: Role) -> AuthResult<PublicUser> {
        if self.users.find_by_email(&reg.email).await?.is_some() {
            warn!(email = %reg.email, "email already registered");
            return Err(AuthError::Conflict);
        }

        let password_hash = self.hash_password(reg.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: reg.email,
                full_name: reg.full_name,
                password_hash,
                role,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        Ok(PublicUser::from(&user))
    }

    async fn record_attempt(
        &self,
        user_id: Option<Uuid>,
        email: &str,
        success: bool,
        provenance: &Provenance,
    ) -> AuthResult<()> {
        let Some(history) = &self.history else {
            return Ok(());
        };
        history
            .create(NewLoginAttempt {
                user_id,
                email: email.to_owned(),
                success,
                ip_address: provenance.ip_address.clone(),
                user_agent: provenance.user_agent.clone(),
                attempted_at: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(())
    }

    // Argon2 is CPU-bound; keep it off the async workers.
    async fn hash_password(&self, plain: String) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .context("hash task panicked")
            .and_then(|r| r)
            .map_err(AuthError::Internal)
    }

    async fn verify_password(&self, plain: String, hash: String) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .context("verify task panicked")
            .and_then(|r| r)
            .map_err(AuthError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{
            memory::{InMemoryLoginHistoryRepository, InMemoryUserRepository},
            repo::{StoreError, StoreResult},
            repo_types::User,
        },
        config::AppConfig,
    };
    use async_trait::async_trait;

    struct Fixture {
        service: AuthService,
        history: Arc<InMemoryLoginHistoryRepository>,
        keys: JwtKeys,
    }

    fn fixture() -> Fixture {
        let keys = JwtKeys::new(&AppConfig::for_tests().jwt);
        let history = Arc::new(InMemoryLoginHistoryRepository::new());
        let service = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            PasswordHashing::with_params(1024, 1, 1).unwrap(),
            keys.clone(),
        )
        .with_history(history.clone());
        Fixture {
            service,
            history,
            keys,
        }
    }

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: "StrongP@ssw0rd".into(),
            full_name: "Test User".into(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_creates_citizen() {
        let f = fixture();
        let user = f.service.register(&signup("user@example.com")).await.unwrap();
        assert_eq!(user.role, Role::Citizen);
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.full_name, "Test User");
    }

    #[tokio::test]
    async fn register_rejects_case_variant_duplicate() {
        let f = fixture();
        f.service.register(&signup("user@example.com")).await.unwrap();
        let err = f.service.register(&signup("USER@Example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[tokio::test]
    async fn register_ngo_sets_role_and_name() {
        let f = fixture();
        let user = f
            .service
            .register_ngo(&NgoRegistrationRequest {
                email: "ngo@x.com".into(),
                password: "NGoStrong1!".into(),
                organization_name: "Shelter".into(),
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Ngo);
        assert_eq!(user.full_name, "Shelter");
    }

    #[tokio::test]
    async fn authenticate_issues_token_with_role() {
        let f = fixture();
        let user = f.service.register(&signup("user@example.com")).await.unwrap();
        let out = f
            .service
            .authenticate(&login("user@example.com", "StrongP@ssw0rd"), Provenance::default())
            .await
            .unwrap();
        let claims = f.keys.verify(&out.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Citizen);
        assert_eq!(out.user, user);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let f = fixture();
        f.service.register(&signup("user@example.com")).await.unwrap();
        let a = f
            .service
            .authenticate(&login("nobody@example.com", "StrongP@ssw0rd"), Provenance::default())
            .await
            .unwrap_err();
        let b = f
            .service
            .authenticate(&login("user@example.com", "WrongPassword"), Provenance::default())
            .await
            .unwrap_err();
        assert!(matches!(a, AuthError::InvalidCredentials));
        assert!(matches!(b, AuthError::InvalidCredentials));
        assert_eq!(a.to_string(), b.to_string());
    }

    #[tokio::test]
    async fn every_attempt_is_audited_once() {
        let f = fixture();
        let user = f.service.register(&signup("user@example.com")).await.unwrap();
        let prov = Provenance {
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("tests".into()),
        };

        let _ = f
            .service
            .authenticate(&login("user@example.com", "WrongPassword"), prov.clone())
            .await;
        f.service
            .authenticate(&login("User@Example.com", "StrongP@ssw0rd"), prov.clone())
            .await
            .unwrap();
        let _ = f
            .service
            .authenticate(&login("ghost@example.com", "StrongP@ssw0rd"), prov)
            .await;

        let mine = f.service.login_history(user.id, 10).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().any(|e| e.success));
        assert!(mine.iter().any(|e| !e.success));
        assert!(mine.iter().all(|e| e.email == "user@example.com"));
        assert_eq!(mine[0].ip_address.as_deref(), Some("10.0.0.1"));

        let ghost = f.history.find_by_email("ghost@example.com", 10).await.unwrap();
        assert_eq!(ghost.len(), 1);
        assert_eq!(ghost[0].user_id, None);
        assert!(!ghost[0].success);
    }

    #[tokio::test]
    async fn validation_failure_writes_no_audit_entry() {
        let f = fixture();
        let err = f
            .service
            .authenticate(&login("not-an-email", "short"), Provenance::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));
        assert!(f
            .service
            .login_history_by_email("not-an-email", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn authenticate_without_history_still_works() {
        let keys = JwtKeys::new(&AppConfig::for_tests().jwt);
        let service = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            PasswordHashing::with_params(1024, 1, 1).unwrap(),
            keys,
        );
        service.register(&signup("solo@example.com")).await.unwrap();
        service
            .authenticate(&login("solo@example.com", "StrongP@ssw0rd"), Provenance::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn seed_admin_is_idempotent() {
        let f = fixture();
        let seed = AdminSeed {
            email: "Admin@Example.com".into(),
            password: "AdminPass123".into(),
            full_name: "System Administrator".into(),
        };
        let first = f.service.seed_admin(&seed).await.unwrap().unwrap();
        assert_eq!(first.role, Role::Admin);
        assert_eq!(first.email, "admin@example.com");
        assert!(f.service.seed_admin(&seed).await.unwrap().is_none());
    }

    struct BrokenStore;

    #[async_trait]
    impl UserRepository for BrokenStore {
        async fn find_by_email(&self, _email: &str) -> StoreResult<Option<User>> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
        async fn create(&self, _user: NewUser) -> StoreResult<User> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_storage_errors() {
        let service = AuthService::new(
            Arc::new(BrokenStore),
            PasswordHashing::with_params(1024, 1, 1).unwrap(),
            JwtKeys::new(&AppConfig::for_tests().jwt),
        );
        let err = service.register(&signup("user@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    struct CorruptHashStore;

    #[async_trait]
    impl UserRepository for CorruptHashStore {
        async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            Ok(Some(User {
                id: Uuid::new_v4(),
                email: email.to_owned(),
                full_name: "Test User".into(),
                password_hash: "not-a-phc-string".into(),
                role: Role::Citizen,
                created_at: OffsetDateTime::now_utc(),
            }))
        }
        async fn create(&self, _user: NewUser) -> StoreResult<User> {
            Err(StoreError::Backend(anyhow::anyhow!("read-only store")))
        }
    }

    #[tokio::test]
    async fn unreadable_hash_is_audited_as_failure() {
        let history = Arc::new(InMemoryLoginHistoryRepository::new());
        let service = AuthService::new(
            Arc::new(CorruptHashStore),
            PasswordHashing::with_params(1024, 1, 1).unwrap(),
            JwtKeys::new(&AppConfig::for_tests().jwt),
        )
        .with_history(history.clone());

        let err = service
            .authenticate(&login("a@b.co", "StrongP@ssw0rd"), Provenance::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));

        let entries = history.find_by_email("a@b.co", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert!(entries[0].user_id.is_some());
    }

    #[tokio::test]
    async fn seed_admin_leaves_existing_account_alone() {
        let f = fixture();
        let existing = f.service.register(&signup("admin@example.com")).await.unwrap();
        let seeded = f
            .service
            .seed_admin(&AdminSeed {
                email: "ADMIN@example.com".into(),
                password: "AdminPass123".into(),
                full_name: "System Administrator".into(),
            })
            .await
            .unwrap();
        assert!(seeded.is_none());

        let out = f
            .service
            .authenticate(&login("admin@example.com", "StrongP@ssw0rd"), Provenance::default())
            .await
            .unwrap();
        assert_eq!(out.user.id, existing.id);
        assert_eq!(out.user.role, Role::Citizen);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_signups_for_one_email_create_one_account() {
        let f = fixture();
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let service = f.service.clone();
                let email = if i % 2 == 0 { "race@example.com" } else { "Race@Example.COM" };
                tokio::spawn(async move { service.register(&signup(email)).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(AuthError::Conflict) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 15);
    }
}
