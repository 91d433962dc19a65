//! Core business logic for the authentication system.

use crate::auth::models::{LoginRequest, RegisterRequest, Registration};
use crate::config::Config;
use crate::database::models::{CreateUser, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::revoked_token_repository::RevokedTokenRepository;
use crate::repositories::user_repository::UserRepository;
use crate::repositories::{RepositoryError, UserStore};
use crate::utils::domain::{DnsDomainResolver, DomainResolver, email_domain, is_valid_domain_format};
use crate::utils::invite_code::generate_invite_code;
use crate::utils::jwt::{JwtError, JwtTokenIssuer, JwtUtils, TokenIssuer};
use crate::utils::password::{BcryptPasswordHasher, PasswordError, PasswordHasher};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Registrations give up after this many invite code collisions in a row.
pub const MAX_INVITE_CODE_ATTEMPTS: u32 = 5;

const EMAIL_TAKEN: &str = "The email has already been taken.";

/// Authentication service for registration, login, token resolution and logout
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    domains: Arc<dyn DomainResolver>,
}

impl AuthService {
    /// Create a new AuthService from its capabilities
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        domains: Arc<dyn DomainResolver>,
    ) -> Self {
        AuthService {
            users,
            hasher,
            tokens,
            domains,
        }
    }

    /// Wire the SQLite, bcrypt, JWT and DNS implementations.
    pub fn from_config(config: &Config, pool: SqlitePool) -> Self {
        let tokens = JwtTokenIssuer::new(
            JwtUtils::from_config(config),
            RevokedTokenRepository::new(pool.clone()),
        );

        Self::new(
            Arc::new(UserRepository::new(pool)),
            Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost)),
            Arc::new(tokens),
            Arc::new(DnsDomainResolver::new(Duration::from_secs(
                config.dns_timeout_seconds,
            ))),
        )
    }

    /// Register a new user, optionally attributed to a referrer, and issue a token.
    #[instrument(skip(self, request), fields(email = %request.email.trim()))]
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<Registration> {
        let request = request.normalized();
        request
            .validate()
            .map_err(|errors| ServiceError::from_validation_errors(&errors))?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(ServiceError::field("email", EMAIL_TAKEN));
        }

        let domain = email_domain(&request.email);
        if !is_valid_domain_format(domain) || !self.domains.has_mail_or_address_record(domain).await
        {
            warn!(domain, "Rejected registration with invalid email domain");
            return Err(ServiceError::invalid_domain(domain));
        }

        let password_hash = self
            .hash_password(request.password.clone())
            .await
            .map_err(|e| ServiceError::registration_failed(e.to_string()))?;

        let referral_code = request.referral_code.as_deref();
        let mut attempts = 0;
        let user = loop {
            attempts += 1;
            let new_user = CreateUser {
                id: Uuid::now_v7().to_string(),
                name: request.name.clone(),
                email: request.email.clone(),
                password_hash: password_hash.clone(),
                invite_link: generate_invite_code(),
            };

            match self.users.create_user(new_user, referral_code).await {
                Ok(user) => break user,
                Err(RepositoryError::DuplicateInviteLink) if attempts < MAX_INVITE_CODE_ATTEMPTS => {
                    warn!(attempts, "Invite code collision, retrying with a fresh code");
                }
                Err(RepositoryError::DuplicateEmail) => {
                    return Err(ServiceError::field("email", EMAIL_TAKEN));
                }
                Err(e) => {
                    error!(error = %e, attempts, "Registration transaction rolled back");
                    return Err(ServiceError::registration_failed(e.to_string()));
                }
            }
        };

        if let Some(referrer) = &user.ref_by {
            info!(user_id = %user.id, referrer = %referrer, "Registration attributed to referrer");
        }

        let token = self.tokens.issue(&user.id).await.map_err(|e| {
            error!(user_id = %user.id, error = %e, "Token issuance failed after registration");
            ServiceError::registration_failed(e.to_string())
        })?;

        info!(user_id = %user.id, "User registered");
        Ok(Registration { user, token })
    }

    /// Authenticate credentials and issue a fresh token
    #[instrument(skip(self, request), fields(email = %request.email.trim()))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<String> {
        let email = request.email.trim().to_lowercase();

        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!("Login rejected: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        match self
            .verify_password(request.password, user.password_hash.clone())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = %user.id, "Login rejected: wrong password");
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Login rejected: stored hash unusable");
                return Err(ServiceError::InvalidCredentials);
            }
        }

        let token = self.tokens.issue(&user.id).await.map_err(|e| {
            error!(user_id = %user.id, error = %e, "Token creation failed");
            ServiceError::token_creation_failed(e.to_string())
        })?;

        info!(user_id = %user.id, "User logged in");
        Ok(token)
    }

    /// Resolve the user bound to a token
    pub async fn current_user(&self, token: &str) -> ServiceResult<User> {
        let user_id = self.authenticate(token).await?;

        self.users
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(&user_id))
    }

    /// Revoke a token
    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.tokens.invalidate(token).await.map_err(|e| {
            error!(error = %e, "Logout failed");
            ServiceError::logout_failed(e.to_string())
        })?;

        info!("User logged out");
        Ok(())
    }

    /// Verify a token and return the user id it is bound to
    ///
    /// A revocation store failure is an internal error, not a bad token.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<String> {
        self.tokens.verify(token).await.map_err(|e| match e {
            JwtError::Store(message) => {
                error!(error = %message, "Token revocation lookup failed");
                ServiceError::internal_error(message)
            }
            other => ServiceError::invalid_token(other.to_string()),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, PasswordError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, PasswordError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| PasswordError::Verify(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::mock::MockUserStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// Resolver that knows a fixed set of domains.
    struct StaticResolver {
        domains: HashSet<String>,
        calls: Mutex<u32>,
    }

    impl StaticResolver {
        fn new(domains: &[&str]) -> Self {
            Self {
                domains: domains.iter().map(|d| d.to_string()).collect(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl DomainResolver for StaticResolver {
        async fn has_mail_or_address_record(&self, domain: &str) -> bool {
            *self.calls.lock() += 1;
            self.domains.contains(domain)
        }
    }

    /// Token issuer that hands out opaque counters and remembers revocations.
    #[derive(Default)]
    struct FakeTokens {
        issued: Mutex<HashMap<String, String>>,
        revoked: Mutex<HashSet<String>>,
        fail_issue: bool,
        fail_verify: bool,
        fail_invalidate: bool,
    }

    #[async_trait]
    impl TokenIssuer for FakeTokens {
        async fn issue(&self, user_id: &str) -> Result<String, JwtError> {
            if self.fail_issue {
                return Err(JwtError::EncodingError("signer offline".to_string()));
            }
            let mut issued = self.issued.lock();
            let token = format!("token-{}", issued.len() + 1);
            issued.insert(token.clone(), user_id.to_string());
            Ok(token)
        }

        async fn verify(&self, token: &str) -> Result<String, JwtError> {
            if self.fail_verify {
                return Err(JwtError::Store("revocation store offline".to_string()));
            }
            if self.revoked.lock().contains(token) {
                return Err(JwtError::Revoked);
            }
            self.issued
                .lock()
                .get(token)
                .cloned()
                .ok_or(JwtError::InvalidToken)
        }

        async fn invalidate(&self, token: &str) -> Result<(), JwtError> {
            if self.fail_invalidate {
                return Err(JwtError::Store("revocation store offline".to_string()));
            }
            self.verify(token).await?;
            self.revoked.lock().insert(token.to_string());
            Ok(())
        }
    }

    struct Harness {
        service: AuthService,
        users: Arc<MockUserStore>,
        resolver: Arc<StaticResolver>,
    }

    fn harness_with(users: MockUserStore, tokens: FakeTokens) -> Harness {
        let users = Arc::new(users);
        let resolver = Arc::new(StaticResolver::new(&["example.com", "mail.example.org"]));
        let service = AuthService::new(
            users.clone(),
            Arc::new(BcryptPasswordHasher::new(4)),
            Arc::new(tokens),
            resolver.clone(),
        );
        Harness {
            service,
            users,
            resolver,
        }
    }

    fn harness() -> Harness {
        harness_with(MockUserStore::default(), FakeTokens::default())
    }

    fn register_request(email: &str, referral_code: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "secret-pw".to_string(),
            referral_code: referral_code.map(str::to_string),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_issues_token_and_hashes_password() {
        let h = harness();
        let registration = h
            .service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        assert_eq!(registration.user.email, "ada@example.com");
        assert_eq!(registration.user.ref_by, None);
        assert_eq!(registration.user.invite_link.len(), 10);
        assert_ne!(registration.user.password_hash, "secret-pw");
        assert_eq!(
            h.service.current_user(&registration.token).await.unwrap().id,
            registration.user.id
        );
    }

    #[tokio::test]
    async fn test_register_same_email_twice_fails() {
        let h = harness();
        h.service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        let err = h
            .service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation { fields, .. } => assert_eq!(fields[0].field, "email"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.users.users().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_unresolvable_domain_without_touching_store() {
        let h = harness();

        let err = h
            .service
            .register(register_request("user@nonexistent.invalid-tld-xyz", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDomain { .. }));

        let err = h
            .service
            .register(register_request("user@unregistered.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDomain { .. }));

        // Only the well-formed domain reached DNS.
        assert_eq!(*h.resolver.calls.lock(), 1);
        assert_eq!(*h.users.create_calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let h = harness();
        let mut request = register_request("not-an-email", None);
        request.name = "   ".to_string();
        request.password = "12345".to_string();

        let err = h.service.register(request).await.unwrap_err();
        match err {
            ServiceError::Validation { fields, .. } => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "name", "password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*h.resolver.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_register_with_referral_code_links_referrer() {
        let h = harness();
        let referrer = h
            .service
            .register(register_request("ref@example.com", None))
            .await
            .unwrap()
            .user;

        let referred = h
            .service
            .register(register_request(
                "new@mail.example.org",
                Some(&referrer.invite_link),
            ))
            .await
            .unwrap()
            .user;
        assert_eq!(referred.ref_by, Some(referrer.id));

        let unmatched = h
            .service
            .register(register_request("other@example.com", Some("0000000000")))
            .await
            .unwrap()
            .user;
        assert_eq!(unmatched.ref_by, None);
    }

    #[tokio::test]
    async fn test_invite_code_collision_is_retried() {
        let h = harness_with(
            MockUserStore::default().with_invite_conflicts(2),
            FakeTokens::default(),
        );

        h.service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();
        assert_eq!(*h.users.create_calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_persistent_invite_code_collision_fails_registration() {
        let h = harness_with(
            MockUserStore::default().with_invite_conflicts(MAX_INVITE_CODE_ATTEMPTS),
            FakeTokens::default(),
        );

        let err = h
            .service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RegistrationFailed { .. }));
        assert_eq!(*h.users.create_calls.lock(), MAX_INVITE_CODE_ATTEMPTS);
        assert!(h.users.users().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_registration_failed() {
        let h = harness_with(MockUserStore::default().failing_inserts(), FakeTokens::default());

        let err = h
            .service
            .register(register_request("ada@example.com", Some("abcdefabcd")))
            .await
            .unwrap_err();
        match err {
            ServiceError::RegistrationFailed { message } => {
                assert!(message.contains("injected insert failure"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.users.users().is_empty());
    }

    #[tokio::test]
    async fn test_token_failure_after_insert_is_registration_failed() {
        let tokens = FakeTokens {
            fail_issue: true,
            ..FakeTokens::default()
        };
        let h = harness_with(MockUserStore::default(), tokens);

        let err = h
            .service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RegistrationFailed { .. }));
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let h = harness();
        let registered = h
            .service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap()
            .user;

        let token = h
            .service
            .login(login_request(" ada@example.com ", "secret-pw"))
            .await
            .unwrap();
        let user = h.service.current_user(&token).await.unwrap();
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let h = harness();
        h.service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        let wrong = h
            .service
            .login(login_request("ada@example.com", "wrong-pw"))
            .await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

        let unknown = h
            .service
            .login(login_request("nobody@example.com", "secret-pw"))
            .await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_token_failure() {
        let h = harness();
        h.service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        let failing = AuthService::new(
            h.users.clone(),
            Arc::new(BcryptPasswordHasher::new(4)),
            Arc::new(FakeTokens {
                fail_issue: true,
                ..FakeTokens::default()
            }),
            h.resolver.clone(),
        );
        let err = failing
            .login(login_request("ada@example.com", "secret-pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TokenCreationFailed { .. }));
    }

    #[tokio::test]
    async fn test_current_user_errors() {
        let h = harness();
        let err = h.service.current_user("garbage").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken { .. }));

        let tokens = FakeTokens::default();
        let orphan = tokens.issue("deleted-user").await.unwrap();
        let service = AuthService::new(
            h.users.clone(),
            Arc::new(BcryptPasswordHasher::new(4)),
            Arc::new(tokens),
            h.resolver.clone(),
        );
        let err = service.current_user(&orphan).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let h = harness();
        let token = h
            .service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap()
            .token;

        h.service.logout(&token).await.unwrap();

        let err = h.service.current_user(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_logout_failure() {
        let tokens = FakeTokens {
            fail_invalidate: true,
            ..FakeTokens::default()
        };
        let h = harness_with(MockUserStore::default(), tokens);

        let err = h.service.logout("token-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::LogoutFailed { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_reported_before_domain_lookup() {
        let h = harness();
        h.service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        // Same store, but no domain resolves any more.
        let offline = Arc::new(StaticResolver::new(&[]));
        let service = AuthService::new(
            h.users.clone(),
            Arc::new(BcryptPasswordHasher::new(4)),
            Arc::new(FakeTokens::default()),
            offline.clone(),
        );

        let err = service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation { fields, .. } => {
                assert_eq!(fields[0].field, "email");
                assert_eq!(fields[0].message, EMAIL_TAKEN);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*offline.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let h = harness();
        let registration = h
            .service
            .register(register_request("Ada@Example.com", None))
            .await
            .unwrap();
        assert_eq!(registration.user.email, "ada@example.com");

        let err = h
            .service
            .register(register_request("ADA@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
        assert_eq!(h.users.users().len(), 1);

        let token = h
            .service
            .login(login_request("  ADA@EXAMPLE.COM ", "secret-pw"))
            .await
            .unwrap();
        assert_eq!(
            h.service.authenticate(&token).await.unwrap(),
            registration.user.id
        );
    }

    #[tokio::test]
    async fn test_revocation_store_failure_is_internal() {
        let tokens = FakeTokens {
            fail_verify: true,
            ..FakeTokens::default()
        };
        let h = harness_with(MockUserStore::default(), tokens);

        let err = h.service.authenticate("token-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InternalError { .. }));

        let err = h.service.current_user("token-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InternalError { .. }));
    }

    #[tokio::test]
    async fn test_dns_timeout_rejects_domain() {
        let service = AuthService::new(
            Arc::new(MockUserStore::default()),
            Arc::new(BcryptPasswordHasher::new(4)),
            Arc::new(FakeTokens::default()),
            Arc::new(DnsDomainResolver::new(Duration::ZERO)),
        );

        let err = service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDomain { .. }));
    }
}
