use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    jwt::{JwtKeys, SessionToken},
    password::{hash_password, verify_password},
};
use crate::{
    config::BootstrapAdmin,
    error::{AppError, AppResult},
    models::{NewUser, Role, User},
    store::{DuplicateEmail, SessionRepo, Store, UserRepo},
};

/// Self-service signup asks for a real name.
pub const SIGNUP_MIN_NAME_LEN: usize = 2;
/// Accounts made by an admin only need a non-empty name.
pub const ADMIN_MIN_NAME_LEN: usize = 1;
pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Validates and stores a new account. Used by signup (role `user`) and by
/// admins creating accounts with an explicit role.
pub async fn create_account(
    store: &dyn Store,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    min_name_len: usize,
) -> AppResult<User> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if name.chars().count() < min_name_len {
        return Err(AppError::validation(format!(
            "Name must be at least {min_name_len} characters"
        )));
    }
    if !is_valid_email(email) {
        return Err(AppError::validation("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "Password must be at least 6 characters",
        ));
    }

    if store.find_user_by_email(email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::invalid_operation("User already exists"));
    }

    let password_hash = hash_password(password)?;
    let user = store
        .create_user(NewUser {
            name: Some(name.to_string()),
            email: email.to_string(),
            password_hash,
            role,
        })
        .await
        .map_err(insert_error)?;

    info!(user_id = %user.id, role = %user.role, "account created");
    Ok(user)
}

/// A concurrent signup can take the email between the lookup and the insert.
fn insert_error(e: anyhow::Error) -> AppError {
    if e.is::<DuplicateEmail>() {
        warn!("email registered concurrently");
        return AppError::invalid_operation("User already exists");
    }
    AppError::Internal(e)
}

/// Checks credentials, signs a session token and records the session.
/// Unknown email and wrong password fail the same way.
pub async fn authenticate(
    store: &dyn Store,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> AppResult<(User, SessionToken)> {
    let user = match store.find_user_by_email(email.trim()).await? {
        Some(u) => u,
        None => {
            warn!("login for unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let session = keys.issue(user.id, user.role)?;
    store.insert_session(user.id, session.expires_at).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((user, session))
}

/// Creates the configured admin account unless the email is already taken.
pub async fn ensure_bootstrap_admin(
    store: &dyn Store,
    admin: &BootstrapAdmin,
) -> anyhow::Result<()> {
    if let Some(existing) = store.find_user_by_email(&admin.email).await? {
        if !existing.is_admin() {
            warn!(user_id = %existing.id, "bootstrap admin email belongs to a non-admin account");
        }
        return Ok(());
    }
    let user = create_account(
        store,
        "Administrator",
        &admin.email,
        &admin.password,
        Role::Admin,
        ADMIN_MIN_NAME_LEN,
    )
    .await?;
    info!(user_id = %user.id, "bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::JwtConfig, store::MemoryStore};

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 5,
        })
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
    }

    #[tokio::test]
    async fn signup_validation_messages() {
        let store = MemoryStore::new();
        let err = create_account(&store, "A", "a@b.io", "secret1", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.starts_with("Name")));
        let err = create_account(&store, "Ada", "nope", "secret1", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Invalid email"));
        let err = create_account(&store, "Ada", "a@b.io", "12345", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.starts_with("Password")));
    }

    #[tokio::test]
    async fn duplicate_email_is_invalid_operation_regardless_of_case() {
        let store = MemoryStore::new();
        create_account(&store, "Ada", "Ada@Example.com", "secret1", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap();
        let err = create_account(&store, "Other", "ada@example.com", "secret2", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[test]
    fn racing_insert_maps_to_user_already_exists() {
        let err = insert_error(DuplicateEmail.into());
        assert!(matches!(err, AppError::InvalidOperation(ref m) if m == "User already exists"));
        assert!(matches!(insert_error(anyhow::anyhow!("disk full")), AppError::Internal(_)));
    }

    #[tokio::test]
    async fn admin_floor_accepts_one_letter_names() {
        let store = MemoryStore::new();
        let user = create_account(&store, "Q", "q@example.com", "secret1", Role::User, ADMIN_MIN_NAME_LEN)
            .await
            .unwrap();
        assert_eq!(user.name.as_deref(), Some("Q"));
        let err = create_account(&store, "  ", "r@example.com", "secret1", Role::User, ADMIN_MIN_NAME_LEN)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Name is required"));
    }

    #[tokio::test]
    async fn login_does_not_leak_which_part_was_wrong() {
        let store = MemoryStore::new();
        create_account(&store, "Ada", "ada@example.com", "secret1", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap();

        let unknown = authenticate(&store, &keys(), "bob@example.com", "secret1")
            .await
            .unwrap_err();
        let wrong = authenticate(&store, &keys(), "ada@example.com", "nope!!")
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn login_records_a_session_with_token_expiry() {
        let store = MemoryStore::new();
        create_account(&store, "Ada", "ada@example.com", "secret1", Role::User, SIGNUP_MIN_NAME_LEN)
            .await
            .unwrap();
        let (user, session) = authenticate(&store, &keys(), "ADA@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        let counted = store
            .count_sessions_expiring_between(
                session.expires_at,
                session.expires_at + time::Duration::seconds(1),
            )
            .await
            .unwrap();
        assert_eq!(counted, 1);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let store = MemoryStore::new();
        let cfg = BootstrapAdmin {
            email: "root@example.com".into(),
            password: "rootroot".into(),
        };
        ensure_bootstrap_admin(&store, &cfg).await.unwrap();
        ensure_bootstrap_admin(&store, &cfg).await.unwrap();
        let admins = store.list_users_with_role(Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "root@example.com");
    }
}
