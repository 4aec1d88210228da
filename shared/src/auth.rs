//! Admin authentication: registration, login, logout and the session gate.
//!
//! Passwords are stored as argon2id PHC strings. Sessions are looked up by
//! the SHA-256 digest of the cookie token, so a leaked table does not hand
//! out live sessions.

use crate::error::{ShopError, ShopResult};
use crate::store::Store;
use crate::types::{AdminIdentity, AdminUser, LoginRequest, RegisterRequest, Session};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Result of a successful login: the raw token goes to the cookie only.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub session: Session,
}

pub fn hash_password(password: &str) -> ShopResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ShopError::storage("Password hashing failed", e))
}

/// Constant-time check against a stored PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

/// Burns the same work as a real verification when the email is unknown.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("not-a-real-password").unwrap_or_default())
}

pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn new_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

async fn start_session<S: Store>(
    store: &S,
    admin: &AdminUser,
    ttl: Duration,
) -> ShopResult<SignedIn> {
    let token = new_token();
    let session = Session {
        token_digest: token_digest(&token),
        admin: AdminIdentity::from(admin),
        expires_at: Utc::now() + ttl,
    };
    store.put_session(&session).await?;
    Ok(SignedIn { token, session })
}

pub async fn login<S: Store>(store: &S, req: LoginRequest, ttl: Duration) -> ShopResult<SignedIn> {
    let (email, password) = match (req.email, req.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email.trim().to_lowercase(), password)
        }
        _ => {
            return Err(ShopError::ValidationFailed(vec![
                "Please provide email and password".to_string(),
            ]))
        }
    };

    let admin = store.get_admin_by_email(&email).await?;
    let verified = match &admin {
        Some(admin) => verify_password(&password, &admin.password_hash),
        None => {
            verify_password(&password, dummy_hash());
            false
        }
    };

    match admin {
        Some(admin) if verified => {
            tracing::info!("Admin login: {}", admin.email);
            start_session(store, &admin, ttl).await
        }
        _ => {
            tracing::warn!("Failed admin login for {}", email);
            Err(ShopError::Unauthorized(INVALID_CREDENTIALS.to_string()))
        }
    }
}

/// Creates an admin account and signs it in.
pub async fn register<S: Store>(
    store: &S,
    req: RegisterRequest,
    ttl: Duration,
) -> ShopResult<SignedIn> {
    let filled = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
    let (name, email, password) = match (filled(req.name), filled(req.email), req.password) {
        (Some(name), Some(email), Some(password)) if !password.is_empty() => {
            (name.trim().to_string(), email.trim().to_lowercase(), password)
        }
        _ => {
            return Err(ShopError::ValidationFailed(vec![
                "Please fill all fields".to_string(),
            ]))
        }
    };

    if req.confirm_password.as_deref() != Some(password.as_str()) {
        return Err(ShopError::ValidationFailed(vec![
            "Passwords do not match".to_string(),
        ]));
    }

    if store.get_admin_by_email(&email).await?.is_some() {
        return Err(ShopError::Conflict("Email already registered".to_string()));
    }

    let admin = AdminUser {
        admin_id: uuid::Uuid::new_v4().to_string(),
        name,
        email,
        password_hash: hash_password(&password)?,
        is_admin: true,
        created_at: Utc::now(),
    };
    // Unique insert; also catches a racing registration
    store.insert_admin(&admin).await?;
    tracing::info!("Admin registered: {}", admin.email);

    start_session(store, &admin, ttl).await
}

pub async fn logout<S: Store>(store: &S, token: Option<&str>) -> ShopResult<()> {
    if let Some(token) = token {
        store.delete_session(&token_digest(token)).await?;
    }
    Ok(())
}

/// The gate: resolves a cookie token to the signed-in admin.
pub async fn authenticate<S: Store>(store: &S, token: Option<&str>) -> ShopResult<AdminIdentity> {
    let token = token.ok_or_else(|| ShopError::Unauthorized("Login required".to_string()))?;
    let digest = token_digest(token);

    let session = store
        .get_session(&digest)
        .await?
        .ok_or_else(|| ShopError::Unauthorized("Login required".to_string()))?;

    if session.expires_at <= Utc::now() {
        store.delete_session(&digest).await?;
        return Err(ShopError::Unauthorized("Session expired".to_string()));
    }

    Ok(session.admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registration(email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Shop Admin".to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            confirm_password: Some(confirm.to_string()),
        }
    }

    fn credentials(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "plaintext"));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let ttl = Duration::hours(24);
        let registered = register(&store, registration("Admin@Shop.com", "s3cret!", "s3cret!"), ttl)
            .await
            .unwrap();
        assert_eq!(registered.session.admin.email, "admin@shop.com");

        let signed_in = login(&store, credentials("admin@shop.com", "s3cret!"), ttl)
            .await
            .unwrap();
        let identity = authenticate(&store, Some(&signed_in.token)).await.unwrap();
        assert_eq!(identity.name, "Shop Admin");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let store = MemoryStore::new();
        let ttl = Duration::hours(24);
        register(&store, registration("admin@shop.com", "s3cret!", "s3cret!"), ttl)
            .await
            .unwrap();

        let wrong_password = login(&store, credentials("admin@shop.com", "nope"), ttl).await;
        let unknown_email = login(&store, credentials("ghost@shop.com", "nope"), ttl).await;

        let expected = Err(ShopError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        assert_eq!(wrong_password.map(|_| ()), expected);
        assert_eq!(unknown_email.map(|_| ()), expected);
    }

    #[tokio::test]
    async fn test_registration_rules() {
        let store = MemoryStore::new();
        let ttl = Duration::hours(24);

        let mismatch = register(&store, registration("a@shop.com", "one", "two"), ttl).await;
        assert_eq!(
            mismatch.map(|_| ()),
            Err(ShopError::ValidationFailed(vec!["Passwords do not match".to_string()]))
        );

        let missing = register(&store, RegisterRequest::default(), ttl).await;
        assert_eq!(
            missing.map(|_| ()),
            Err(ShopError::ValidationFailed(vec!["Please fill all fields".to_string()]))
        );

        register(&store, registration("a@shop.com", "pw", "pw"), ttl)
            .await
            .unwrap();
        let duplicate = register(&store, registration("A@shop.com", "pw", "pw"), ttl).await;
        assert_eq!(
            duplicate.map(|_| ()),
            Err(ShopError::Conflict("Email already registered".to_string()))
        );
    }

    #[tokio::test]
    async fn test_logout_and_expiry_close_the_gate() {
        let store = MemoryStore::new();
        let signed_in = register(
            &store,
            registration("admin@shop.com", "pw", "pw"),
            Duration::hours(24),
        )
        .await
        .unwrap();

        logout(&store, Some(&signed_in.token)).await.unwrap();
        assert!(matches!(
            authenticate(&store, Some(&signed_in.token)).await,
            Err(ShopError::Unauthorized(_))
        ));

        let expired = login(
            &store,
            credentials("admin@shop.com", "pw"),
            Duration::seconds(-1),
        )
        .await
        .unwrap();
        assert_eq!(
            authenticate(&store, Some(&expired.token)).await,
            Err(ShopError::Unauthorized("Session expired".to_string()))
        );
        assert!(store
            .get_session(&expired.session.token_digest)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_anonymous_is_rejected() {
        let store = MemoryStore::new();
        assert_eq!(
            authenticate(&store, None).await,
            Err(ShopError::Unauthorized("Login required".to_string()))
        );
    }
}
