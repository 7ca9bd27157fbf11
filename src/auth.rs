//! Authentication module.

use crate::db::{Database, Session, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

const MIN_PASSWORD_LEN: usize = 4;

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to encode salt: {}", e)))?;
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Canonical form of an e-mail address used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
            })
        && !email.chars().any(char::is_whitespace);

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidFormat(format!("Invalid e-mail address: {}", email)))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidFormat(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
    registration_enabled: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, session_duration_days: u32, registration_enabled: bool) -> Self {
        Self {
            db,
            session_duration_days,
            registration_enabled,
        }
    }

    /// Self-service registration. Always creates a regular user.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::Forbidden("Registration is disabled".to_string()));
        }

        self.create_user(name, email, password, "user")
    }

    /// Create a new user (admin function).
    pub fn create_user(&self, name: &str, email: &str, password: &str, role: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::InvalidFormat(
                "Name must be 1-100 characters".to_string(),
            ));
        }

        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if role != "admin" && role != "user" {
            return Err(AppError::InvalidFormat(
                "Role must be 'admin' or 'user'".to_string(),
            ));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
            role: role.to_string(),
            created_at: now_timestamp(),
            last_login: None,
        };

        self.db.create_user(&user)?;
        tracing::info!(email = %user.email, role = %user.role, "User created");
        Ok(user)
    }

    /// Login and create a session.
    pub fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let invalid = || AppError::Unauthorized("Invalid e-mail or password".to_string());

        let user = self
            .db
            .get_user_by_email(&normalize_email(email))?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        self.db.update_user_last_login(&user.id)?;

        let token = generate_token();
        let expires_at = now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60);

        self.db.create_session(&Session {
            token: token.clone(),
            user_id: user.id.clone(),
            expires_at,
        })?;

        Ok((user, token))
    }

    /// Validate a session token and return the user.
    pub fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let Some(session) = self.db.get_session(token)? else {
            return Ok(None);
        };

        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        self.db.get_user_by_id(&session.user_id)
    }

    /// Logout (delete session).
    pub fn logout(&self, token: &str) -> Result<()> {
        self.db.delete_session(token)
    }

    /// Change user password.
    pub fn change_password(&self, email: &str, new_password: &str) -> Result<bool> {
        validate_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.db
            .update_user_password(&normalize_email(email), &password_hash)
    }

    /// Delete a user.
    pub fn delete_user(&self, email: &str) -> Result<bool> {
        self.db.delete_user(&normalize_email(email))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Check if a user is admin.
    pub fn is_admin(&self, user: &User) -> bool {
        user.role == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(registration: bool) -> AuthService {
        AuthService::new(Database::open_memory().unwrap(), 7, registration)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());

        // Fresh salt per hash
        let again = hash_password(password).unwrap();
        assert_ne!(hash, again);
        assert!(verify_password(password, &again).unwrap());
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 43); // Base64 of 32 bytes
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("reader@example.org").is_ok());
        assert!(validate_email("no-at-sign.org").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("reader@localhost").is_err());
        assert!(validate_email("a b@example.org").is_err());
    }

    #[test]
    fn test_register_and_login_case_insensitive_email() {
        let auth = service(true);
        let user = auth
            .register("Ana", "  Ana@Example.org ", "secret")
            .unwrap();
        assert_eq!(user.email, "ana@example.org");
        assert_eq!(user.role, "user");

        let (logged, token) = auth.login("ANA@example.org", "secret").unwrap();
        assert_eq!(logged.id, user.id);
        assert_eq!(auth.validate_token(&token).unwrap().unwrap().id, user.id);

        auth.logout(&token).unwrap();
        assert!(auth.validate_token(&token).unwrap().is_none());
    }

    #[test]
    fn test_bad_credentials() {
        let auth = service(true);
        auth.register("Ana", "ana@example.org", "secret").unwrap();

        assert!(matches!(
            auth.login("ana@example.org", "wrong"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.login("nobody@example.org", "secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_registration_disabled() {
        let auth = service(false);
        assert!(matches!(
            auth.register("Ana", "ana@example.org", "secret"),
            Err(AppError::Forbidden(_))
        ));
        // Admins can still create accounts
        assert!(
            auth.create_user("Admin", "admin@example.org", "secret", "admin")
                .is_ok()
        );
    }

    #[test]
    fn test_duplicate_email() {
        let auth = service(true);
        auth.register("Ana", "ana@example.org", "secret").unwrap();
        assert!(matches!(
            auth.register("Other", "ANA@example.org", "secret"),
            Err(AppError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_change_password() {
        let auth = service(true);
        auth.register("Ana", "ana@example.org", "secret").unwrap();

        assert!(auth.change_password("ana@example.org", "new-secret").unwrap());
        assert!(auth.login("ana@example.org", "secret").is_err());
        assert!(auth.login("ana@example.org", "new-secret").is_ok());
        assert!(!auth.change_password("nobody@example.org", "whatever").unwrap());
    }
}
