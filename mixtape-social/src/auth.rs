use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use log::warn;
use rand::rngs::OsRng;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::random_string, Database, DatabaseError, NewSession, NewUser, PrimaryKey, SessionData,
    UserData,
};

lazy_static! {
    static ref USERNAME_REGEX: Regex =
        Regex::new(r"^[a-z0-9_.]{2,32}$").expect("username pattern compiles");
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
}

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username, email or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Username must be 2-32 characters of lowercase letters, digits, _ or .")]
    InvalidUsername,
    #[error("Email address is invalid")]
    InvalidEmail,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_DURATION_IN_DAYS: usize = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
        }
    }

    /// Creates a new account. The handle and email are stored lowercase.
    pub async fn register(&self, new_account: NewAccount) -> Result<UserData, AuthError> {
        let username = new_account.username.to_lowercase();
        let email = new_account.email.to_lowercase();

        if !USERNAME_REGEX.is_match(&username) {
            return Err(AuthError::InvalidUsername);
        }

        if !EMAIL_REGEX.is_match(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_account.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .create_user(NewUser {
                username,
                email,
                password: hashed_password,
                display_name: new_account.display_name,
                avatar_url: None,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Logs in a user by handle or email, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = match self.db.user_by_username(&credentials.identifier).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound { .. }) => self
                .db
                .user_by_email(&credentials.identifier)
                .await
                .map_err(|e| match e {
                    DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                    err => AuthError::Db(err),
                })?,
            Err(err) => return Err(AuthError::Db(err)),
        };

        self.verify_password(&user, &credentials.password)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        let new_session = self
            .db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)?;

        Ok(new_session)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    /// Replaces a user's password after verifying the current one
    pub async fn change_password(
        &self,
        user_id: PrimaryKey,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.db.user_by_id(user_id).await.map_err(AuthError::Db)?;

        self.verify_password(&user, current_password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .update_user_password(user_id, hashed_password)
            .await
            .map_err(AuthError::Db)
    }

    fn verify_password(&self, user: &UserData, password: &str) -> Result<(), AuthError> {
        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.db.clear_expired_sessions().await {
            warn!("Failed to clear expired sessions: {}", e);
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    /// The handle or email address of the account
    pub identifier: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::MemoryDatabase;

    fn auth() -> Auth<MemoryDatabase> {
        Auth::new(&Arc::new(MemoryDatabase::new()))
    }

    fn account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
            display_name: "Test User".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let auth = auth();

        let user = auth
            .register(account("Mapleleaf", "maple@example.com"))
            .await
            .expect("registers");

        // Handles are stored lowercase, and the hash never equals the input
        assert_eq!(user.username, "mapleleaf");
        assert_ne!(user.password, "correct horse");

        let session = auth
            .login(Credentials {
                identifier: "mapleleaf".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .expect("logs in by handle");

        assert_eq!(session.user.id, user.id);

        let session = auth
            .login(Credentials {
                identifier: "maple@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .expect("logs in by email");

        assert_eq!(session.user.id, user.id);
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let auth = auth();

        auth.register(account("mapleleaf", "maple@example.com"))
            .await
            .expect("registers");

        let wrong_password = auth
            .login(Credentials {
                identifier: "mapleleaf".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));

        let unknown_user = auth
            .login(Credentials {
                identifier: "nobody".to_string(),
                password: "correct horse".to_string(),
            })
            .await;

        assert!(matches!(unknown_user, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let auth = auth();

        auth.register(account("mapleleaf", "maple@example.com"))
            .await
            .expect("registers");

        let duplicate = auth
            .register(account("mapleleaf", "other@example.com"))
            .await;

        assert!(matches!(
            duplicate,
            Err(AuthError::Db(DatabaseError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_handle_and_email() {
        let auth = auth();

        let bad_handle = auth.register(account("not a handle!", "ok@example.com")).await;
        assert!(matches!(bad_handle, Err(AuthError::InvalidUsername)));

        let bad_email = auth.register(account("mapleleaf", "not-an-email")).await;
        assert!(matches!(bad_email, Err(AuthError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let auth = auth();

        let user = auth
            .register(account("mapleleaf", "maple@example.com"))
            .await
            .expect("registers");

        let wrong_current = auth.change_password(user.id, "wrong", "new password").await;
        assert!(matches!(wrong_current, Err(AuthError::InvalidCredentials)));

        auth.change_password(user.id, "correct horse", "new password")
            .await
            .expect("changes password");

        let session = auth
            .login(Credentials {
                identifier: "mapleleaf".to_string(),
                password: "new password".to_string(),
            })
            .await
            .expect("logs in with the new password");

        assert_eq!(session.user.id, user.id);
    }
}
