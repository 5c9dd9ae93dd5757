use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::Backend;
use crate::backend::listeners::{ListenerId, Listeners};
use crate::db::models::{AuthSessionRecord, UserRecord};
use crate::db::repo;
use crate::error::BackendError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            role: record.role,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthEvent::InitialSession => write!(f, "INITIAL_SESSION"),
            AuthEvent::SignedIn => write!(f, "SIGNED_IN"),
            AuthEvent::SignedOut => write!(f, "SIGNED_OUT"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    sid: String,
    role: Option<String>,
    iat: usize,
    exp: usize,
}

pub(crate) struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub(crate) fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

type AuthCallback = dyn Fn(AuthEvent, Option<&Session>) + Send + Sync;

/// One client's view of the auth service: its current token plus the
/// callbacks interested in its sign-in state.
///
/// Listeners run synchronously, before the call that changed the state
/// returns.
pub struct AuthClient {
    backend: Backend,
    token: Mutex<Option<String>>,
    listeners: Arc<Listeners<AuthCallback>>,
}

impl AuthClient {
    pub(crate) fn new(backend: Backend, access_token: Option<String>) -> Self {
        Self {
            backend,
            token: Mutex::new(access_token),
            listeners: Arc::new(Listeners::new()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, BackendError> {
        let email = normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::InvalidInput(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let pool = self.backend.pool();
        if repo::get_user_by_email(pool, &email).await?.is_some() {
            return Err(BackendError::EmailTaken);
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: hash_password(password)?,
            role: None,
            created_at: Utc::now(),
        };
        repo::insert_user(pool, &record).await.map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => BackendError::EmailTaken,
            other => BackendError::Database(other),
        })?;

        info!("Registered user {}", record.email);
        Ok(record.into())
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let email = normalize_email(email).map_err(|_| BackendError::InvalidCredentials)?;
        let pool = self.backend.pool();

        let record = repo::get_user_by_email(pool, &email)
            .await?
            .ok_or(BackendError::InvalidCredentials)?;
        if !verify_password(password, &record.password_hash)? {
            return Err(BackendError::InvalidCredentials);
        }

        let now = Utc::now();
        let auth_session = AuthSessionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: record.id.clone(),
            created_at: now,
            expires_at: now + self.backend.session_ttl(),
        };
        repo::insert_session(pool, &auth_session).await?;

        let claims = Claims {
            sub: record.id.clone(),
            email: record.email.clone(),
            sid: auth_session.id.clone(),
            role: record.role.clone(),
            iat: now.timestamp() as usize,
            exp: auth_session.expires_at.timestamp() as usize,
        };
        let access_token = encode(&Header::default(), &claims, &self.backend.keys().encoding)?;

        let session = Session {
            access_token: access_token.clone(),
            token_type: "bearer".to_string(),
            expires_at: auth_session.expires_at,
            user: record.into(),
        };

        *self.token.lock() = Some(access_token);
        debug!("User {} signed in", session.user.email);
        self.notify(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    /// Ends the backend session (if any) and forgets the local token.
    ///
    /// The token is kept when the session row cannot be removed, so the
    /// client stays signed in and may retry.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        if let Some(token) = self.access_token() {
            match self.decode(&token) {
                Ok(claims) => {
                    repo::delete_session(self.backend.pool(), &claims.sid).await?;
                    debug!("User {} signed out", claims.email);
                }
                Err(e) => debug!("Discarding undecodable token on sign out: {}", e),
            }
        }

        self.token.lock().take();
        self.notify(AuthEvent::SignedOut, None);
        Ok(())
    }

    /// Resolves the current token into a live session.
    ///
    /// A token that expired or was signed out elsewhere yields `None` and is
    /// forgotten.
    pub async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };

        match self.resolve(&token).await {
            Ok(session) => Ok(Some(session)),
            Err(BackendError::SessionExpired | BackendError::SessionMissing) => {
                self.forget(&token);
                Ok(None)
            }
            Err(BackendError::Token(e)) => {
                debug!("Stored token rejected: {}", e);
                self.forget(&token);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn on_auth_state_change<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.listeners.add(Arc::new(callback));
        AuthSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    async fn resolve(&self, token: &str) -> Result<Session, BackendError> {
        let claims = self.decode(token)?;
        let pool = self.backend.pool();

        let auth_session = repo::get_session(pool, &claims.sid)
            .await?
            .ok_or(BackendError::SessionMissing)?;
        if auth_session.expires_at <= Utc::now() {
            repo::delete_session(pool, &auth_session.id).await?;
            return Err(BackendError::SessionExpired);
        }

        let user = repo::get_user(pool, &auth_session.user_id)
            .await?
            .ok_or(BackendError::SessionMissing)?;

        Ok(Session {
            access_token: token.to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc
                .timestamp_opt(claims.exp as i64, 0)
                .single()
                .unwrap_or(auth_session.expires_at),
            user: user.into(),
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, BackendError> {
        let data = decode::<Claims>(token, &self.backend.keys().decoding, &Validation::default())
            .map_err(|e| {
                if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) {
                    BackendError::SessionExpired
                } else {
                    BackendError::Token(e)
                }
            })?;
        Ok(data.claims)
    }

    fn forget(&self, token: &str) {
        let mut current = self.token.lock();
        if current.as_deref() == Some(token) {
            *current = None;
        }
    }

    fn notify(&self, event: AuthEvent, session: Option<&Session>) {
        for listener in self.listeners.snapshot() {
            listener(event, session);
        }
    }
}

/// Registration with an [`AuthClient`]; removed on unsubscribe or drop.
pub struct AuthSubscription {
    id: ListenerId,
    listeners: std::sync::Weak<Listeners<AuthCallback>>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

fn normalize_email(email: &str) -> Result<String, BackendError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(BackendError::InvalidInput(format!("Invalid email {email}"))),
    }
}

fn hash_password(password: &str) -> Result<String, BackendError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| BackendError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, BackendError> {
    let parsed = PasswordHash::new(hash).map_err(|e| BackendError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
