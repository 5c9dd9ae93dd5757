//! Data, auth and change-notification service behind the app.
//!
//! Everything above this module talks to the backend through [`Backend`]:
//! table queries via [`Backend::from`], per-client auth via
//! [`Backend::auth_client`], and change subscriptions via
//! [`Backend::realtime`]. Failures come back as [`BackendError`] values;
//! nothing is cached or retried here.

pub mod auth;
pub mod listeners;
pub mod query;
pub mod realtime;

use chrono::Duration;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use tracing::info;

use crate::config::{AuthConfig, ProjectConfig};
use crate::db::repo;
use crate::error::BackendError;

pub use auth::{AuthClient, AuthEvent, AuthSubscription, Session, User};
pub use query::{Direction, Query, Record, Table, Value};
pub use realtime::{ChangeEvent, ChangeFilter, ChangeKind, EventFilter, Realtime, Subscription};

const REALTIME_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Backend {
    inner: Arc<Inner>,
}

struct Inner {
    pool: SqlitePool,
    anon_key: String,
    keys: auth::TokenKeys,
    session_ttl: Duration,
    realtime: Realtime,
}

impl Backend {
    pub async fn connect(project: &ProjectConfig, auth: &AuthConfig) -> Result<Self, BackendError> {
        let mut options = SqlitePoolOptions::new().max_connections(5);
        if project.url.contains(":memory:") {
            // Every connection to an in-memory URL is its own database.
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(&project.url).await?;
        repo::create_tables(&pool).await?;
        info!("Backend connected to {}", project.url);

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                anon_key: project.anon_key.clone(),
                keys: auth::TokenKeys::new(&auth.jwt_secret),
                session_ttl: Duration::seconds(auth.session_ttl_seconds),
                realtime: Realtime::new(REALTIME_CAPACITY),
            }),
        })
    }

    pub fn from<T: Table>(&self) -> Query<'_, T> {
        Query::new(self)
    }

    /// A fresh auth client, optionally resuming a previously issued token.
    pub fn auth_client(&self, access_token: Option<String>) -> Arc<AuthClient> {
        Arc::new(AuthClient::new(self.clone(), access_token))
    }

    pub fn realtime(&self) -> &Realtime {
        &self.inner.realtime
    }

    pub fn api_key(&self) -> &str {
        &self.inner.anon_key
    }

    pub fn verify_api_key(&self, key: &str) -> bool {
        !key.is_empty() && key == self.inner.anon_key
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub(crate) fn keys(&self) -> &auth::TokenKeys {
        &self.inner.keys
    }

    pub(crate) fn session_ttl(&self) -> Duration {
        self.inner.session_ttl
    }
}

#[cfg(test)]
pub(crate) async fn test_backend() -> Backend {
    let project = ProjectConfig {
        url: "sqlite::memory:".to_string(),
        anon_key: "test-anon-key".to_string(),
    };
    let auth = AuthConfig {
        jwt_secret: "test-secret".to_string(),
        session_ttl_seconds: 3600,
    };
    Backend::connect(&project, &auth).await.unwrap()
}
