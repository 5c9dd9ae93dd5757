//! Per-client auth state.
//!
//! An [`AuthStore`] owns one [`AuthClient`], resolves its existing session on
//! [`AuthStore::init`], mirrors the client's auth events into its own
//! identity slot, and fans every transition out to its listeners as
//! `(identity, event)`.

pub mod demo;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, warn};

use crate::backend::listeners::{ListenerId, Listeners};
use crate::backend::{AuthClient, AuthEvent, AuthSubscription, User};
use crate::error::BackendError;

pub use demo::DemoIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityOrigin {
    Backend,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: Option<String>,
    pub origin: IdentityOrigin,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            origin: IdentityOrigin::Backend,
        }
    }
}

type StoreListener = dyn Fn(Option<&Identity>, AuthEvent) + Send + Sync;

pub struct AuthStore {
    client: Arc<AuthClient>,
    demo: Option<DemoIdentity>,
    current: Mutex<Option<Identity>>,
    listeners: Listeners<StoreListener>,
    subscription: Mutex<Option<AuthSubscription>>,
    initialized: AtomicBool,
}

impl AuthStore {
    pub fn new(client: Arc<AuthClient>, demo: Option<DemoIdentity>) -> Arc<Self> {
        Arc::new(Self {
            client,
            demo,
            current: Mutex::new(None),
            listeners: Listeners::new(),
            subscription: Mutex::new(None),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Option<&Identity>, AuthEvent) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Hooks the store to its client's auth events and resolves the startup
    /// session. Listeners see the result as `INITIAL_SESSION`. Later calls
    /// just return the current identity.
    pub async fn init(self: &Arc<Self>) -> Option<Identity> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return self.current();
        }

        let store: Weak<Self> = Arc::downgrade(self);
        let subscription = self.client.on_auth_state_change(move |event, session| {
            if let Some(store) = store.upgrade() {
                let identity = session.map(|s| Identity::from(&s.user));
                store.set(identity, event);
            }
        });
        *self.subscription.lock() = Some(subscription);

        let identity = match self.client.get_session().await {
            Ok(session) => session.map(|s| Identity::from(&s.user)),
            Err(e) => {
                warn!("Failed to resolve existing session: {}", e);
                None
            }
        };
        self.set(identity.clone(), AuthEvent::InitialSession);
        identity
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        if let Some(demo) = self.demo.as_ref().filter(|d| d.matches(email, password)) {
            warn!("Demo identity signed in; no backend session exists for it");
            let identity = demo.identity();
            self.set(Some(identity.clone()), AuthEvent::SignedIn);
            return Ok(identity);
        }

        let session = self.client.sign_in_with_password(email, password).await?;
        Ok(Identity::from(&session.user))
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        if self.is_demo() {
            debug!("Demo identity signed out locally");
            self.set(None, AuthEvent::SignedOut);
            return Ok(());
        }

        self.client.sign_out().await
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.lock().clone()
    }

    pub fn is_demo(&self) -> bool {
        matches!(
            self.current.lock().as_ref(),
            Some(Identity {
                origin: IdentityOrigin::Demo,
                ..
            })
        )
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    /// Stops mirroring client events. Also happens on drop.
    pub fn teardown(&self) {
        self.subscription.lock().take();
    }

    fn set(&self, identity: Option<Identity>, event: AuthEvent) {
        *self.current.lock() = identity.clone();
        for listener in self.listeners.snapshot() {
            listener(identity.as_ref(), event);
        }
    }
}

impl Drop for AuthStore {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, test_backend};

    type Seen = Arc<Mutex<Vec<(Option<String>, AuthEvent)>>>;

    fn record(store: &AuthStore) -> Seen {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.listen(move |identity, event| {
            sink.lock().push((identity.map(|i| i.email.clone()), event));
        });
        seen
    }

    fn demo() -> Option<DemoIdentity> {
        Some(DemoIdentity::new("chef@farmesilla.com", "FARM1840!"))
    }

    async fn backend_with_chef() -> Backend {
        let backend = test_backend().await;
        backend
            .auth_client(None)
            .sign_up("real@chef.io", "kitchen-pass")
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_init_reports_initial_session() {
        let backend = test_backend().await;
        let store = AuthStore::new(backend.auth_client(None), None);
        let seen = record(&store);

        assert!(store.init().await.is_none());
        assert!(store.init().await.is_none());
        assert_eq!(*seen.lock(), vec![(None, AuthEvent::InitialSession)]);
    }

    #[tokio::test]
    async fn test_init_resumes_stored_token() {
        let backend = backend_with_chef().await;
        let session = backend
            .auth_client(None)
            .sign_in_with_password("real@chef.io", "kitchen-pass")
            .await
            .unwrap();

        let store = AuthStore::new(backend.auth_client(Some(session.access_token)), None);
        let seen = record(&store);
        let identity = store.init().await.unwrap();

        assert_eq!(identity.email, "real@chef.io");
        assert_eq!(identity.origin, IdentityOrigin::Backend);
        assert_eq!(
            *seen.lock(),
            vec![(Some("real@chef.io".to_string()), AuthEvent::InitialSession)]
        );
    }

    #[tokio::test]
    async fn test_demo_sign_in_works_without_backend() {
        let backend = test_backend().await;
        let store = AuthStore::new(backend.auth_client(None), demo());
        store.init().await;
        backend.pool().close().await;

        let identity = store.sign_in("chef@farmesilla.com", "FARM1840!").await.unwrap();
        assert_eq!(identity.id, demo::DEMO_USER_ID);
        assert_eq!(identity.role.as_deref(), Some("chef"));
        assert!(store.is_demo());
        assert_eq!(store.current(), Some(identity));
    }

    #[tokio::test]
    async fn test_demo_sign_out_stays_local() {
        let backend = test_backend().await;
        let store = AuthStore::new(backend.auth_client(None), demo());
        store.init().await;
        let seen = record(&store);

        store.sign_in("chef@farmesilla.com", "FARM1840!").await.unwrap();
        backend.pool().close().await;
        store.sign_out().await.unwrap();

        assert!(store.current().is_none());
        assert_eq!(
            *seen.lock(),
            vec![
                (Some("chef@farmesilla.com".to_string()), AuthEvent::SignedIn),
                (None, AuthEvent::SignedOut),
            ]
        );
    }

    #[tokio::test]
    async fn test_demo_pair_is_ignored_when_disabled() {
        let backend = test_backend().await;
        let store = AuthStore::new(backend.auth_client(None), None);
        store.init().await;

        let err = store
            .sign_in("chef@farmesilla.com", "FARM1840!")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_real_sign_in_mirrors_backend_events() {
        let backend = backend_with_chef().await;
        let store = AuthStore::new(backend.auth_client(None), demo());
        store.init().await;
        let seen = record(&store);

        let identity = store.sign_in("real@chef.io", "kitchen-pass").await.unwrap();
        assert_eq!(store.current(), Some(identity));
        assert!(!store.is_demo());

        let err = store.sign_in("real@chef.io", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));

        assert_eq!(
            *seen.lock(),
            vec![(Some("real@chef.io".to_string()), AuthEvent::SignedIn)]
        );
    }

    #[tokio::test]
    async fn test_real_sign_out_ends_backend_session() {
        let backend = backend_with_chef().await;
        let store = AuthStore::new(backend.auth_client(None), None);
        store.init().await;

        store.sign_in("real@chef.io", "kitchen-pass").await.unwrap();
        let token = store.client().access_token().unwrap();

        store.sign_out().await.unwrap();
        assert!(store.current().is_none());

        let other = backend.auth_client(Some(token));
        assert!(other.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_teardown_stops_mirroring() {
        let backend = backend_with_chef().await;
        let client = backend.auth_client(None);
        let store = AuthStore::new(client.clone(), None);
        store.init().await;
        store.teardown();

        client
            .sign_in_with_password("real@chef.io", "kitchen-pass")
            .await
            .unwrap();
        assert!(store.current().is_none());
    }
}
