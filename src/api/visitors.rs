//! Per-browser state for the page and embed front ends.
//!
//! A visitor is identified by the `farm_chef_visitor` cookie and owns one
//! [`AuthStore`] (page adapter) and one [`Sdk`] (embed adapter). Real
//! sessions survive eviction through the `farm_chef_token` cookie; demo
//! sessions live only as long as the visitor entry.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::server::AppState;
use crate::backend::Backend;
use crate::session::{AuthStore, DemoIdentity};
use crate::ui::Sdk;

pub const VISITOR_COOKIE: &str = "farm_chef_visitor";
pub const TOKEN_COOKIE: &str = "farm_chef_token";

pub struct Visitor {
    pub id: Uuid,
    pub auth: Arc<AuthStore>,
    pub sdk: Arc<Sdk>,
    last_seen: Mutex<Instant>,
}

impl Visitor {
    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

pub struct Visitors {
    backend: Backend,
    demo: Option<DemoIdentity>,
    entries: RwLock<HashMap<Uuid, Arc<Visitor>>>,
}

impl Visitors {
    pub fn new(backend: Backend, demo: Option<DemoIdentity>) -> Self {
        if demo.is_some() {
            warn!("Demo identity is enabled; its credentials bypass the backend");
        }
        Self {
            backend,
            demo,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Visitor>> {
        let visitor = self.entries.read().get(id).cloned()?;
        visitor.touch();
        Some(visitor)
    }

    /// Registers a new visitor, resuming `access_token` if one is given.
    pub async fn create(&self, access_token: Option<String>) -> Arc<Visitor> {
        let auth = AuthStore::new(
            self.backend.auth_client(access_token.clone()),
            self.demo.clone(),
        );
        auth.init().await;

        let sdk = Sdk::new(self.backend.clone(), access_token);
        if let Err(e) = sdk.init().await {
            warn!("SDK init failed for new visitor: {}", e);
        }
        sdk.ui().attach();

        let visitor = Arc::new(Visitor {
            id: Uuid::new_v4(),
            auth,
            sdk,
            last_seen: Mutex::new(Instant::now()),
        });
        self.entries.write().insert(visitor.id, visitor.clone());
        debug!("Visitor {} registered", visitor.id);
        visitor
    }

    /// Drops visitors idle for at least `ttl`. Returns how many went.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, visitor| visitor.idle_for() < ttl);
        before - entries.len()
    }
}

pub fn spawn_sweeper(visitors: Arc<Visitors>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = visitors.evict_idle(ttl);
            if evicted > 0 {
                info!("Evicted {} idle visitors", evicted);
            }
        }
    })
}

/// Attaches the caller's [`Visitor`] to the request, creating one (and its
/// cookie) on first contact.
pub async fn track(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let known = cookie(headers, VISITOR_COOKIE)
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .and_then(|id| state.visitors.get(&id));

    let (visitor, fresh) = match known {
        Some(visitor) => (visitor, false),
        None => {
            let token = cookie(headers, TOKEN_COOKIE);
            (state.visitors.create(token).await, true)
        }
    };

    request.extensions_mut().insert(visitor.clone());
    let mut response = next.run(request).await;

    if fresh {
        match set_cookie(VISITOR_COOKIE, &visitor.id.to_string()) {
            Some(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            None => warn!("Could not encode visitor cookie"),
        }
    }
    response
}

pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn set_cookie(name: &str, value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")).ok()
}

pub fn clear_cookie(name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"))
        .unwrap_or_else(|_| HeaderValue::from_static(""))
}
