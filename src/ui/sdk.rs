//! Embeddable SDK facade.
//!
//! An [`Sdk`] bundles one auth client with the menu operations and the HTML
//! generators a host page embeds. Operations are grouped the way a host
//! calls them: [`Sdk::auth`], [`Sdk::menu`] and [`Sdk::ui`].

use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::backend::listeners::{ListenerId, Listeners};
use crate::backend::{
    AuthClient, AuthEvent, AuthSubscription, Backend, ChangeEvent, Session, Subscription, User,
};
use crate::db::models::{MenuItem, MenuItemPatch, NewMenuItem};
use crate::error::BackendError;
use crate::menu::Menu;
use crate::ui::html::escape;
use crate::ui::templates::{self, AuthHtmlOptions, DashboardHtmlOptions, MenuHtmlOptions};

type SdkListener = dyn Fn(Option<&User>, AuthEvent) + Send + Sync;

/// Which half of the auth widget is showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub forms_visible: bool,
    pub user_info_visible: bool,
    pub user_email: Option<String>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl Visibility {
    fn signed_out() -> Self {
        Self {
            forms_visible: true,
            user_info_visible: false,
            user_email: None,
        }
    }

    fn for_user(user: Option<&User>) -> Self {
        match user {
            Some(user) => Self {
                forms_visible: false,
                user_info_visible: true,
                user_email: Some(user.email.clone()),
            },
            None => Self::signed_out(),
        }
    }

    /// Applies this state to markup from [`templates::auth_html`].
    pub fn apply(&self, html: &str) -> String {
        if !self.user_info_visible {
            return html.to_string();
        }

        let email = escape(self.user_email.as_deref().unwrap_or(""));
        html.replace(
            r#"class="farm-chef-user-info" style="display: none;""#,
            r#"class="farm-chef-user-info" style="display: block;""#,
        )
        .replace(
            r#"<span class="user-email"></span>"#,
            &format!(r#"<span class="user-email">{email}</span>"#),
        )
        .replace(
            r#"<form class="farm-chef-signin-form""#,
            r#"<form class="farm-chef-signin-form" style="display: none;""#,
        )
        .replace(
            r#"<form class="farm-chef-signup-form""#,
            r#"<form class="farm-chef-signup-form" style="display: none;""#,
        )
    }
}

/// A submitted embed form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmission {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
    },
    SignOut,
    AddItem {
        name: String,
        description: String,
        price: String,
        image_url: String,
        category: String,
        is_available: bool,
    },
}

struct State {
    current_user: Mutex<Option<User>>,
    listeners: Listeners<SdkListener>,
    visibility: Mutex<Visibility>,
}

impl State {
    fn set(&self, user: Option<User>, event: AuthEvent) {
        *self.current_user.lock() = user.clone();
        for listener in self.listeners.snapshot() {
            listener(user.as_ref(), event);
        }
    }
}

pub struct Sdk {
    client: Arc<AuthClient>,
    menu: Menu,
    state: Arc<State>,
    initialized: OnceCell<()>,
    auth_subscription: Mutex<Option<AuthSubscription>>,
    attached: AtomicBool,
}

impl Sdk {
    pub fn new(backend: Backend, access_token: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            client: backend.auth_client(access_token),
            menu: Menu::new(backend),
            state: Arc::new(State {
                current_user: Mutex::new(None),
                listeners: Listeners::new(),
                visibility: Mutex::new(Visibility::default()),
            }),
            initialized: OnceCell::new(),
            auth_subscription: Mutex::new(None),
            attached: AtomicBool::new(false),
        })
    }

    /// Hooks the client's auth events and resolves any existing session.
    /// Runs once; later calls return immediately.
    pub async fn init(&self) -> Result<(), BackendError> {
        self.initialized
            .get_or_try_init(|| async {
                let state: Weak<State> = Arc::downgrade(&self.state);
                let subscription = self.client.on_auth_state_change(move |event, session| {
                    if let Some(state) = state.upgrade() {
                        state.set(session.map(|s| s.user.clone()), event);
                    }
                });
                *self.auth_subscription.lock() = Some(subscription);

                let session = self.client.get_session().await?;
                *self.state.current_user.lock() = session.map(|s| s.user);
                info!("SDK initialized");
                Ok::<(), BackendError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    pub fn auth(&self) -> SdkAuth<'_> {
        SdkAuth { sdk: self }
    }

    pub fn menu(&self) -> SdkMenu<'_> {
        SdkMenu { sdk: self }
    }

    pub fn ui(&self) -> SdkUi<'_> {
        SdkUi { sdk: self }
    }
}

pub struct SdkAuth<'a> {
    sdk: &'a Sdk,
}

impl SdkAuth<'_> {
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, BackendError> {
        self.sdk.client.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.sdk.client.sign_in_with_password(email, password).await
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.sdk.client.sign_out().await
    }

    pub fn current_user(&self) -> Option<User> {
        self.sdk.state.current_user.lock().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.sdk.client.access_token()
    }

    /// Registers `callback` for every auth transition after [`Sdk::init`].
    pub fn on_auth_state_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(Option<&User>, AuthEvent) + Send + Sync + 'static,
    {
        self.sdk.state.listeners.add(Arc::new(callback))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.sdk.state.listeners.remove(id)
    }
}

pub struct SdkMenu<'a> {
    sdk: &'a Sdk,
}

impl SdkMenu<'_> {
    pub async fn get_items(&self) -> Result<Vec<MenuItem>, BackendError> {
        self.sdk.menu.fetch_available().await
    }

    pub async fn get_all_items(&self) -> Result<Vec<MenuItem>, BackendError> {
        self.sdk.menu.fetch_all().await
    }

    pub async fn create_item(&self, item: &NewMenuItem) -> Result<MenuItem, BackendError> {
        self.sdk.menu.create(item).await
    }

    pub async fn update_item(
        &self,
        id: &str,
        patch: &MenuItemPatch,
    ) -> Result<MenuItem, BackendError> {
        self.sdk.menu.update(id, patch).await
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), BackendError> {
        self.sdk.menu.delete(id).await
    }

    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        self.sdk.menu.subscribe(on_change)
    }
}

pub struct SdkUi<'a> {
    sdk: &'a Sdk,
}

impl SdkUi<'_> {
    pub fn generate_menu_html(&self, items: &[MenuItem], options: &MenuHtmlOptions) -> String {
        templates::menu_html(items, options)
    }

    pub fn generate_auth_html(&self, options: &AuthHtmlOptions) -> String {
        templates::auth_html(options)
    }

    pub fn generate_dashboard_html(&self, options: &DashboardHtmlOptions) -> String {
        templates::dashboard_html(options)
    }

    pub fn default_css(&self) -> &'static str {
        templates::DEFAULT_CSS
    }

    pub fn inject_css<'d>(&self, document: &'d str) -> Cow<'d, str> {
        templates::inject_css(document)
    }

    /// Binds form handling and starts tracking widget visibility. Only the
    /// first call does anything.
    pub fn attach(&self) -> bool {
        if self.sdk.attached.swap(true, Ordering::SeqCst) {
            return false;
        }

        *self.sdk.state.visibility.lock() =
            Visibility::for_user(self.sdk.state.current_user.lock().as_ref());

        let state: Weak<State> = Arc::downgrade(&self.sdk.state);
        self.sdk.state.listeners.add(Arc::new(move |user, _event| {
            if let Some(state) = state.upgrade() {
                *state.visibility.lock() = Visibility::for_user(user);
            }
        }));
        debug!("SDK forms attached");
        true
    }

    pub fn is_attached(&self) -> bool {
        self.sdk.attached.load(Ordering::SeqCst)
    }

    pub fn visibility(&self) -> Visibility {
        self.sdk.state.visibility.lock().clone()
    }

    /// Runs a submitted form and returns the alert to show, if any.
    /// Submissions before [`SdkUi::attach`] are ignored.
    pub async fn submit(&self, form: FormSubmission) -> Option<String> {
        if !self.is_attached() {
            debug!("Ignoring form submission on unattached SDK");
            return None;
        }

        let auth = self.sdk.auth();
        match form {
            FormSubmission::SignIn { email, password } => match auth.sign_in(&email, &password).await {
                Ok(_) => None,
                Err(e) => Some(format!("Sign in failed: {e}")),
            },
            FormSubmission::SignUp { email, password } => match auth.sign_up(&email, &password).await {
                Ok(_) => Some("Sign up successful! Please check your email to confirm.".to_string()),
                Err(e) => Some(format!("Sign up failed: {e}")),
            },
            FormSubmission::SignOut => {
                if let Err(e) = auth.sign_out().await {
                    warn!("SDK sign out failed: {}", e);
                }
                None
            }
            FormSubmission::AddItem {
                name,
                description,
                price,
                image_url,
                category,
                is_available,
            } => {
                let Some(price) = price.trim().parse::<f64>().ok().filter(|p| p.is_finite()) else {
                    return Some("Failed to add item: Price must be a number".to_string());
                };
                let item = NewMenuItem {
                    name,
                    description: non_empty(description),
                    price,
                    image_url: non_empty(image_url),
                    category,
                    is_available,
                };
                match self.sdk.menu().create_item(&item).await {
                    Ok(_) => Some("Item added successfully!".to_string()),
                    Err(e) => Some(format!("Failed to add item: {e}")),
                }
            }
        }
    }
}

impl Drop for Sdk {
    fn drop(&mut self) {
        self.auth_subscription.lock().take();
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}
