use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::api::auth::Credentials;
use crate::api::server::AppState;
use crate::api::visitors::{TOKEN_COOKIE, Visitor, clear_cookie, set_cookie};
use crate::db::models::NewMenuItem;
use crate::ui::components::{IndexPage, Notice, PageQuery, ViewState, redirect_target, render_index};

/// Dashboard item form. Everything arrives as text; an unchecked checkbox
/// is simply absent.
#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub image_url: String,
    pub category: String,
    pub is_available: Option<String>,
}

impl ItemForm {
    /// `None` when the price is not a finite number.
    pub fn into_item(self) -> Option<NewMenuItem> {
        let price = self.price.trim().parse::<f64>().ok().filter(|p| p.is_finite())?;
        Some(NewMenuItem {
            name: self.name,
            description: non_empty(self.description),
            price,
            image_url: non_empty(self.image_url),
            category: self.category,
            is_available: self.is_available.is_some(),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(visitor): Extension<Arc<Visitor>>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let view = ViewState::from(query);
    let identity = visitor.auth.current();

    let available = state.menu.fetch_available().await.unwrap_or_else(|e| {
        warn!("Error fetching menu items: {}", e);
        Vec::new()
    });
    let all = if identity.is_some() && view.needs_all_items() {
        state.menu.fetch_all().await.unwrap_or_else(|e| {
            warn!("Error fetching dashboard items: {}", e);
            Vec::new()
        })
    } else {
        Vec::new()
    };

    Html(render_index(&IndexPage {
        view: &view,
        identity: identity.as_ref(),
        available: &available,
        all: &all,
    }))
}

pub async fn sign_in(
    Extension(visitor): Extension<Arc<Visitor>>,
    Form(form): Form<Credentials>,
) -> Response {
    if let Err(e) = visitor.auth.sign_in(&form.email, &form.password).await {
        warn!("Page sign in failed: {}", e);
        return Redirect::to(&auth_redirect(Notice::SignInFailed)).into_response();
    }

    let mut response = Redirect::to(&redirect_target(false, Notice::SignedIn)).into_response();
    if !visitor.auth.is_demo() {
        if let Some(value) = visitor
            .auth
            .client()
            .access_token()
            .and_then(|token| set_cookie(TOKEN_COOKIE, &token))
        {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

pub async fn sign_up(
    Extension(visitor): Extension<Arc<Visitor>>,
    Form(form): Form<Credentials>,
) -> Redirect {
    match visitor.auth.client().sign_up(&form.email, &form.password).await {
        Ok(_) => Redirect::to(&auth_redirect(Notice::SignUpOk)),
        Err(e) => {
            warn!("Page sign up failed: {}", e);
            Redirect::to(&auth_redirect(Notice::SignUpFailed))
        }
    }
}

pub async fn sign_out(Extension(visitor): Extension<Arc<Visitor>>) -> Response {
    if let Err(e) = visitor.auth.sign_out().await {
        warn!("Page sign out failed: {}", e);
    }
    let mut response = Redirect::to(&redirect_target(false, Notice::SignedOut)).into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, clear_cookie(TOKEN_COOKIE));
    response
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(visitor): Extension<Arc<Visitor>>,
    Form(form): Form<ItemForm>,
) -> Redirect {
    if visitor.auth.current().is_none() {
        return Redirect::to("/?auth=1");
    }
    let Some(item) = form.into_item() else {
        return Redirect::to(&editor_redirect(None, Notice::SaveFailed));
    };

    match state.menu.create(&item).await {
        Ok(_) => Redirect::to(&redirect_target(true, Notice::ItemCreated)),
        Err(e) => {
            warn!("Error saving menu item: {}", e);
            Redirect::to(&editor_redirect(None, Notice::SaveFailed))
        }
    }
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(visitor): Extension<Arc<Visitor>>,
    Path(id): Path<String>,
    Form(form): Form<ItemForm>,
) -> Redirect {
    if visitor.auth.current().is_none() {
        return Redirect::to("/?auth=1");
    }
    let Some(item) = form.into_item() else {
        return Redirect::to(&editor_redirect(Some(&id), Notice::SaveFailed));
    };

    match state.menu.replace(&id, &item).await {
        Ok(_) => Redirect::to(&redirect_target(true, Notice::ItemUpdated)),
        Err(e) => {
            warn!("Error saving menu item {}: {}", id, e);
            Redirect::to(&redirect_target(true, Notice::SaveFailed))
        }
    }
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(visitor): Extension<Arc<Visitor>>,
    Path(id): Path<String>,
) -> Redirect {
    if visitor.auth.current().is_none() {
        return Redirect::to("/?auth=1");
    }

    match state.menu.delete(&id).await {
        Ok(()) => Redirect::to(&redirect_target(true, Notice::ItemDeleted)),
        Err(e) => {
            warn!("Error deleting menu item {}: {}", id, e);
            Redirect::to(&redirect_target(true, Notice::DeleteFailed))
        }
    }
}

fn auth_redirect(notice: Notice) -> String {
    format!("/?auth=1&notice={}", notice.code())
}

/// Back to the open editor so the chef can retry.
fn editor_redirect(id: Option<&str>, notice: Notice) -> String {
    match id {
        Some(id) if id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
            format!("/?dashboard=1&edit={id}&notice={}", notice.code())
        }
        Some(_) => redirect_target(true, notice),
        None => format!("/?dashboard=1&add=1&notice={}", notice.code()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(price: &str, available: bool) -> ItemForm {
        ItemForm {
            name: "Tomato Soup".to_string(),
            description: "  ".to_string(),
            price: price.to_string(),
            image_url: String::new(),
            category: "starter".to_string(),
            is_available: available.then(|| "true".to_string()),
        }
    }

    #[test]
    fn test_editor_redirect_keeps_safe_ids_only() {
        assert_eq!(
            editor_redirect(Some("ab-12"), Notice::SaveFailed),
            "/?dashboard=1&edit=ab-12&notice=save_failed"
        );
        assert_eq!(
            editor_redirect(Some("a b\n"), Notice::SaveFailed),
            "/?dashboard=1&notice=save_failed"
        );
        assert_eq!(
            editor_redirect(None, Notice::SaveFailed),
            "/?dashboard=1&add=1&notice=save_failed"
        );
    }

    #[test]
    fn test_item_form_conversion() {
        let item = form("5.5", true).into_item().unwrap();
        assert_eq!(item.price, 5.5);
        assert_eq!(item.description, None);
        assert_eq!(item.image_url, None);
        assert!(item.is_available);

        assert!(!form("5.5", false).into_item().unwrap().is_available);
        assert!(form("", true).into_item().is_none());
        assert!(form("NaN", true).into_item().is_none());
        assert!(form("abc", true).into_item().is_none());
    }
}
