use axum::{
    Extension, Form, Json,
    extract::Query,
    http::header,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::visitors::{TOKEN_COOKIE, Visitor, clear_cookie, set_cookie};
use crate::error::ApiError;
use crate::ui::templates::{AuthHtmlOptions, DashboardHtmlOptions, MenuHtmlOptions};
use crate::ui::{FormSubmission, Visibility};

#[derive(Debug, Default, Deserialize)]
pub struct MenuParams {
    pub container_class: Option<String>,
    pub item_class: Option<String>,
    pub show_price: Option<bool>,
    pub show_category: Option<bool>,
}

impl From<MenuParams> for MenuHtmlOptions {
    fn from(params: MenuParams) -> Self {
        let defaults = MenuHtmlOptions::default();
        Self {
            container_class: params.container_class.unwrap_or(defaults.container_class),
            item_class: params.item_class.unwrap_or(defaults.item_class),
            show_price: params.show_price.unwrap_or(defaults.show_price),
            show_category: params.show_category.unwrap_or(defaults.show_category),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthParams {
    pub container_class: Option<String>,
    pub show_sign_in: Option<bool>,
    pub show_sign_up: Option<bool>,
}

impl From<AuthParams> for AuthHtmlOptions {
    fn from(params: AuthParams) -> Self {
        let defaults = AuthHtmlOptions::default();
        Self {
            container_class: params.container_class.unwrap_or(defaults.container_class),
            show_sign_in: params.show_sign_in.unwrap_or(defaults.show_sign_in),
            show_sign_up: params.show_sign_up.unwrap_or(defaults.show_sign_up),
            form_action: defaults.form_action,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub container_class: Option<String>,
}

/// Flat body of any embed form; `form` names which one.
#[derive(Debug, Default, Deserialize)]
pub struct EmbedForm {
    pub form: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    pub is_available: Option<String>,
}

impl TryFrom<EmbedForm> for FormSubmission {
    type Error = ApiError;

    fn try_from(form: EmbedForm) -> Result<Self, Self::Error> {
        match form.form.as_str() {
            "sign_in" => Ok(FormSubmission::SignIn {
                email: form.email,
                password: form.password,
            }),
            "sign_up" => Ok(FormSubmission::SignUp {
                email: form.email,
                password: form.password,
            }),
            "sign_out" => Ok(FormSubmission::SignOut),
            "add_item" => Ok(FormSubmission::AddItem {
                name: form.name,
                description: form.description,
                price: form.price,
                image_url: form.image_url,
                category: form.category,
                is_available: form.is_available.is_some(),
            }),
            other => Err(ApiError::BadRequest(format!("Unknown form {other}"))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormOutcome {
    pub alert: Option<String>,
    pub visibility: Visibility,
}

pub async fn menu(
    Extension(visitor): Extension<Arc<Visitor>>,
    Query(params): Query<MenuParams>,
) -> Result<Html<String>, ApiError> {
    let sdk = &visitor.sdk;
    let items = sdk.menu().get_items().await?;
    Ok(Html(sdk.ui().generate_menu_html(&items, &params.into())))
}

pub async fn auth(
    Extension(visitor): Extension<Arc<Visitor>>,
    Query(params): Query<AuthParams>,
) -> Html<String> {
    let ui = visitor.sdk.ui();
    let html = ui.generate_auth_html(&params.into());
    Html(ui.visibility().apply(&html))
}

pub async fn dashboard(
    Extension(visitor): Extension<Arc<Visitor>>,
    Query(params): Query<DashboardParams>,
) -> Html<String> {
    let mut options = DashboardHtmlOptions::default();
    if let Some(class) = params.container_class {
        options.container_class = class;
    }
    Html(visitor.sdk.ui().generate_dashboard_html(&options))
}

pub async fn styles(Extension(visitor): Extension<Arc<Visitor>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        visitor.sdk.ui().default_css(),
    )
}

/// Runs an embed form. Sign-in and sign-out also keep the token cookie in
/// step with the SDK session.
pub async fn submit(
    Extension(visitor): Extension<Arc<Visitor>>,
    Form(form): Form<EmbedForm>,
) -> Result<Response, ApiError> {
    let submission = FormSubmission::try_from(form)?;
    let signs_in = matches!(submission, FormSubmission::SignIn { .. });
    let signs_out = submission == FormSubmission::SignOut;

    let ui = visitor.sdk.ui();
    let alert = ui.submit(submission).await;
    let mut response = Json(FormOutcome {
        alert,
        visibility: ui.visibility(),
    })
    .into_response();

    if signs_in && visitor.sdk.auth().current_user().is_some() {
        if let Some(value) = visitor
            .sdk
            .auth()
            .access_token()
            .and_then(|token| set_cookie(TOKEN_COOKIE, &token))
        {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    } else if signs_out {
        response
            .headers_mut()
            .append(header::SET_COOKIE, clear_cookie(TOKEN_COOKIE));
    }
    Ok(response)
}
