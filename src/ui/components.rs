//! Server-rendered menu page.
//!
//! All view state (open modals, the item being edited, the pending toast)
//! travels in the query string, so every render is a pure function of
//! [`ViewState`], the signed-in identity and the fetched items.

use serde::Deserialize;
use std::fmt::Write;

use crate::db::models::MenuItem;
use crate::session::Identity;
use crate::ui::html::{checked, escape, price};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    SignedIn,
    SignedOut,
    SignInFailed,
    SignUpOk,
    SignUpFailed,
    ItemCreated,
    ItemUpdated,
    ItemDeleted,
    SaveFailed,
    DeleteFailed,
}

impl Notice {
    const ALL: [Notice; 10] = [
        Notice::SignedIn,
        Notice::SignedOut,
        Notice::SignInFailed,
        Notice::SignUpOk,
        Notice::SignUpFailed,
        Notice::ItemCreated,
        Notice::ItemUpdated,
        Notice::ItemDeleted,
        Notice::SaveFailed,
        Notice::DeleteFailed,
    ];

    /// Unknown codes yield `None` and the toast is skipped.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.code() == code)
    }

    pub fn code(self) -> &'static str {
        match self {
            Notice::SignedIn => "signed_in",
            Notice::SignedOut => "signed_out",
            Notice::SignInFailed => "sign_in_failed",
            Notice::SignUpOk => "sign_up_ok",
            Notice::SignUpFailed => "sign_up_failed",
            Notice::ItemCreated => "item_created",
            Notice::ItemUpdated => "item_updated",
            Notice::ItemDeleted => "item_deleted",
            Notice::SaveFailed => "save_failed",
            Notice::DeleteFailed => "delete_failed",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::SignedIn => "Signed in successfully!",
            Notice::SignedOut => "Signed out",
            Notice::SignInFailed => "Invalid email or password",
            Notice::SignUpOk => "Account created! Please check your email to confirm.",
            Notice::SignUpFailed => "Failed to create account",
            Notice::ItemCreated => "Menu item created successfully!",
            Notice::ItemUpdated => "Menu item updated successfully!",
            Notice::ItemDeleted => "Menu item deleted successfully!",
            Notice::SaveFailed => "Failed to save menu item",
            Notice::DeleteFailed => "Failed to delete menu item",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            Notice::SignInFailed | Notice::SignUpFailed | Notice::SaveFailed | Notice::DeleteFailed
        )
    }
}

/// Raw query parameters of the index page. Flags count as set when present.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub auth: Option<String>,
    pub dashboard: Option<String>,
    pub add: Option<String>,
    pub edit: Option<String>,
    pub delete: Option<String>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Editor {
    Add,
    Edit(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub auth_open: bool,
    pub dashboard_open: bool,
    pub editor: Option<Editor>,
    pub delete_target: Option<String>,
    pub notice: Option<Notice>,
}

impl From<PageQuery> for ViewState {
    fn from(query: PageQuery) -> Self {
        let editor = match (query.add, query.edit) {
            (_, Some(id)) if !id.is_empty() => Some(Editor::Edit(id)),
            (Some(_), _) => Some(Editor::Add),
            _ => None,
        };
        Self {
            auth_open: query.auth.is_some(),
            dashboard_open: query.dashboard.is_some(),
            editor,
            delete_target: query.delete.filter(|id| !id.is_empty()),
            notice: query.notice.as_deref().and_then(Notice::from_code),
        }
    }
}

impl ViewState {
    /// Whether rendering needs the unfiltered item list.
    pub fn needs_all_items(&self) -> bool {
        self.dashboard_open || self.editor.is_some() || self.delete_target.is_some()
    }
}

/// Where a form post sends the browser back to.
pub fn redirect_target(dashboard: bool, notice: Notice) -> String {
    if dashboard {
        format!("/?dashboard=1&notice={}", notice.code())
    } else {
        format!("/?notice={}", notice.code())
    }
}

pub struct IndexPage<'a> {
    pub view: &'a ViewState,
    pub identity: Option<&'a Identity>,
    pub available: &'a [MenuItem],
    pub all: &'a [MenuItem],
}

pub fn render_index(page: &IndexPage<'_>) -> String {
    let mut body = String::new();
    body.push_str(&header(page.identity));
    body.push_str("<main>");
    body.push_str(&menu_grid(page.available));
    body.push_str("</main>");

    match page.identity {
        Some(_) => {
            let view = page.view;
            if view.dashboard_open {
                body.push_str(&dashboard(page.all));
            }
            match &view.editor {
                Some(Editor::Add) => body.push_str(&item_form(None)),
                Some(Editor::Edit(id)) => {
                    if let Some(item) = page.all.iter().find(|i| &i.id == id) {
                        body.push_str(&item_form(Some(item)));
                    }
                }
                None => {}
            }
            if let Some(id) = &view.delete_target {
                if page.all.iter().any(|i| &i.id == id) {
                    body.push_str(&delete_confirm(id));
                }
            }
        }
        None => {
            if page.view.auth_open {
                body.push_str(&auth_modal());
            }
        }
    }

    if let Some(notice) = page.view.notice {
        body.push_str(&toast(notice));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>Farm Chef</title>
<style>{PAGE_CSS}</style>
</head>
<body>
{body}
<script>{LIVE_SCRIPT}</script>
</body>
</html>"#
    )
}

pub fn header(identity: Option<&Identity>) -> String {
    let actions = match identity {
        Some(identity) => format!(
            r#"<span class="user-email">{}</span>
<a class="button" href="/?dashboard=1">Dashboard</a>
<form method="post" action="/auth/sign-out"><button type="submit" class="button outline">Sign Out</button></form>"#,
            escape(&identity.email)
        ),
        None => r#"<a class="button" href="/?auth=1">Chef Login</a>"#.to_string(),
    };
    format!(
        r#"<header class="site-header"><h1><a href="/">Farm Chef</a></h1><nav>{actions}</nav></header>"#
    )
}

/// The public grid of available items. Also pushed over the live socket.
pub fn menu_grid(items: &[MenuItem]) -> String {
    let mut cards = String::new();
    for item in items {
        let name = escape(&item.name);
        let image = item
            .image_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!(r#"<div class="card-image"><img src="{}" alt="{name}" /></div>"#, escape(u)))
            .unwrap_or_default();
        let _ = write!(
            cards,
            r#"<article class="card" data-id="{id}">{image}<div class="card-body"><div class="card-title"><h3>{name}</h3><span class="price">{price}</span></div><p class="description">{description}</p><span class="badge">{category}</span></div></article>"#,
            id = escape(&item.id),
            price = price(item.price),
            description = escape(item.description.as_deref().unwrap_or("")),
            category = escape(&item.category),
        );
    }
    format!(
        r#"<section class="menu"><h2>Our Menu</h2><div id="menu-grid" class="grid">{cards}</div></section>"#
    )
}

pub fn auth_modal() -> String {
    modal(
        "Chef Login",
        r#"<form method="post" action="/auth/sign-in" class="stack">
<h3>Sign In</h3>
<label>Email <input type="email" name="email" required /></label>
<label>Password <input type="password" name="password" required /></label>
<button type="submit" class="button">Sign In</button>
</form>
<form method="post" action="/auth/sign-up" class="stack">
<h3>Sign Up</h3>
<label>Email <input type="email" name="email" required /></label>
<label>Password <input type="password" name="password" minlength="6" required /></label>
<button type="submit" class="button outline">Sign Up</button>
</form>"#,
    )
}

pub fn dashboard(items: &[MenuItem]) -> String {
    let mut cards = String::new();
    for item in items {
        let id = escape(&item.id);
        let status = if item.is_available { "" } else { r#"<span class="badge muted">Unavailable</span>"# };
        let _ = write!(
            cards,
            r#"<article class="card compact" data-id="{id}"><div class="card-body"><h3>{name}</h3><p class="description">{description}</p><div class="card-title"><strong>{price}</strong><span class="badge">{category}</span>{status}</div><div class="actions"><a class="button outline" href="/?dashboard=1&amp;edit={id}">Edit</a><a class="button danger" href="/?dashboard=1&amp;delete={id}">Delete</a></div></div></article>"#,
            name = escape(&item.name),
            description = escape(item.description.as_deref().unwrap_or("")),
            price = price(item.price),
            category = escape(&item.category),
        );
    }
    modal(
        "Chef Dashboard",
        &format!(
            r#"<a class="button" href="/?dashboard=1&amp;add=1">Add Item</a><div class="grid">{cards}</div>"#
        ),
    )
}

/// Add form when `item` is `None`, edit form otherwise.
pub fn item_form(item: Option<&MenuItem>) -> String {
    let (title, action) = match item {
        Some(item) => (
            "Edit Menu Item",
            format!("/dashboard/items/{}", escape(&item.id)),
        ),
        None => ("Add Menu Item", "/dashboard/items".to_string()),
    };
    let name = item.map(|i| escape(&i.name)).unwrap_or_default();
    let description = item
        .and_then(|i| i.description.as_deref())
        .map(escape)
        .unwrap_or_default();
    let price_value = item.map(|i| i.price.to_string()).unwrap_or_default();
    let image_url = item
        .and_then(|i| i.image_url.as_deref())
        .map(escape)
        .unwrap_or_default();
    let category = item.map(|i| escape(&i.category)).unwrap_or_else(|| "main".to_string());
    let available = item.is_none_or(|i| i.is_available);

    modal(
        title,
        &format!(
            r#"<form method="post" action="{action}" class="stack">
<label>Name <input type="text" name="name" value="{name}" required /></label>
<label>Description <textarea name="description">{description}</textarea></label>
<label>Price <input type="number" name="price" step="0.01" value="{price_value}" required /></label>
<label>Image URL <input type="url" name="image_url" value="{image_url}" /></label>
<label>Category <input type="text" name="category" value="{category}" required /></label>
<label><input type="checkbox" name="is_available" value="true"{available} /> Available</label>
<div class="actions"><button type="submit" class="button">Save</button><a class="button outline" href="/?dashboard=1">Cancel</a></div>
</form>"#,
            available = checked(available),
        ),
    )
}

pub fn delete_confirm(id: &str) -> String {
    modal(
        "Delete Menu Item",
        &format!(
            r#"<p>Are you sure you want to delete this menu item?</p>
<form method="post" action="/dashboard/items/{}/delete" class="actions">
<button type="submit" class="button danger">Delete</button>
<a class="button outline" href="/?dashboard=1">Cancel</a>
</form>"#,
            escape(id)
        ),
    )
}

pub fn toast(notice: Notice) -> String {
    let (variant, title) = if notice.is_error() {
        ("destructive", "Error")
    } else {
        ("default", "Success")
    };
    format!(
        r#"<div class="toast {variant}" role="status"><strong>{title}</strong><p>{}</p></div>"#,
        notice.message()
    )
}

fn modal(title: &str, content: &str) -> String {
    format!(
        r#"<div class="overlay"><div class="modal" role="dialog"><div class="modal-header"><h2>{title}</h2><a class="close" href="/" aria-label="Close">&times;</a></div>{content}</div></div>"#
    )
}

const LIVE_SCRIPT: &str = r#"
(function () {
  var grid = document.getElementById('menu-grid');
  if (!grid || !window.WebSocket) return;
  var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var socket = new WebSocket(scheme + location.host + '/live/menu');
  socket.onmessage = function (event) {
    var holder = document.createElement('div');
    holder.innerHTML = event.data;
    var next = holder.querySelector('#menu-grid');
    if (next) grid.innerHTML = next.innerHTML;
  };
})();
"#;

pub const PAGE_CSS: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f9fafb; color: #111827; }
a { color: inherit; text-decoration: none; }
.site-header { display: flex; justify-content: space-between; align-items: center; padding: 1rem 2rem; background: white; border-bottom: 1px solid #e5e7eb; }
.site-header nav { display: flex; gap: 0.75rem; align-items: center; }
.site-header form { margin: 0; }
.menu { max-width: 64rem; margin: 0 auto; padding: 2rem 1rem; }
.menu h2 { text-align: center; font-size: 1.875rem; margin-bottom: 2rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(16rem, 1fr)); gap: 1.5rem; }
.card { background: white; border: 1px solid #e5e7eb; border-radius: 0.5rem; overflow: hidden; }
.card-image img { width: 100%; aspect-ratio: 16 / 9; object-fit: cover; }
.card-body { padding: 1rem; }
.card-title { display: flex; justify-content: space-between; align-items: center; gap: 0.5rem; }
.card-title h3 { margin: 0; font-size: 1.125rem; }
.price { font-size: 1.25rem; font-weight: 700; color: #16a34a; }
.description { color: #4b5563; font-size: 0.875rem; }
.badge { display: inline-block; background: #dbeafe; color: #1e40af; font-size: 0.75rem; padding: 0.25rem 0.5rem; border-radius: 9999px; }
.badge.muted { background: #f3f4f6; color: #6b7280; }
.button { display: inline-block; padding: 0.5rem 1rem; background: #111827; color: white; border: 1px solid #111827; border-radius: 0.375rem; cursor: pointer; font-size: 0.875rem; }
.button.outline { background: white; color: #111827; }
.button.danger { background: #dc2626; border-color: #dc2626; }
.overlay { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.5); display: flex; align-items: center; justify-content: center; }
.modal { background: white; border-radius: 0.5rem; padding: 1.5rem; width: min(56rem, 92vw); max-height: 80vh; overflow-y: auto; }
.modal-header { display: flex; justify-content: space-between; align-items: center; }
.close { font-size: 1.5rem; }
.stack { display: flex; flex-direction: column; gap: 0.75rem; margin-bottom: 1.5rem; }
.stack input, .stack textarea { width: 100%; padding: 0.5rem; border: 1px solid #d1d5db; border-radius: 0.375rem; box-sizing: border-box; }
.actions { display: flex; gap: 0.5rem; margin-top: 0.5rem; }
.toast { position: fixed; bottom: 1rem; right: 1rem; background: white; border: 1px solid #e5e7eb; border-radius: 0.5rem; padding: 1rem; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); }
.toast.destructive { background: #dc2626; color: white; }
.toast p { margin: 0.25rem 0 0; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IdentityOrigin;
    use chrono::Utc;

    fn item(id: &str, name: &str, available: bool) -> MenuItem {
        MenuItem {
            id: id.to_string(),
            name: name.to_string(),
            description: Some("Fresh".to_string()),
            price: 5.5,
            image_url: None,
            category: "starter".to_string(),
            is_available: available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn chef() -> Identity {
        Identity {
            id: "u1".to_string(),
            email: "chef@farm.io".to_string(),
            role: Some("chef".to_string()),
            origin: IdentityOrigin::Backend,
        }
    }

    fn view(query: PageQuery) -> ViewState {
        ViewState::from(query)
    }

    #[test]
    fn test_view_state_from_query() {
        let state = view(PageQuery {
            dashboard: Some("1".to_string()),
            add: Some("1".to_string()),
            notice: Some("save_failed".to_string()),
            ..Default::default()
        });
        assert!(state.dashboard_open);
        assert_eq!(state.editor, Some(Editor::Add));
        assert_eq!(state.notice, Some(Notice::SaveFailed));
        assert!(state.needs_all_items());

        let edit = view(PageQuery {
            add: Some("1".to_string()),
            edit: Some("abc".to_string()),
            ..Default::default()
        });
        assert_eq!(edit.editor, Some(Editor::Edit("abc".to_string())));

        assert!(!view(PageQuery::default()).needs_all_items());
    }

    #[test]
    fn test_notice_parses_from_code() {
        assert_eq!(Notice::from_code("item_deleted"), Some(Notice::ItemDeleted));
        assert_eq!(Notice::from_code("bogus"), None);
        for notice in Notice::ALL {
            assert_eq!(Notice::from_code(notice.code()), Some(notice));
        }
        assert_eq!(
            redirect_target(true, Notice::ItemCreated),
            "/?dashboard=1&notice=item_created"
        );
    }

    #[test]
    fn test_menu_grid_formats_items() {
        let html = menu_grid(&[item("a", "Tomato Soup", true)]);
        assert!(html.contains("<h2>Our Menu</h2>"));
        assert!(html.contains(r#"<span class="price">$5.50</span>"#));
        assert!(html.contains(r#"<span class="badge">starter</span>"#));
    }

    #[test]
    fn test_dashboard_requires_identity() {
        let items = [item("a", "Soup", true)];
        let state = view(PageQuery {
            dashboard: Some("1".to_string()),
            ..Default::default()
        });

        let anonymous = render_index(&IndexPage {
            view: &state,
            identity: None,
            available: &items,
            all: &items,
        });
        assert!(!anonymous.contains("Chef Dashboard"));
        assert!(anonymous.contains("Chef Login"));

        let chef = chef();
        let signed_in = render_index(&IndexPage {
            view: &state,
            identity: Some(&chef),
            available: &items,
            all: &items,
        });
        assert!(signed_in.contains("Chef Dashboard"));
        assert!(signed_in.contains("chef@farm.io"));
    }

    #[test]
    fn test_add_form_defaults_to_main_category() {
        let html = item_form(None);
        assert!(html.contains("Add Menu Item"));
        assert!(html.contains(r#"name="category" value="main""#));
        assert!(html.contains(r#"value="true" checked"#));
        assert!(html.contains(r#"action="/dashboard/items""#));
    }

    #[test]
    fn test_edit_form_prefills_item() {
        let html = item_form(Some(&item("abc", "Stew", false)));
        assert!(html.contains("Edit Menu Item"));
        assert!(html.contains(r#"action="/dashboard/items/abc""#));
        assert!(html.contains(r#"name="name" value="Stew""#));
        assert!(!html.contains(r#"value="true" checked"#));
    }

    #[test]
    fn test_delete_confirm_and_toast() {
        let items = [item("abc", "Stew", true)];
        let chef = chef();
        let state = view(PageQuery {
            dashboard: Some("1".to_string()),
            delete: Some("abc".to_string()),
            notice: Some("delete_failed".to_string()),
            ..Default::default()
        });
        let html = render_index(&IndexPage {
            view: &state,
            identity: Some(&chef),
            available: &items,
            all: &items,
        });
        assert!(html.contains("Are you sure you want to delete this menu item?"));
        assert!(html.contains(r#"action="/dashboard/items/abc/delete""#));
        assert!(html.contains(r#"<div class="toast destructive""#));
        assert!(html.contains("Failed to delete menu item"));
    }
}
