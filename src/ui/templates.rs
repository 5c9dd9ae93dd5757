//! String templates handed out by the embeddable SDK.
//!
//! The markup mirrors the classes the default stylesheet targets. Every form
//! carries a hidden `form` field naming its kind, so a plain form post can be
//! routed back to the same operation the SDK binding would run.

use std::borrow::Cow;

use crate::db::models::MenuItem;
use crate::ui::html::{escape, price};

pub const STYLE_ELEMENT_ID: &str = "farm-chef-styles";
pub const DEFAULT_FORM_ACTION: &str = "/embed/forms";

#[derive(Debug, Clone)]
pub struct MenuHtmlOptions {
    pub container_class: String,
    pub item_class: String,
    pub show_price: bool,
    pub show_category: bool,
}

impl Default for MenuHtmlOptions {
    fn default() -> Self {
        Self {
            container_class: "farm-chef-menu".to_string(),
            item_class: "farm-chef-menu-item".to_string(),
            show_price: true,
            show_category: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthHtmlOptions {
    pub container_class: String,
    pub show_sign_in: bool,
    pub show_sign_up: bool,
    pub form_action: String,
}

impl Default for AuthHtmlOptions {
    fn default() -> Self {
        Self {
            container_class: "farm-chef-auth".to_string(),
            show_sign_in: true,
            show_sign_up: true,
            form_action: DEFAULT_FORM_ACTION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardHtmlOptions {
    pub container_class: String,
    pub form_action: String,
}

impl Default for DashboardHtmlOptions {
    fn default() -> Self {
        Self {
            container_class: "farm-chef-dashboard".to_string(),
            form_action: DEFAULT_FORM_ACTION.to_string(),
        }
    }
}

pub fn menu_html(items: &[MenuItem], options: &MenuHtmlOptions) -> String {
    let mut html = format!(r#"<div class="{}">"#, escape(&options.container_class));

    for item in items {
        let name = escape(&item.name);
        html.push_str(&format!(
            r#"<div class="{}" data-id="{}">"#,
            escape(&options.item_class),
            escape(&item.id)
        ));
        if let Some(url) = item.image_url.as_deref().filter(|u| !u.is_empty()) {
            html.push_str(&format!(
                r#"<div class="menu-item-image"><img src="{}" alt="{name}" /></div>"#,
                escape(url)
            ));
        }
        html.push_str(r#"<div class="menu-item-content"><div class="menu-item-header">"#);
        html.push_str(&format!(r#"<h3 class="menu-item-name">{name}</h3>"#));
        if options.show_price {
            html.push_str(&format!(
                r#"<span class="menu-item-price">{}</span>"#,
                price(item.price)
            ));
        }
        html.push_str("</div>");
        html.push_str(&format!(
            r#"<p class="menu-item-description">{}</p>"#,
            escape(item.description.as_deref().unwrap_or(""))
        ));
        if options.show_category {
            html.push_str(&format!(
                r#"<span class="menu-item-category">{}</span>"#,
                escape(&item.category)
            ));
        }
        html.push_str("</div></div>");
    }

    html.push_str("</div>");
    html
}

pub fn auth_html(options: &AuthHtmlOptions) -> String {
    let action = escape(&options.form_action);
    let mut html = format!(r#"<div class="{}">"#, escape(&options.container_class));

    if options.show_sign_in {
        html.push_str(&format!(
            r#"<form class="farm-chef-signin-form" method="post" action="{action}">
<input type="hidden" name="form" value="sign_in" />
<h3>Sign In</h3>
<input type="email" name="email" placeholder="Email" required class="signin-email" />
<input type="password" name="password" placeholder="Password" required class="signin-password" />
<button type="submit">Sign In</button>
</form>"#
        ));
    }

    if options.show_sign_up {
        html.push_str(&format!(
            r#"<form class="farm-chef-signup-form" method="post" action="{action}">
<input type="hidden" name="form" value="sign_up" />
<h3>Sign Up</h3>
<input type="email" name="email" placeholder="Email" required class="signup-email" />
<input type="password" name="password" placeholder="Password" required class="signup-password" />
<button type="submit">Sign Up</button>
</form>"#
        ));
    }

    html.push_str(&format!(
        r#"<div class="farm-chef-user-info" style="display: none;">
<p>Welcome, <span class="user-email"></span>!</p>
<form method="post" action="{action}"><input type="hidden" name="form" value="sign_out" /><button type="submit" class="farm-chef-signout">Sign Out</button></form>
</div>"#
    ));
    html.push_str("</div>");
    html
}

pub fn dashboard_html(options: &DashboardHtmlOptions) -> String {
    format!(
        r#"<div class="{}">
<h2>Menu Management Dashboard</h2>
<form class="farm-chef-add-item-form" method="post" action="{}">
<input type="hidden" name="form" value="add_item" />
<h3>Add New Menu Item</h3>
<input type="text" name="name" placeholder="Item Name" required class="item-name" />
<textarea name="description" placeholder="Description" class="item-description"></textarea>
<input type="number" name="price" placeholder="Price" step="0.01" required class="item-price" />
<input type="url" name="image_url" placeholder="Image URL" class="item-image-url" />
<input type="text" name="category" placeholder="Category" required class="item-category" />
<label><input type="checkbox" name="is_available" value="true" class="item-available" checked /> Available</label>
<button type="submit">Add Item</button>
</form>
<div class="farm-chef-menu-items-list"></div>
</div>"#,
        escape(&options.container_class),
        escape(&options.form_action)
    )
}

/// Adds the default stylesheet to `document` once. A document that already
/// carries the style element comes back untouched.
pub fn inject_css(document: &str) -> Cow<'_, str> {
    if document.contains(&format!(r#"id="{STYLE_ELEMENT_ID}""#)) {
        return Cow::Borrowed(document);
    }

    let style = format!(r#"<style id="{STYLE_ELEMENT_ID}">{DEFAULT_CSS}</style>"#);
    match document.find("</head>") {
        Some(at) => {
            let mut out = String::with_capacity(document.len() + style.len());
            out.push_str(&document[..at]);
            out.push_str(&style);
            out.push_str(&document[at..]);
            Cow::Owned(out)
        }
        None => Cow::Owned(format!("{style}{document}")),
    }
}

pub const DEFAULT_CSS: &str = r#"
.farm-chef-menu { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 1rem; padding: 1rem; }
.farm-chef-menu-item { border: 1px solid #e2e8f0; border-radius: 8px; overflow: hidden; transition: box-shadow 0.2s; }
.farm-chef-menu-item:hover { box-shadow: 0 4px 6px -1px rgba(0, 0, 0, 0.1); }
.menu-item-image img { width: 100%; height: 200px; object-fit: cover; }
.menu-item-content { padding: 1rem; }
.menu-item-header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 0.5rem; }
.menu-item-name { margin: 0; font-size: 1.1rem; font-weight: 600; }
.menu-item-price { font-size: 1.2rem; font-weight: bold; color: #16a34a; }
.menu-item-description { color: #64748b; font-size: 0.9rem; margin-bottom: 0.5rem; }
.menu-item-category { background: #e0f2fe; color: #0369a1; padding: 0.25rem 0.5rem; border-radius: 9999px; font-size: 0.75rem; }
.farm-chef-auth { max-width: 400px; margin: 0 auto; padding: 1rem; }
.farm-chef-auth form { margin-bottom: 1rem; }
.farm-chef-auth h3 { margin-bottom: 1rem; }
.farm-chef-auth input { width: 100%; padding: 0.5rem; margin-bottom: 0.5rem; border: 1px solid #e2e8f0; border-radius: 4px; box-sizing: border-box; }
.farm-chef-auth button { width: 100%; padding: 0.75rem; background: #3b82f6; color: white; border: none; border-radius: 4px; cursor: pointer; }
.farm-chef-auth button:hover { background: #2563eb; }
.farm-chef-dashboard { max-width: 800px; margin: 0 auto; padding: 1rem; }
.farm-chef-add-item-form { background: #f8fafc; padding: 1rem; border-radius: 8px; margin-bottom: 2rem; }
.farm-chef-add-item-form input, .farm-chef-add-item-form textarea { width: 100%; padding: 0.5rem; margin-bottom: 0.5rem; border: 1px solid #e2e8f0; border-radius: 4px; box-sizing: border-box; }
.farm-chef-add-item-form button { background: #16a34a; color: white; padding: 0.75rem 1.5rem; border: none; border-radius: 4px; cursor: pointer; }
.farm-chef-add-item-form button:hover { background: #15803d; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(name: &str) -> MenuItem {
        MenuItem {
            id: "item-1".to_string(),
            name: name.to_string(),
            description: None,
            price: 5.5,
            image_url: Some("https://img.example/soup.jpg".to_string()),
            category: "starter".to_string(),
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_menu_html_respects_options() {
        let items = [item("Tomato Soup")];
        let html = menu_html(&items, &MenuHtmlOptions::default());
        assert!(html.starts_with(r#"<div class="farm-chef-menu">"#));
        assert!(html.contains(r#"data-id="item-1""#));
        assert!(html.contains(r#"<span class="menu-item-price">$5.50</span>"#));
        assert!(html.contains(r#"<span class="menu-item-category">starter</span>"#));

        let bare = menu_html(
            &items,
            &MenuHtmlOptions {
                container_class: "specials".to_string(),
                show_price: false,
                show_category: false,
                ..Default::default()
            },
        );
        assert!(bare.starts_with(r#"<div class="specials">"#));
        assert!(!bare.contains("menu-item-price"));
        assert!(!bare.contains("menu-item-category"));
    }

    #[test]
    fn test_menu_html_escapes_item_text() {
        let html = menu_html(&[item("<script>x</script>")], &MenuHtmlOptions::default());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_auth_html_toggles_forms() {
        let both = auth_html(&AuthHtmlOptions::default());
        assert!(both.contains("farm-chef-signin-form"));
        assert!(both.contains("farm-chef-signup-form"));
        assert!(both.contains(r#"class="farm-chef-user-info" style="display: none;""#));

        let sign_in_only = auth_html(&AuthHtmlOptions {
            show_sign_up: false,
            ..Default::default()
        });
        assert!(sign_in_only.contains("farm-chef-signin-form"));
        assert!(!sign_in_only.contains("farm-chef-signup-form"));
    }

    #[test]
    fn test_dashboard_html_has_add_form() {
        let html = dashboard_html(&DashboardHtmlOptions::default());
        assert!(html.contains(r#"<input type="hidden" name="form" value="add_item" />"#));
        assert!(html.contains("item-available"));
        assert!(html.contains("farm-chef-menu-items-list"));
    }

    #[test]
    fn test_inject_css_once() {
        let page = "<html><head><title>x</title></head><body></body></html>";
        let first = inject_css(page);
        assert!(matches!(first, Cow::Owned(_)));
        assert!(first.contains(r#"<style id="farm-chef-styles">"#));
        assert!(first.find("<style").unwrap() < first.find("</head>").unwrap());

        let second = inject_css(&first);
        assert!(matches!(second, Cow::Borrowed(_)));
        assert_eq!(second.matches("<style").count(), 1);

        let fragment = inject_css("<div></div>");
        assert!(fragment.starts_with("<style"));
    }
}
