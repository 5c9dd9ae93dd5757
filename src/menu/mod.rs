//! Menu data access over the `menu_items` table.

pub mod live;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::{Backend, ChangeEvent, ChangeFilter, Direction, Record, Subscription, Table};
use crate::db::models::{MenuItem, MenuItemPatch, NewMenuItem};
use crate::error::BackendError;

pub use live::LiveMenu;

pub struct MenuItems;

impl Table for MenuItems {
    const NAME: &'static str = "menu_items";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "price",
        "image_url",
        "category",
        "is_available",
        "created_at",
        "updated_at",
    ];

    type Row = MenuItem;

    fn generated(now: DateTime<Utc>) -> Record {
        vec![
            ("id", Uuid::new_v4().to_string().into()),
            ("created_at", now.into()),
            ("updated_at", now.into()),
        ]
    }

    fn touched(now: DateTime<Utc>) -> Record {
        vec![("updated_at", now.into())]
    }
}

impl NewMenuItem {
    fn record(&self) -> Result<Record, BackendError> {
        check_price(self.price)?;
        Ok(vec![
            ("name", self.name.clone().into()),
            ("description", self.description.clone().into()),
            ("price", self.price.into()),
            ("image_url", self.image_url.clone().into()),
            ("category", self.category.clone().into()),
            ("is_available", self.is_available.into()),
        ])
    }
}

impl MenuItemPatch {
    fn record(&self) -> Result<Record, BackendError> {
        let mut record = Record::new();
        if let Some(name) = &self.name {
            record.push(("name", name.clone().into()));
        }
        if let Some(description) = &self.description {
            record.push(("description", description.clone().into()));
        }
        if let Some(price) = self.price {
            check_price(price)?;
            record.push(("price", price.into()));
        }
        if let Some(image_url) = &self.image_url {
            record.push(("image_url", image_url.clone().into()));
        }
        if let Some(category) = &self.category {
            record.push(("category", category.clone().into()));
        }
        if let Some(is_available) = self.is_available {
            record.push(("is_available", is_available.into()));
        }
        Ok(record)
    }
}

fn check_price(price: f64) -> Result<(), BackendError> {
    if price.is_finite() {
        Ok(())
    } else {
        Err(BackendError::InvalidInput("Price must be a number".to_string()))
    }
}

#[derive(Clone)]
pub struct Menu {
    backend: Backend,
}

impl Menu {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Items on offer, newest first.
    pub async fn fetch_available(&self) -> Result<Vec<MenuItem>, BackendError> {
        self.backend
            .from::<MenuItems>()
            .eq("is_available", true)
            .order("created_at", Direction::Descending)
            .select()
            .await
    }

    /// Every item, newest first.
    pub async fn fetch_all(&self) -> Result<Vec<MenuItem>, BackendError> {
        self.backend
            .from::<MenuItems>()
            .order("created_at", Direction::Descending)
            .select()
            .await
    }

    pub async fn create(&self, item: &NewMenuItem) -> Result<MenuItem, BackendError> {
        self.backend
            .from::<MenuItems>()
            .insert(item.record()?)
            .await?
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)
    }

    pub async fn update(&self, id: &str, patch: &MenuItemPatch) -> Result<MenuItem, BackendError> {
        self.write(id, patch.record()?).await
    }

    /// Overwrites every mutable field, clearing optional ones left empty.
    pub async fn replace(&self, id: &str, item: &NewMenuItem) -> Result<MenuItem, BackendError> {
        self.write(id, item.record()?).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let removed = self.backend.from::<MenuItems>().eq("id", id).delete().await?;
        if removed == 0 {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }

    /// Calls `on_change` for every insert, update or delete on the table.
    /// Consumers re-fetch the list; the event is only a signal.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        self.backend
            .realtime()
            .subscribe(ChangeFilter::table(MenuItems::NAME), on_change)
    }

    /// Keeps a re-fetched copy of the list current.
    pub async fn live(&self, available_only: bool) -> Result<LiveMenu, BackendError> {
        LiveMenu::start(self.clone(), available_only).await
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }

    async fn write(&self, id: &str, record: Record) -> Result<MenuItem, BackendError> {
        self.backend
            .from::<MenuItems>()
            .eq("id", id)
            .update(record)
            .await?
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChangeKind, test_backend};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn item(name: &str, category: &str, available: bool) -> NewMenuItem {
        NewMenuItem {
            name: name.to_string(),
            description: Some(format!("{name} of the day")),
            price: 9.0,
            image_url: None,
            category: category.to_string(),
            is_available: available,
        }
    }

    async fn menu() -> Menu {
        Menu::new(test_backend().await)
    }

    #[tokio::test]
    async fn test_available_filter() {
        let menu = menu().await;
        let on = menu.create(&item("Bread", "starter", true)).await.unwrap();
        let off = menu.create(&item("Stew", "main", false)).await.unwrap();

        let available = menu.fetch_available().await.unwrap();
        assert!(available.iter().any(|i| i.id == on.id));
        assert!(!available.iter().any(|i| i.id == off.id));

        let all = menu.fetch_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_tomato_soup_scenario() {
        let menu = menu().await;
        let older = menu.create(&item("Bread", "starter", true)).await.unwrap();

        let soup = menu
            .create(&NewMenuItem {
                name: "Tomato Soup".to_string(),
                description: None,
                price: 5.5,
                image_url: None,
                category: "starter".to_string(),
                is_available: true,
            })
            .await
            .unwrap();
        assert!(soup.is_available);
        assert_eq!(soup.price, 5.5);

        let available = menu.fetch_available().await.unwrap();
        let ids: Vec<_> = available.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, [soup.id.as_str(), older.id.as_str()]);

        let patch = MenuItemPatch {
            is_available: Some(false),
            ..Default::default()
        };
        menu.update(&soup.id, &patch).await.unwrap();

        let available = menu.fetch_available().await.unwrap();
        assert!(!available.iter().any(|i| i.id == soup.id));
        let all = menu.fetch_all().await.unwrap();
        assert!(all.iter().any(|i| i.id == soup.id));
    }

    #[tokio::test]
    async fn test_update_touches_only_submitted_fields() {
        let menu = menu().await;
        let created = menu.create(&item("Bread", "starter", true)).await.unwrap();

        let patch = MenuItemPatch {
            price: Some(3.25),
            category: Some("side".to_string()),
            ..Default::default()
        };
        let updated = menu.update(&created.id, &patch).await.unwrap();

        assert_eq!(updated.price, 3.25);
        assert_eq!(updated.category, "side");
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.description, created.description);
        assert_eq!(updated.is_available, created.is_available);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_with_null_clears_optional_fields() {
        let menu = menu().await;
        let created = menu
            .create(&NewMenuItem {
                image_url: Some("https://img.example/bread.jpg".to_string()),
                ..item("Bread", "starter", true)
            })
            .await
            .unwrap();

        let patch: MenuItemPatch =
            serde_json::from_str(r#"{"description": null, "image_url": null}"#).unwrap();
        let updated = menu.update(&created.id, &patch).await.unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.image_url, None);
        assert_eq!(updated.name, "Bread");

        let patch = MenuItemPatch {
            description: Some(Some("Fresh rye".to_string())),
            ..Default::default()
        };
        let updated = menu.update(&created.id, &patch).await.unwrap();
        assert_eq!(updated.description.as_deref(), Some("Fresh rye"));
        assert_eq!(updated.image_url, None);
    }

    #[tokio::test]
    async fn test_replace_clears_optional_fields() {
        let menu = menu().await;
        let created = menu
            .create(&NewMenuItem {
                image_url: Some("https://img.example/bread.jpg".to_string()),
                ..item("Bread", "starter", true)
            })
            .await
            .unwrap();

        let replaced = menu
            .replace(
                &created.id,
                &NewMenuItem {
                    description: None,
                    ..item("Rye Bread", "starter", false)
                },
            )
            .await
            .unwrap();
        assert_eq!(replaced.name, "Rye Bread");
        assert_eq!(replaced.description, None);
        assert_eq!(replaced.image_url, None);
        assert!(!replaced.is_available);
    }

    #[tokio::test]
    async fn test_delete_removes_item() {
        let menu = menu().await;
        let created = menu.create(&item("Bread", "starter", true)).await.unwrap();

        menu.delete(&created.id).await.unwrap();
        let all = menu.fetch_all().await.unwrap();
        assert!(!all.iter().any(|i| i.id == created.id));

        assert!(matches!(
            menu.delete(&created.id).await,
            Err(BackendError::NotFound)
        ));
        assert!(matches!(
            menu.update(&created.id, &MenuItemPatch::default()).await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_non_finite_price_is_rejected() {
        let menu = menu().await;
        let err = menu
            .create(&NewMenuItem {
                price: f64::NAN,
                ..item("Bread", "starter", true)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
        assert!(menu.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_each_subscriber_refetches_once_per_change() {
        let menu = menu().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut subscriptions = Vec::new();
        for subscriber in 0..2 {
            let tx = tx.clone();
            subscriptions.push(menu.subscribe(move |change| {
                let _ = tx.send((subscriber, change.event));
            }));
        }

        menu.backend().realtime().publish(ChangeEvent::new(
            "orders",
            ChangeKind::Insert,
            None,
            None,
        ));
        let created = menu.create(&item("Bread", "starter", true)).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(next);
        }
        seen.sort_by_key(|(subscriber, _)| *subscriber);
        assert_eq!(seen, [(0, ChangeKind::Insert), (1, ChangeKind::Insert)]);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );

        menu.delete(&created.id).await.unwrap();
        for _ in 0..2 {
            let (_, kind) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(kind, ChangeKind::Delete);
        }
    }
}
