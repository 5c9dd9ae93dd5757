use tokio::{sync::watch, task::JoinHandle};
use tracing::warn;

use crate::backend::{ChangeFilter, Table};
use crate::db::models::MenuItem;
use crate::error::BackendError;
use crate::menu::{Menu, MenuItems};

/// A menu list that re-fetches itself on every change to the table.
///
/// Changes are handled one at a time, so the last read always wins.
pub struct LiveMenu {
    rx: watch::Receiver<Vec<MenuItem>>,
    task: JoinHandle<()>,
}

impl LiveMenu {
    pub(crate) async fn start(menu: Menu, available_only: bool) -> Result<Self, BackendError> {
        let mut changes = menu
            .backend()
            .realtime()
            .listen(ChangeFilter::table(MenuItems::NAME));

        let initial = fetch(&menu, available_only).await?;
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while changes.next().await.is_some() {
                match fetch(&menu, available_only).await {
                    Ok(items) => {
                        if tx.send(items).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Menu re-fetch failed: {}", e),
                }
            }
        });

        Ok(Self { rx, task })
    }

    pub fn items(&self) -> Vec<MenuItem> {
        self.rx.borrow().clone()
    }

    /// Waits for the next re-fetch and returns it. `None` once the feed ends.
    pub async fn changed(&mut self) -> Option<Vec<MenuItem>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for LiveMenu {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn fetch(menu: &Menu, available_only: bool) -> Result<Vec<MenuItem>, BackendError> {
    if available_only {
        menu.fetch_available().await
    } else {
        menu.fetch_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_backend;
    use crate::db::models::{MenuItemPatch, NewMenuItem};
    use std::time::Duration;

    fn soup() -> NewMenuItem {
        NewMenuItem {
            name: "Tomato Soup".to_string(),
            description: None,
            price: 5.5,
            image_url: None,
            category: "starter".to_string(),
            is_available: true,
        }
    }

    #[tokio::test]
    async fn test_live_menu_follows_changes() {
        let menu = Menu::new(test_backend().await);
        let mut live = menu.live(true).await.unwrap();
        assert!(live.items().is_empty());

        let created = menu.create(&soup()).await.unwrap();
        let items = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, created.id);

        let hide = MenuItemPatch {
            is_available: Some(false),
            ..Default::default()
        };
        menu.update(&created.id, &hide).await.unwrap();
        let items = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(items.is_empty());
    }
}
