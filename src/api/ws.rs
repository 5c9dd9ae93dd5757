use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, Stream, StreamExt, stream};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::events::{ClientMessage, ServerMessage};
use crate::api::extract::ApiKey;
use crate::api::server::AppState;
use crate::backend::{Backend, ChangeFilter, Subscription};
use crate::menu::LiveMenu;
use crate::ui::components::menu_grid;

pub async fn realtime_handler(
    _key: ApiKey,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_realtime(socket, state))
}

async fn handle_realtime(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode realtime message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut channel = RealtimeChannel::new(state.backend.clone(), tx.clone());

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => channel.handle(msg),
            Err(e) => ServerMessage::Error {
                message: format!("Invalid message: {e}"),
            },
        };

        if tx.send(reply).is_err() {
            break;
        }
    }

    drop(channel);
    drop(tx);
    let _ = writer.await;
}

/// One client's table subscriptions. Change events go to `outbox`; the
/// reply to each client message is returned to the caller.
pub struct RealtimeChannel {
    backend: Backend,
    outbox: mpsc::UnboundedSender<ServerMessage>,
    subscriptions: HashMap<String, Subscription>,
}

impl RealtimeChannel {
    pub fn new(backend: Backend, outbox: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            backend,
            outbox,
            subscriptions: HashMap::new(),
        }
    }

    pub fn handle(&mut self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::Subscribe { table, .. } if table.is_empty() => ServerMessage::Error {
                message: "Subscription needs a table".to_string(),
            },
            ClientMessage::Subscribe { table, event } => {
                let filter = ChangeFilter {
                    table: table.clone(),
                    event,
                };
                let changes = self.outbox.clone();
                let subscription = self.backend.realtime().subscribe(filter, move |change| {
                    let _ = changes.send(ServerMessage::Change(change));
                });
                // Replacing drops (and stops) any previous subscription on the table.
                self.subscriptions.insert(table.clone(), subscription);
                debug!("Realtime client subscribed to {} ({})", table, event);
                ServerMessage::Subscribed { table, event }
            }
            ClientMessage::Unsubscribe { table } => match self.subscriptions.remove(&table) {
                Some(subscription) => {
                    subscription.unsubscribe();
                    ServerMessage::Unsubscribed { table }
                }
                None => ServerMessage::Error {
                    message: format!("Not subscribed to {table}"),
                },
            },
        }
    }
}

/// Pushes the re-rendered public menu grid on connect and after every change.
pub async fn live_menu_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_live_menu(socket, state))
}

async fn handle_live_menu(mut socket: WebSocket, state: Arc<AppState>) {
    let live = match state.menu.live(true).await {
        Ok(live) => live,
        Err(e) => {
            warn!("Live menu unavailable: {}", e);
            return;
        }
    };
    let mut frames = std::pin::pin!(grid_frames(live));

    loop {
        tokio::select! {
            frame = frames.next() => {
                let Some(frame) = frame else { break };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// The current grid, then one re-rendered grid per re-fetch.
fn grid_frames(live: LiveMenu) -> impl Stream<Item = String> {
    let first = menu_grid(&live.items());
    stream::once(async move { first }).chain(stream::unfold(live, |mut live| async move {
        let items = live.changed().await?;
        Some((menu_grid(&items), live))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChangeKind, EventFilter, test_backend};
    use crate::db::models::NewMenuItem;
    use crate::menu::Menu;
    use std::time::Duration;

    fn bread() -> NewMenuItem {
        NewMenuItem {
            name: "Bread".to_string(),
            description: None,
            price: 3.0,
            image_url: None,
            category: "side".to_string(),
            is_available: true,
        }
    }

    fn subscribe(table: &str, event: EventFilter) -> ClientMessage {
        ClientMessage::Subscribe {
            table: table.to_string(),
            event,
        }
    }

    async fn next_change(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn quiet(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> bool {
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err()
    }

    #[tokio::test]
    async fn test_subscribe_forwards_matching_changes() {
        let backend = test_backend().await;
        let menu = Menu::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = RealtimeChannel::new(backend, tx);

        let reply = channel.handle(subscribe("menu_items", EventFilter::All));
        assert!(matches!(
            reply,
            ServerMessage::Subscribed { ref table, event: EventFilter::All } if table == "menu_items"
        ));

        let created = menu.create(&bread()).await.unwrap();
        match next_change(&mut rx).await {
            ServerMessage::Change(change) => {
                assert_eq!(change.table, "menu_items");
                assert_eq!(change.event, ChangeKind::Insert);
                assert_eq!(change.new.unwrap()["id"], created.id.as_str());
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert!(quiet(&mut rx).await);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_previous_filter() {
        let backend = test_backend().await;
        let menu = Menu::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = RealtimeChannel::new(backend, tx);

        channel.handle(subscribe("menu_items", EventFilter::All));
        channel.handle(subscribe("menu_items", EventFilter::Delete));

        let created = menu.create(&bread()).await.unwrap();
        assert!(quiet(&mut rx).await);

        menu.delete(&created.id).await.unwrap();
        match next_change(&mut rx).await {
            ServerMessage::Change(change) => assert_eq!(change.event, ChangeKind::Delete),
            other => panic!("unexpected message {other:?}"),
        }
        assert!(quiet(&mut rx).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_errors() {
        let backend = test_backend().await;
        let menu = Menu::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = RealtimeChannel::new(backend, tx);

        assert!(matches!(
            channel.handle(subscribe("", EventFilter::All)),
            ServerMessage::Error { ref message } if message == "Subscription needs a table"
        ));

        channel.handle(subscribe("menu_items", EventFilter::All));
        let reply = channel.handle(ClientMessage::Unsubscribe {
            table: "menu_items".to_string(),
        });
        assert!(matches!(reply, ServerMessage::Unsubscribed { ref table } if table == "menu_items"));

        menu.create(&bread()).await.unwrap();
        assert!(quiet(&mut rx).await);

        let reply = channel.handle(ClientMessage::Unsubscribe {
            table: "menu_items".to_string(),
        });
        assert!(matches!(
            reply,
            ServerMessage::Error { ref message } if message == "Not subscribed to menu_items"
        ));
    }

    #[tokio::test]
    async fn test_live_grid_pushed_on_connect_and_change() {
        let menu = Menu::new(test_backend().await);
        let live = menu.live(true).await.unwrap();
        let mut frames = std::pin::pin!(grid_frames(live));

        let first = frames.next().await.unwrap();
        assert!(first.contains("Our Menu"));
        assert!(!first.contains("Bread"));

        menu.create(&bread()).await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), frames.next())
            .await
            .unwrap()
            .unwrap();
        assert!(next.contains("<h3>Bread</h3>"));
        assert!(next.contains("$3.00"));
    }
}
