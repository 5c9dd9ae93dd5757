use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscriber wants. `*` matches all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    #[serde(rename = "*")]
    All,
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (EventFilter::All, _)
                | (EventFilter::Insert, ChangeKind::Insert)
                | (EventFilter::Update, ChangeKind::Update)
                | (EventFilter::Delete, ChangeKind::Delete)
        )
    }
}

impl FromStr for EventFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "*" => Ok(EventFilter::All),
            "INSERT" => Ok(EventFilter::Insert),
            "UPDATE" => Ok(EventFilter::Update),
            "DELETE" => Ok(EventFilter::Delete),
            other => Err(format!("unknown event filter {other}")),
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::All => write!(f, "*"),
            EventFilter::Insert => write!(f, "INSERT"),
            EventFilter::Update => write!(f, "UPDATE"),
            EventFilter::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub table: String,
    pub event: EventFilter,
}

impl ChangeFilter {
    /// Every change on `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            event: EventFilter::All,
        }
    }

    pub fn matches(&self, change: &ChangeEvent) -> bool {
        self.table == change.table && self.event.matches(change.event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub event: ChangeKind,
    pub new: Option<serde_json::Value>,
    pub old: Option<serde_json::Value>,
    pub commit_timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        table: impl Into<String>,
        event: ChangeKind,
        new: Option<serde_json::Value>,
        old: Option<serde_json::Value>,
    ) -> Self {
        Self {
            table: table.into(),
            event,
            new,
            old,
            commit_timestamp: Utc::now(),
        }
    }
}

/// Change feed for every table the backend owns.
#[derive(Clone)]
pub struct Realtime {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Realtime {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Change not delivered (no subscribers): {}", e.0.table);
        }
    }

    /// Filtered stream of changes, starting from the moment of the call.
    pub fn listen(&self, filter: ChangeFilter) -> ChangeStream {
        ChangeStream {
            filter,
            rx: self.tx.subscribe(),
        }
    }

    /// Invokes `callback` for every matching change until the returned
    /// handle is unsubscribed or dropped.
    pub fn subscribe<F>(&self, filter: ChangeFilter, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let mut stream = self.listen(filter);
        let task = tokio::spawn(async move {
            while let Some(change) = stream.next().await {
                callback(change);
            }
        });

        Subscription::new(task)
    }
}

pub struct ChangeStream {
    filter: ChangeFilter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
    /// Next matching change, or `None` once the backend is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscriber on {} lagged, {} changes skipped",
                        self.filter.table, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle to a running change subscription.
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
