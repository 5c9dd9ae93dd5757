use serde::{Deserialize, Serialize};

use crate::backend::{ChangeEvent, EventFilter};

fn all_events() -> EventFilter {
    EventFilter::All
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        table: String,
        #[serde(default = "all_events")]
        event: EventFilter,
    },
    Unsubscribe {
        table: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { table: String, event: EventFilter },
    Unsubscribed { table: String },
    Change(ChangeEvent),
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_defaults_to_all_events() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","payload":{"table":"menu_items"}}"#)
                .unwrap();
        match msg {
            ClientMessage::Subscribe { table, event } => {
                assert_eq!(table, "menu_items");
                assert_eq!(event, EventFilter::All);
            }
            other => panic!("unexpected message {other:?}"),
        }

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"subscribe","payload":{"table":"menu_items","event":"DELETE"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Subscribe {
                event: EventFilter::Delete,
                ..
            }
        ));
    }

    #[test]
    fn test_server_message_shape() {
        let json = serde_json::to_value(ServerMessage::Error {
            message: "bad".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["message"], "bad");
    }
}
