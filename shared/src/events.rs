//! Realtime event contract between the backend relay and the POS, KDS and
//! admin front-ends.
//!
//! Every frame on the socket is one JSON object tagged by `type`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Chat, ChatStatus, DaySession, DaySummary, Message, Order, OrderStatus, PaymentMethod,
};

/// Subscription groups a client can filter on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Orders,
    Chat,
    Day,
}

crate::string_enum!(Topic, "topic", {
    Orders => "orders",
    Chat => "chat",
    Day => "day",
});

/// A change worth pushing to connected screens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RealtimeEvent {
    OrderCreated(Box<Order>),
    OrderUpdated(Box<Order>),
    OrderStatusChanged {
        order_id: Uuid,
        order_number: i32,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderPaid {
        order_id: Uuid,
        order_number: i32,
        payment_method: PaymentMethod,
        total: Decimal,
    },
    ChatCreated(Chat),
    ChatMessage(Message),
    ChatStatusChanged {
        chat_id: Uuid,
        status: ChatStatus,
    },
    DayOpened(DaySession),
    DayClosed {
        session_id: Uuid,
        summary: Box<DaySummary>,
    },
}

impl RealtimeEvent {
    pub fn topic(&self) -> Topic {
        match self {
            RealtimeEvent::OrderCreated(_)
            | RealtimeEvent::OrderUpdated(_)
            | RealtimeEvent::OrderStatusChanged { .. }
            | RealtimeEvent::OrderPaid { .. } => Topic::Orders,
            RealtimeEvent::ChatCreated(_)
            | RealtimeEvent::ChatMessage(_)
            | RealtimeEvent::ChatStatusChanged { .. } => Topic::Chat,
            RealtimeEvent::DayOpened(_) | RealtimeEvent::DayClosed { .. } => Topic::Day,
        }
    }
}

/// Frames sent by a front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topics: Vec<Topic> },
    Unsubscribe { topics: Vec<Topic> },
    Ping,
}

/// Frames sent by the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ready { topics: Vec<Topic> },
    Event { event: RealtimeEvent },
    /// The connection fell behind and dropped events; clients should refetch
    Resync { missed: u64 },
    Pong,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","topics":["orders","day"]}"#).unwrap();
        match msg {
            ClientMessage::Subscribe { topics } => {
                assert_eq!(topics, vec![Topic::Orders, Topic::Day])
            }
            other => panic!("unexpected message {other:?}"),
        }

        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));
    }

    #[test]
    fn test_event_topic_and_tagging() {
        let event = RealtimeEvent::ChatStatusChanged {
            chat_id: Uuid::nil(),
            status: ChatStatus::Closed,
        };
        assert_eq!(event.topic(), Topic::Chat);

        let json = serde_json::to_value(ServerMessage::Event { event }).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["type"], "chat_status_changed");
        assert_eq!(json["event"]["payload"]["status"], "closed");
    }
}
