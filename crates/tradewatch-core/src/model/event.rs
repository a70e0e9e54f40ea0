use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One entry of the simulation log, in the envelope the backend delivers:
/// `{timestamp, type, data}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEvent {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A decoded simulation event. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    pub timestamp: f64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Utterance(Utterance),
    Trade(Trade),
    Reflection(Reflection),
    /// Any event type this client does not project (e.g. `network_update`).
    Other { kind: String, data: serde_json::Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Utterance,
    Trade,
    Reflection,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Utterance => write!(f, "utterance"),
            EventType::Trade => write!(f, "trade"),
            EventType::Reflection => write!(f, "reflection"),
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "utterance" => Ok(EventType::Utterance),
            "trade" => Ok(EventType::Trade),
            "reflection" => Ok(EventType::Reflection),
            _ => Err(Error::Validation(format!("invalid event type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Utterance {
    pub markov_step: u32,
    pub conversation_turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub agent: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<bool>,
}

impl Utterance {
    /// First turn of a new conversation between a pair of participants.
    pub fn opens_conversation(&self) -> bool {
        self.conversation_turn == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub markov_step: u32,
    pub conversation_turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub trade_details: TradeDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Trade {
    pub fn seller(&self) -> &str {
        &self.trade_details.participants.seller
    }

    pub fn buyer(&self) -> &str {
        &self.trade_details.participants.buyer
    }

    pub fn items(&self) -> &[TradeItem] {
        &self.trade_details.items
    }

    /// Sum of `value * quantity` over all items.
    pub fn total_value(&self) -> f64 {
        self.items()
            .iter()
            .map(|item| item.value * f64::from(item.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeDetails {
    pub participants: TradeParties,
    #[serde(default)]
    pub items: Vec<TradeItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeParties {
    pub seller: String,
    pub buyer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub value: f64,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reflection {
    pub markov_step: u32,
    pub agent: String,
    pub anchor: String,
    #[serde(default)]
    pub thoughts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Event {
    pub fn utterance(timestamp: f64, utterance: Utterance) -> Self {
        Self {
            timestamp,
            kind: EventKind::Utterance(utterance),
        }
    }

    pub fn trade(timestamp: f64, trade: Trade) -> Self {
        Self {
            timestamp,
            kind: EventKind::Trade(trade),
        }
    }

    pub fn reflection(timestamp: f64, reflection: Reflection) -> Self {
        Self {
            timestamp,
            kind: EventKind::Reflection(reflection),
        }
    }

    /// The projected variant, or `None` for event types this client skips.
    pub fn event_type(&self) -> Option<EventType> {
        match self.kind {
            EventKind::Utterance(_) => Some(EventType::Utterance),
            EventKind::Trade(_) => Some(EventType::Trade),
            EventKind::Reflection(_) => Some(EventType::Reflection),
            EventKind::Other { .. } => None,
        }
    }

    /// Convert a decoded envelope. Unknown types become [`EventKind::Other`];
    /// a known type whose payload does not match fails.
    pub fn from_wire(wire: WireEvent) -> Result<Self> {
        Self::try_from(wire)
    }

    pub fn markov_step(&self) -> Option<u32> {
        match &self.kind {
            EventKind::Utterance(u) => Some(u.markov_step),
            EventKind::Trade(t) => Some(t.markov_step),
            EventKind::Reflection(r) => Some(r.markov_step),
            EventKind::Other { .. } => None,
        }
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = Error;

    fn try_from(wire: WireEvent) -> std::result::Result<Self, Self::Error> {
        let kind = match wire.kind.parse::<EventType>() {
            Ok(EventType::Utterance) => EventKind::Utterance(serde_json::from_value(wire.data)?),
            Ok(EventType::Trade) => EventKind::Trade(serde_json::from_value(wire.data)?),
            Ok(EventType::Reflection) => EventKind::Reflection(serde_json::from_value(wire.data)?),
            Err(_) => EventKind::Other {
                kind: wire.kind,
                data: wire.data,
            },
        };
        Ok(Event {
            timestamp: wire.timestamp,
            kind,
        })
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let (kind, data) = match event.kind {
            EventKind::Utterance(u) => (EventType::Utterance.to_string(), to_value(&u)),
            EventKind::Trade(t) => (EventType::Trade.to_string(), to_value(&t)),
            EventKind::Reflection(r) => (EventType::Reflection.to_string(), to_value(&r)),
            EventKind::Other { kind, data } => (kind, data),
        };
        WireEvent {
            timestamp: event.timestamp,
            kind,
            data,
        }
    }
}

fn to_value<T: Serialize>(payload: &T) -> serde_json::Value {
    // Plain derive(Serialize) structs with string keys cannot fail here.
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utterance_envelope() {
        let json = serde_json::json!({
            "timestamp": 1_700_000_000.5,
            "type": "utterance",
            "data": {
                "markov_step": 3,
                "conversation_turn": 0,
                "conversation_id": "conv-1",
                "agent": "Mei Chen",
                "text": "Fresh dumplings today!",
                "participants": ["Mei Chen", "Carlos Mendez"],
                "context": "Marketplace",
                "ended": false
            }
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.event_type(), Some(EventType::Utterance));
        assert_eq!(event.markov_step(), Some(3));
        match event.kind {
            EventKind::Utterance(u) => {
                assert!(u.opens_conversation());
                assert_eq!(u.participants.unwrap().len(), 2);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_decode_trade_and_total_value() {
        let json = serde_json::json!({
            "timestamp": 1.0,
            "type": "trade",
            "data": {
                "markov_step": 4,
                "conversation_turn": 2,
                "trade_details": {
                    "participants": {"seller": "A", "buyer": "B"},
                    "items": [
                        {"name": "Axe", "quantity": 1, "value": 50.0},
                        {"name": "Rope", "quantity": 3, "value": 2.5}
                    ]
                }
            }
        });
        let event: Event = serde_json::from_value(json).unwrap();
        let EventKind::Trade(trade) = event.kind else {
            panic!("expected trade");
        };
        assert_eq!(trade.seller(), "A");
        assert_eq!(trade.buyer(), "B");
        assert!((trade.total_value() - 57.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_type_is_kept_as_other() {
        let json = serde_json::json!({
            "timestamp": 2.0,
            "type": "network_update",
            "data": {"markov_step": 5}
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.event_type(), None);
        assert!(matches!(event.kind, EventKind::Other { ref kind, .. } if kind == "network_update"));
    }

    #[test]
    fn test_malformed_known_type_is_rejected() {
        let json = serde_json::json!({
            "timestamp": 2.0,
            "type": "reflection",
            "data": {"markov_step": 5}
        });
        assert!(serde_json::from_value::<Event>(json).is_err());
    }

    #[test]
    fn test_reflection_encodes_to_wire_envelope() {
        let event = Event::reflection(
            10.0,
            Reflection {
                markov_step: 1,
                agent: "Pema Sherpa".to_string(),
                anchor: "yesterday's prices".to_string(),
                thoughts: vec!["Yak wool sells better in winter".to_string()],
                context: None,
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "reflection");
        assert_eq!(value["data"]["anchor"], "yesterday's prices");
        assert_eq!(value["timestamp"], 10.0);
    }

    #[test]
    fn test_event_type_display_fromstr() {
        assert_eq!(EventType::Trade.to_string(), "trade");
        assert_eq!("reflection".parse::<EventType>().unwrap(), EventType::Reflection);
        assert!("network_update".parse::<EventType>().is_err());
    }
}
