//! Hub identity, state and the views handed out to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Protocol, TranslatorError};

/// Namespace for name-based hub ids
const HUB_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3a52_9c0e_4d8a_b7e4_2f91_c35d_0a17);

/// Stable hub identity derived from the ordered (producer, consumer) name pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HubId(Uuid);

impl HubId {
    /// Derive the id for a name pair.
    ///
    /// The producer name is length-prefixed so that no two distinct pairs
    /// share an encoding (`("ab", "c")` vs `("a", "bc")`).
    pub fn derive(producer_name: &str, consumer_name: &str) -> Self {
        let mut key = Vec::with_capacity(8 + producer_name.len() + consumer_name.len());
        key.extend_from_slice(&(producer_name.len() as u64).to_be_bytes());
        key.extend_from_slice(producer_name.as_bytes());
        key.extend_from_slice(consumer_name.as_bytes());
        HubId(Uuid::new_v5(&HUB_NAMESPACE, &key))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HubId {
    type Err = TranslatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(HubId)
            .map_err(|_| TranslatorError::Validation(format!("invalid hub id: {}", s)))
    }
}

/// Hub lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HubState {
    #[default]
    Created,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for HubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubState::Created => write!(f, "CREATED"),
            HubState::Active => write!(f, "ACTIVE"),
            HubState::Closing => write!(f, "CLOSING"),
            HubState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Forwarding direction inside a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ConsumerToProducer,
    ProducerToConsumer,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ConsumerToProducer => write!(f, "consumer->producer"),
            Direction::ProducerToConsumer => write!(f, "producer->consumer"),
        }
    }
}

/// Why a hub was closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseReason {
    /// Removed by a caller or at shutdown
    Requested,
    /// One side's receive sequence ended
    SourceClosed { direction: Direction },
    /// A receive or send failed mid-session
    Transport { direction: Direction, error: String },
    /// A forwarding task died unexpectedly
    PathFailed { error: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => write!(f, "requested"),
            CloseReason::SourceClosed { direction } => write!(f, "source closed ({})", direction),
            CloseReason::Transport { direction, error } => {
                write!(f, "transport error ({}): {}", direction, error)
            }
            CloseReason::PathFailed { error } => write!(f, "forwarding failed: {}", error),
        }
    }
}

/// Hub lifecycle notifications
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HubEvent {
    Opened { id: HubId, port: u16 },
    Closed { id: HubId, reason: CloseReason },
}

/// The externally visible view of a hub: everything a caller needs to connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubAccess {
    pub id: HubId,
    pub outgoing_ip: String,
    pub port: u16,
}

impl HubAccess {
    pub fn new(id: HubId, outgoing_ip: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            outgoing_ip: outgoing_ip.into(),
            port,
        }
    }
}

/// Diagnostic description of a hub
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubInfo {
    pub id: HubId,
    pub consumer_name: String,
    pub consumer_protocol: Protocol,
    pub producer_name: String,
    pub producer_protocol: Protocol,
    pub port: u16,
    pub state: HubState,
    pub opened_at: DateTime<Utc>,
}

/// Request to bridge a consumer and a producer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorSetup {
    pub consumer_name: String,
    pub consumer_address: String,
    pub producer_name: String,
    pub producer_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hub_id_is_deterministic() {
        let a = HubId::derive("dashboard1", "sensorA");
        let b = HubId::derive("dashboard1", "sensorA");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_hub_id_is_ordered() {
        assert_ne!(HubId::derive("a", "b"), HubId::derive("b", "a"));
    }

    #[test]
    fn test_hub_id_no_collisions() {
        let names = [
            "", "a", "b", "ab", "ba", "abc", "a:b", "a|b", "sensorA", "sensorB", "dashboard1",
            "dashboard11", "1", "11", "meter-01", "meter-010", "x y", "x", "y", "Aa", "BB",
        ];

        let mut seen = HashSet::new();
        for producer in names {
            for consumer in names {
                assert!(
                    seen.insert(HubId::derive(producer, consumer)),
                    "collision for ({:?}, {:?})",
                    producer,
                    consumer
                );
            }
        }
        assert_eq!(seen.len(), names.len() * names.len());
    }

    #[test]
    fn test_concatenation_ambiguity() {
        // Plain concatenation would map both pairs to "abc"
        assert_ne!(HubId::derive("ab", "c"), HubId::derive("a", "bc"));
        // "Aa" and "BB" collide under a polynomial 31 string hash
        assert_ne!(HubId::derive("Aa", "x"), HubId::derive("BB", "x"));
    }

    #[test]
    fn test_hub_id_round_trips_through_string() {
        let id = HubId::derive("p", "c");
        let parsed: HubId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-an-id".parse::<HubId>().is_err());
    }

    #[test]
    fn test_hub_state_starts_created() {
        assert_eq!(HubState::default(), HubState::Created);
        assert_eq!(serde_json::to_value(HubState::Closing).unwrap(), "CLOSING");
        assert_eq!(HubState::Active.to_string(), "ACTIVE");
    }

    #[test]
    fn test_hub_access_json_shape() {
        let access = HubAccess::new(HubId::derive("p", "c"), "10.0.0.1", 40001);
        let json = serde_json::to_value(&access).unwrap();
        assert_eq!(json["outgoingIp"], "10.0.0.1");
        assert_eq!(json["port"], 40001);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_setup_deserializes_camel_case() {
        let setup: TranslatorSetup = serde_json::from_str(
            r#"{"consumerName":"c","consumerAddress":"http://10.0.0.5","producerName":"p","producerAddress":"coap://10.0.0.6"}"#,
        )
        .unwrap();
        assert_eq!(setup.producer_address, "coap://10.0.0.6");
    }
}
