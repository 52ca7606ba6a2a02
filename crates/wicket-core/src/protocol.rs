//! JSON wire protocol.
//!
//! Every frame is a JSON object with a `type` discriminator. Two inbound types
//! (`join`, `reconnect`) are control messages the server acts on; everything
//! else a client sends is relayed to its partner byte-for-byte. Only the
//! `type` field of a relayed frame is ever read.
//!
//! | type | direction | fields |
//! |------|-----------|--------|
//! | `client-id` | server → client | `clientId` |
//! | `join` | client → server | `previousId?` |
//! | `peer-assignment` | server → client | `isInitiator`, `partnerId` |
//! | `reconnect` | client → server | `clientId` |
//! | `reconnect-success` | server → client | `isInitiator`, `partnerId` |
//! | `partner-disconnected` | server → client | `temporary`, `partnerId?` |
//! | `partner-reconnected` | server → client | `partnerId` |
//! | `offer` / `answer` / `ice-candidate` | relayed | opaque |
//! | `toss` / `role` / `number` | relayed | opaque |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::ids::ClientId;

/// Control messages emitted by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Identity assignment, sent once right after the socket opens.
    #[serde(rename_all = "camelCase")]
    ClientId {
        /// Identifier the client should persist for reconnects.
        client_id: ClientId,
    },
    /// A new pairing was formed.
    #[serde(rename_all = "camelCase")]
    PeerAssignment {
        /// Whether this side starts the media negotiation (sends the offer).
        is_initiator: bool,
        /// Identity of the partner.
        partner_id: ClientId,
    },
    /// A reconnect restored an existing pairing.
    #[serde(rename_all = "camelCase")]
    ReconnectSuccess {
        /// The role this side had before the drop.
        is_initiator: bool,
        /// Identity of the partner.
        partner_id: ClientId,
    },
    /// The partner's socket closed (`temporary`) or its grace period ran out.
    #[serde(rename_all = "camelCase")]
    PartnerDisconnected {
        /// `true` while the partner may still come back.
        temporary: bool,
        /// Identity of the partner that left.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partner_id: Option<ClientId>,
    },
    /// The partner came back within its grace period.
    #[serde(rename_all = "camelCase")]
    PartnerReconnected {
        /// Identity of the partner that returned.
        partner_id: ClientId,
    },
}

impl ServerMessage {
    /// Wire name of this message's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientId { .. } => "client-id",
            Self::PeerAssignment { .. } => "peer-assignment",
            Self::ReconnectSuccess { .. } => "reconnect-success",
            Self::PartnerDisconnected { .. } => "partner-disconnected",
            Self::PartnerReconnected { .. } => "partner-reconnected",
        }
    }

    /// Serialize to the JSON text frame sent over the socket.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

const SERVER_ONLY: [&str; 5] = [
    "client-id",
    "peer-assignment",
    "reconnect-success",
    "partner-disconnected",
    "partner-reconnected",
];

/// Discriminator of a frame that is relayed without inspection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelayKind {
    /// Session description offer.
    Offer,
    /// Session description answer.
    Answer,
    /// Trickled ICE candidate.
    IceCandidate,
    /// Coin toss call/result.
    Toss,
    /// Bat/bowl choice.
    Role,
    /// Number played in a ball.
    Number,
    /// Any other type, relayed the same way.
    Other(String),
}

impl RelayKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice-candidate" => Self::IceCandidate,
            "toss" => Self::Toss,
            "role" => Self::Role,
            "number" => Self::Number,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Wire name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::Toss => "toss",
            Self::Role => "role",
            Self::Number => "number",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded client frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Ask to be paired. A non-empty `previous_id` makes it a reconnect attempt.
    Join {
        /// Identifier from an earlier connection, if the client kept one.
        previous_id: Option<ClientId>,
    },
    /// Explicit reconnect under a previously issued identifier.
    Reconnect {
        /// Identifier the client held before the drop.
        client_id: ClientId,
    },
    /// Opaque payload for the partner.
    Relay {
        /// The frame's `type`.
        kind: RelayKind,
        /// The frame exactly as received.
        raw: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinFields {
    #[serde(default)]
    previous_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconnectFields {
    client_id: String,
}

impl Inbound {
    /// Decode a text frame.
    ///
    /// Relayed frames keep `text` untouched; only the envelope is parsed.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .as_object()
            .and_then(|obj| obj.get("type"))
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        match kind {
            "join" => {
                let fields: JoinFields =
                    serde_json::from_value(value.clone()).map_err(|e| invalid("join", &e))?;
                let previous_id = fields
                    .previous_id
                    .filter(|id| !id.is_empty())
                    .map(ClientId::from);
                Ok(Self::Join { previous_id })
            }
            "reconnect" => {
                let fields: ReconnectFields = serde_json::from_value(value.clone())
                    .map_err(|e| invalid("reconnect", &e))?;
                if fields.client_id.is_empty() {
                    return Err(ProtocolError::InvalidControl {
                        kind: "reconnect".into(),
                        reason: "empty clientId".into(),
                    });
                }
                Ok(Self::Reconnect {
                    client_id: ClientId::from(fields.client_id),
                })
            }
            other if SERVER_ONLY.contains(&other) => {
                Err(ProtocolError::ServerOnly(other.to_owned()))
            }
            other => Ok(Self::Relay {
                kind: RelayKind::parse(other),
                raw: text.to_owned(),
            }),
        }
    }
}

fn invalid(kind: &str, err: &serde_json::Error) -> ProtocolError {
    ProtocolError::InvalidControl {
        kind: kind.to_owned(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn join_without_previous_id() {
        let msg = Inbound::parse(r#"{"type":"join"}"#).unwrap();
        assert_eq!(msg, Inbound::Join { previous_id: None });
    }

    #[test]
    fn join_with_previous_id() {
        let msg = Inbound::parse(r#"{"type":"join","previousId":"client_1"}"#).unwrap();
        assert_eq!(
            msg,
            Inbound::Join {
                previous_id: Some(ClientId::from("client_1"))
            }
        );
    }

    #[test]
    fn join_with_null_or_empty_previous_id_is_fresh() {
        for text in [
            r#"{"type":"join","previousId":null}"#,
            r#"{"type":"join","previousId":""}"#,
        ] {
            assert_eq!(
                Inbound::parse(text).unwrap(),
                Inbound::Join { previous_id: None },
                "{text}"
            );
        }
    }

    #[test]
    fn join_with_non_string_previous_id_is_invalid() {
        let err = Inbound::parse(r#"{"type":"join","previousId":42}"#).unwrap_err();
        assert_matches!(err, ProtocolError::InvalidControl { kind, .. } if kind == "join");
    }

    #[test]
    fn reconnect_requires_client_id() {
        let ok = Inbound::parse(r#"{"type":"reconnect","clientId":"client_9"}"#).unwrap();
        assert_eq!(
            ok,
            Inbound::Reconnect {
                client_id: ClientId::from("client_9")
            }
        );

        let missing = Inbound::parse(r#"{"type":"reconnect"}"#).unwrap_err();
        assert_matches!(missing, ProtocolError::InvalidControl { .. });

        let empty = Inbound::parse(r#"{"type":"reconnect","clientId":""}"#).unwrap_err();
        assert_matches!(empty, ProtocolError::InvalidControl { .. });
    }

    #[test]
    fn relay_keeps_raw_text() {
        let text = r#"{ "type": "number",  "number": 3 }"#;
        let msg = Inbound::parse(text).unwrap();
        assert_eq!(
            msg,
            Inbound::Relay {
                kind: RelayKind::Number,
                raw: text.to_owned(),
            }
        );
    }

    #[test]
    fn relay_kinds_are_recognised() {
        let cases = [
            ("offer", RelayKind::Offer),
            ("answer", RelayKind::Answer),
            ("ice-candidate", RelayKind::IceCandidate),
            ("toss", RelayKind::Toss),
            ("role", RelayKind::Role),
            ("number", RelayKind::Number),
        ];
        for (name, expected) in cases {
            let text = json!({"type": name, "payload": {"x": 1}}).to_string();
            assert_matches!(
                Inbound::parse(&text).unwrap(),
                Inbound::Relay { kind, .. } if kind == expected
            );
            assert_eq!(expected.as_str(), name);
        }
    }

    #[test]
    fn unknown_type_is_relayed() {
        let msg = Inbound::parse(r#"{"type":"chat","text":"gg"}"#).unwrap();
        assert_matches!(msg, Inbound::Relay { kind: RelayKind::Other(k), .. } if k == "chat");
    }

    #[test]
    fn server_only_types_are_rejected() {
        let err = Inbound::parse(r#"{"type":"peer-assignment","isInitiator":true}"#).unwrap_err();
        assert_matches!(err, ProtocolError::ServerOnly(kind) if kind == "peer-assignment");
    }

    #[test]
    fn malformed_frames() {
        assert_matches!(Inbound::parse("not json"), Err(ProtocolError::Malformed(_)));
        assert_matches!(Inbound::parse(""), Err(ProtocolError::Malformed(_)));
        assert_matches!(Inbound::parse("[1,2]"), Err(ProtocolError::MissingType));
        assert_matches!(Inbound::parse(r#"{"kind":"join"}"#), Err(ProtocolError::MissingType));
        assert_matches!(Inbound::parse(r#"{"type":7}"#), Err(ProtocolError::MissingType));
    }

    #[test]
    fn client_id_message_shape() {
        let msg = ServerMessage::ClientId {
            client_id: ClientId::from("client_a"),
        };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "client-id", "clientId": "client_a"}));
    }

    #[test]
    fn peer_assignment_shape() {
        let msg = ServerMessage::PeerAssignment {
            is_initiator: true,
            partner_id: ClientId::from("client_b"),
        };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "peer-assignment", "isInitiator": true, "partnerId": "client_b"})
        );
    }

    #[test]
    fn partner_disconnected_omits_missing_partner() {
        let msg = ServerMessage::PartnerDisconnected {
            temporary: false,
            partner_id: None,
        };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "partner-disconnected", "temporary": false}));
    }

    #[test]
    fn kind_matches_serialized_type() {
        let id = ClientId::from("c");
        let messages = [
            ServerMessage::ClientId { client_id: id.clone() },
            ServerMessage::PeerAssignment { is_initiator: false, partner_id: id.clone() },
            ServerMessage::ReconnectSuccess { is_initiator: true, partner_id: id.clone() },
            ServerMessage::PartnerDisconnected { temporary: true, partner_id: Some(id.clone()) },
            ServerMessage::PartnerReconnected { partner_id: id },
        ];
        for msg in messages {
            let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
            assert_eq!(value["type"], msg.kind());
        }
    }

    #[test]
    fn server_messages_decode_back() {
        let text = r#"{"type":"reconnect-success","isInitiator":false,"partnerId":"client_z"}"#;
        let msg: ServerMessage = serde_json::from_str(text).unwrap();
        assert_eq!(
            msg,
            ServerMessage::ReconnectSuccess {
                is_initiator: false,
                partner_id: ClientId::from("client_z"),
            }
        );
    }
}
