//! Client frame dispatch.

use std::sync::Arc;

use wicket_core::protocol::RelayKind;
use wicket_core::{ConnectionId, Inbound, ProtocolError};

use crate::hub::SignalingHub;

/// What a client frame was turned into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A `join`, with or without a previous identifier.
    Join {
        /// Whether the frame carried `previousId`.
        reconnect: bool,
    },
    /// An explicit `reconnect`.
    Reconnect,
    /// An opaque frame offered to the partner.
    Relay(RelayKind),
}

/// Decode one text frame from `conn` and hand it to the hub.
///
/// Frames that fail to decode are returned as errors; the caller logs them
/// and keeps the connection open.
pub fn handle_frame(
    hub: &Arc<SignalingHub>,
    conn: &ConnectionId,
    text: &str,
) -> Result<Dispatched, ProtocolError> {
    match Inbound::parse(text)? {
        Inbound::Join { previous_id } => {
            hub.join(conn, previous_id.as_ref());
            Ok(Dispatched::Join {
                reconnect: previous_id.is_some(),
            })
        }
        Inbound::Reconnect { client_id } => {
            hub.reconnect(conn, &client_id);
            Ok(Dispatched::Reconnect)
        }
        Inbound::Relay { kind, raw } => {
            hub.relay(conn, &kind, raw);
            Ok(Dispatched::Relay(kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    use crate::matchmaker::DEFAULT_GRACE_PERIOD;
    use crate::websocket::connection::PeerConnection;

    fn setup() -> (Arc<SignalingHub>, Vec<(ConnectionId, mpsc::Receiver<String>)>) {
        let hub = Arc::new(SignalingHub::new(DEFAULT_GRACE_PERIOD));
        let peers = (0..2)
            .map(|_| {
                let (tx, mut rx) = mpsc::channel(16);
                let conn = Arc::new(PeerConnection::new(tx));
                let _ = hub.connect(Arc::clone(&conn));
                let _ = rx.try_recv();
                (conn.id.clone(), rx)
            })
            .collect();
        (hub, peers)
    }

    #[tokio::test]
    async fn join_then_relay() {
        let (hub, mut peers) = setup();
        let a = peers[0].0.clone();
        let b = peers[1].0.clone();
        assert_eq!(
            handle_frame(&hub, &a, r#"{"type":"join"}"#).unwrap(),
            Dispatched::Join { reconnect: false }
        );
        let _ = handle_frame(&hub, &b, r#"{"type":"join","previousId":""}"#).unwrap();
        let _ = peers[0].1.try_recv().unwrap();

        let frame = r#"{"type":"role","choice":"bat"}"#;
        assert_eq!(
            handle_frame(&hub, &b, frame).unwrap(),
            Dispatched::Relay(RelayKind::Role)
        );
        assert_eq!(peers[0].1.try_recv().unwrap(), frame);
    }

    #[tokio::test]
    async fn join_with_previous_id_is_flagged() {
        let (hub, peers) = setup();
        let out = handle_frame(&hub, &peers[0].0, r#"{"type":"join","previousId":"client_gone"}"#);
        assert_eq!(out.unwrap(), Dispatched::Join { reconnect: true });
        assert_eq!(hub.stats().waiting, 1);
    }

    #[tokio::test]
    async fn reconnect_dispatches() {
        let (hub, peers) = setup();
        let out = handle_frame(&hub, &peers[0].0, r#"{"type":"reconnect","clientId":"client_x"}"#);
        assert_eq!(out.unwrap(), Dispatched::Reconnect);
    }

    #[tokio::test]
    async fn malformed_frame_is_rejected() {
        let (hub, peers) = setup();
        assert_matches!(
            handle_frame(&hub, &peers[0].0, "not json"),
            Err(ProtocolError::Malformed(_))
        );
        assert_matches!(
            handle_frame(&hub, &peers[0].0, r#"{"kind":"join"}"#),
            Err(ProtocolError::MissingType)
        );
        assert_eq!(hub.stats().waiting, 0);
    }

    #[tokio::test]
    async fn server_only_type_is_rejected() {
        let (hub, peers) = setup();
        assert_matches!(
            handle_frame(&hub, &peers[0].0, r#"{"type":"peer-assignment","isInitiator":true}"#),
            Err(ProtocolError::ServerOnly(kind)) if kind == "peer-assignment"
        );
    }
}
