//! WebSocket connection establishment and frame classification.

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;

use detstream_protocol::WireUnit;
use detstream_protocol::constants::WS_TRANSPORT_MAX_SIZE;

use crate::error::SessionError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a connection.
pub type WsWrite = SplitSink<WsStream, tungstenite::Message>;

/// Inbound half of a connection.
pub type WsRead = SplitStream<WsStream>;

/// What a raw WebSocket message means to the session.
#[derive(Debug, PartialEq)]
pub enum Classified {
    /// A data unit for the codec.
    Unit(WireUnit),
    /// Ping, pong or raw frame; handled by the transport.
    Control,
    /// The peer closed the connection.
    Close,
}

/// Classifies a message by its WebSocket framing.
pub fn classify(msg: tungstenite::Message) -> Classified {
    match msg {
        tungstenite::Message::Text(text) => Classified::Unit(WireUnit::Text(text.as_str().to_owned())),
        tungstenite::Message::Binary(bytes) => Classified::Unit(WireUnit::Binary(bytes.to_vec())),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => Classified::Control,
        tungstenite::Message::Close(_) => Classified::Close,
    }
}

/// Opens a WebSocket to the detection service.
pub async fn connect(url: &str) -> Result<(WsWrite, WsRead), SessionError> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_TRANSPORT_MAX_SIZE);
    ws_config.max_frame_size = Some(WS_TRANSPORT_MAX_SIZE);
    let (ws_stream, _) =
        tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
    info!(url, "connected to detection service");
    Ok(ws_stream.split())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_text_and_binary() {
        assert_eq!(
            classify(tungstenite::Message::Text("{}".into())),
            Classified::Unit(WireUnit::Text("{}".into()))
        );
        assert_eq!(
            classify(tungstenite::Message::Binary(vec![1u8, 2, 3].into())),
            Classified::Unit(WireUnit::Binary(vec![1, 2, 3]))
        );
    }

    #[test]
    fn classify_control_frames() {
        assert_eq!(
            classify(tungstenite::Message::Ping(vec![].into())),
            Classified::Control
        );
        assert_eq!(
            classify(tungstenite::Message::Pong(vec![].into())),
            Classified::Control
        );
        assert_eq!(classify(tungstenite::Message::Close(None)), Classified::Close);
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        // Port 9 on localhost (discard) is practically never a WebSocket server.
        let result = connect("ws://127.0.0.1:9/ws").await;
        assert!(matches!(result, Err(SessionError::Ws(_))));
    }
}
