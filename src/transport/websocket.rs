use super::{AtomicReadyState, ReadyState, Transport, TransportEvents, TransportFactory};
use crate::types::{
    CLOSE_HANDSHAKE_TIMEOUT, CloseInfo, Frame, Result, SocketError, close_codes, close_reasons,
};
use futures::SinkExt;
use futures::stream::{SplitStream, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport factory backed by `tokio-tungstenite`.
///
/// Each call spawns an I/O task that performs the handshake and then pumps frames in both
/// directions until either side closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl TransportFactory for WebSocketFactory {
    fn create(&self, url: &Url, events: TransportEvents) -> Result<Box<dyn Transport>> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(SocketError::Config(format!(
                "unsupported URL scheme '{}', expected ws or wss",
                url.scheme()
            )));
        }

        let state = Arc::new(AtomicReadyState::new(ReadyState::Connecting));
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_connection(
            url.to_string(),
            outgoing_rx,
            events,
            Arc::clone(&state),
        ));

        Ok(Box::new(WebSocketTransport {
            outgoing: outgoing_tx,
            state,
        }))
    }
}

enum Outgoing {
    Frame(Frame),
    Close { code: Option<u16>, reason: String },
}

struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    state: Arc<AtomicReadyState>,
}

impl Transport for WebSocketTransport {
    fn ready_state(&self) -> ReadyState {
        self.state.load()
    }

    fn send(&self, frame: Frame) -> Result<()> {
        if self.state.load() != ReadyState::Open {
            return Err(SocketError::NotConnected);
        }
        self.outgoing
            .send(Outgoing::Frame(frame))
            .map_err(|_| SocketError::NotConnected)
    }

    fn close(&self, code: Option<u16>, reason: &str) {
        if matches!(self.state.load(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        self.state.store(ReadyState::Closing);
        let _ = self.outgoing.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

fn to_ws_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
    }
}

fn connection_lost() -> CloseInfo {
    CloseInfo::new(close_codes::ABNORMAL, close_reasons::CONNECTION_LOST).unclean()
}

/// Reads until the peer's close frame arrives. Returns `false` if the stream ends first.
async fn await_peer_close(read: &mut SplitStream<WsStream>) -> bool {
    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(Message::Close(_)) => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    false
}

async fn run_connection(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: TransportEvents,
    state: Arc<AtomicReadyState>,
) {
    tracing::info!("Connecting to {}", url);

    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    tracing::error!("WebSocket handshake with {} failed: {}", url, e);
                    state.store(ReadyState::Closed);
                    events.error(e);
                    events.closed(connection_lost());
                    return;
                }
            },
            request = outgoing.recv() => match request {
                Some(Outgoing::Close { reason, .. }) => {
                    tracing::debug!("Close requested before handshake completed");
                    state.store(ReadyState::Closed);
                    events.closed(CloseInfo::new(close_codes::ABNORMAL, reason).unclean());
                    return;
                }
                Some(Outgoing::Frame(_)) => {
                    tracing::warn!("Dropping frame queued before handshake completed");
                }
                None => {
                    state.store(ReadyState::Closed);
                    return;
                }
            },
        }
    };

    state.store(ReadyState::Open);
    events.opened();
    tracing::info!("Connected to {}", url);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            request = outgoing.recv() => match request {
                Some(Outgoing::Frame(frame)) => {
                    if let Err(e) = write.send(to_ws_message(frame)).await {
                        tracing::error!("WebSocket write error: {}", e);
                        events.error(e);
                    }
                }
                Some(Outgoing::Close { code, reason }) => {
                    let code = code.unwrap_or(close_codes::NORMAL);
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }

                    let clean = tokio::time::timeout(
                        CLOSE_HANDSHAKE_TIMEOUT,
                        await_peer_close(&mut read),
                    )
                    .await
                    .unwrap_or(false);

                    state.store(ReadyState::Closed);
                    let mut info = CloseInfo::new(code, reason);
                    info.was_clean = clean;
                    events.closed(info);
                    return;
                }
                None => {
                    // Owning socket dropped this transport
                    let _ = write.send(Message::Close(None)).await;
                    state.store(ReadyState::Closed);
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("Received text message ({} bytes)", text.len());
                    events.message(Frame::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("Received binary message ({} bytes)", data.len());
                    events.message(Frame::Binary(data.to_vec()));
                }
                Some(Ok(Message::Ping(data))) => {
                    tracing::debug!("Received ping ({} bytes)", data.len());
                }
                Some(Ok(Message::Pong(data))) => {
                    tracing::debug!("Received pong ({} bytes)", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(close_frame) => {
                            tracing::info!(
                                "Server closed connection: code={:?}, reason='{}'",
                                close_frame.code,
                                close_frame.reason.as_str()
                            );
                            CloseInfo::new(u16::from(close_frame.code), close_frame.reason.as_str())
                        }
                        None => {
                            tracing::warn!("Server closed connection without close frame");
                            CloseInfo::new(close_codes::NO_STATUS, "")
                        }
                    };
                    let _ = write.close().await;
                    state.store(ReadyState::Closed);
                    events.closed(info);
                    return;
                }
                Some(Ok(Message::Frame(_))) => {
                    tracing::debug!("Received raw frame (internal)");
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket read error: {}", e);
                    state.store(ReadyState::Closed);
                    events.error(e);
                    events.closed(connection_lost());
                    return;
                }
                None => {
                    tracing::warn!("WebSocket stream ended without close frame");
                    state.store(ReadyState::Closed);
                    events.closed(connection_lost());
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::driver::Input;
    use crate::transport::TransportEvent;

    #[test]
    fn test_frames_map_to_ws_messages() {
        assert_eq!(
            to_ws_message(Frame::Text("hi".to_string())),
            Message::Text("hi".into())
        );
        assert_eq!(
            to_ws_message(Frame::Binary(vec![1, 2])),
            Message::Binary(vec![1, 2].into())
        );
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_scheme() {
        let (tx, _rx) = mpsc::unbounded_channel::<Input>();
        let events = TransportEvents::new(1, tx.downgrade());
        let url = Url::parse("http://localhost:9").unwrap();

        let result = WebSocketFactory.create(&url, events);

        assert!(matches!(result, Err(SocketError::Config(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error_then_close() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Input>();
        let events = TransportEvents::new(5, tx.downgrade());
        // Bind then release an ephemeral port so nothing is listening on it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let url = Url::parse(&format!("ws://127.0.0.1:{}", port)).unwrap();

        let transport = WebSocketFactory.create(&url, events).unwrap();
        assert!(matches!(
            transport.send(Frame::Text("early".to_string())),
            Err(SocketError::NotConnected)
        ));

        let mut names = Vec::new();
        while let Some(Input::Transport { generation, event }) = rx.recv().await {
            assert_eq!(generation, 5);
            let done = matches!(event, TransportEvent::Close(_));
            names.push(event.name());
            if done {
                break;
            }
        }

        assert_eq!(names, vec!["error", "close"]);
        assert_eq!(transport.ready_state(), ReadyState::Closed);
    }
}
