//! The per-connection loop.

use crate::error::{ServerError, ServerResult};
use crate::handler::CommandDispatcher;
use crate::registry::{ConnectionId, Outbound, SessionRegistry};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::unbounded_channel;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Drops a line that repeats the previous one while suppression is armed.
///
/// Lines compare ignoring ASCII case and runs of whitespace. The previous
/// line is remembered whether or not suppression is armed.
#[derive(Debug, Default)]
pub struct DuplicateFilter {
    last: Option<String>,
}

impl DuplicateFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `line` and returns true if it should be dropped.
    pub fn is_repeat(&mut self, line: &str, armed: bool) -> bool {
        let normalized = line
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let repeat = armed && self.last.as_deref() == Some(normalized.as_str());
        self.last = Some(normalized);
        repeat
    }
}

impl From<Outbound> for Message {
    fn from(message: Outbound) -> Self {
        match message {
            Outbound::Text(text) => Message::Text(text.to_string()),
            Outbound::Binary(bytes) => Message::Binary(bytes.to_vec()),
        }
    }
}

struct Registration {
    registry: Arc<SessionRegistry>,
    id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

/// Serves one accepted socket until the peer leaves.
///
/// The connection receives the canvas and is registered anonymously in
/// one step, then has each text frame dispatched in order. It is unregistered on
/// every exit path.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails, the snapshot cannot
/// be built, or the transport fails other than by the peer going away.
pub async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    dispatcher: CommandDispatcher,
) -> ServerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let socket = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut frames) = socket.split();

    let (outbox, mut queue) = unbounded_channel::<Outbound>();
    let registration = Registration {
        id: dispatcher.join(outbox).await?,
        registry: Arc::clone(&dispatcher.context().registry),
    };
    let conn = registration.id;
    info!(conn, %peer, "connection opened");

    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            if let Err(err) = sink.send(Message::from(message)).await {
                debug!(conn, error = %err, "writer stopped");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let result = read_loop(conn, &mut frames, &dispatcher).await;

    drop(registration);
    let _ = writer.await;

    match &result {
        Ok(()) => info!(conn, "connection closed"),
        Err(err) => warn!(conn, error = %err, "connection failed"),
    }
    result
}

async fn read_loop<St>(
    conn: ConnectionId,
    frames: &mut St,
    dispatcher: &CommandDispatcher,
) -> ServerResult<()>
where
    St: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let mut filter = DuplicateFilter::new();
    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                let err = ServerError::from(err);
                if err.is_disconnect() {
                    return Ok(());
                }
                return Err(err);
            }
        };

        match frame {
            Message::Text(line) => {
                if filter.is_repeat(&line, dispatcher.suppression_armed(conn)) {
                    debug!(conn, "dropped repeated line");
                    continue;
                }
                dispatcher.dispatch(conn, &line).await;
            }
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    Ok(())
}
