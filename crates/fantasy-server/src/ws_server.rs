// WebSocket front end for the fantasy API.

use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::api::{self, ApiContext};
use crate::protocol::{ApiError, Response};

/// Outgoing frames buffered per connection before the reader waits.
const REPLY_BUFFER: usize = 64;

/// Bind the API listener on `127.0.0.1:{port}`. Port 0 picks a free port.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, serving each on its own task.
pub async fn run(listener: TcpListener, ctx: Arc<ApiContext>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");
        tokio::spawn(serve_connection(stream, addr_str, Arc::clone(&ctx)));
    }
}

async fn serve_connection(stream: TcpStream, addr: String, ctx: Arc<ApiContext>) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    let (mut write, read) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Message>(REPLY_BUFFER);

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write.send(msg).await {
                warn!("failed to send reply to {writer_addr}: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    if process_message_stream(read, &ctx, &tx, &addr).await.is_err() {
        debug!("reply channel for {addr} closed early");
    }
    drop(tx);
    if let Err(e) = writer.await {
        error!("writer task for {addr} panicked: {e}");
    }
    info!("Client {addr} disconnected");
}

/// Answer every text frame from `stream` with exactly one reply on `tx`, in
/// order. Returns `Err(())` if the reply channel is closed.
///
/// Generic over the stream type so it can be driven by in-memory streams.
pub async fn process_message_stream<St>(
    mut stream: St,
    ctx: &Arc<ApiContext>,
    tx: &mpsc::Sender<Message>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let reply = dispatch(Arc::clone(ctx), text.to_string()).await;
                if tx.send(Message::Text(reply.into())).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Binary, Ping, Pong and raw frames carry no requests.
            }
        }
    }
    Ok(())
}

/// SQLite calls block, so requests run on the blocking pool.
async fn dispatch(ctx: Arc<ApiContext>, text: String) -> String {
    match tokio::task::spawn_blocking(move || api::handle_message(&ctx, &text)).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("request handler failed: {e}");
            api::encode(&Response::failure(ApiError::internal("request handler failed")))
        }
    }
}
