//! WebSocket transport
//!
//! Responsibilities:
//! - Accept TCP connections and upgrade them on the configured path only
//! - Create a `Session` per connection, greet it unless the client asked
//!   otherwise (`?greeting=false`), and keep it registered with the `Broker`
//!   while it runs
//! - Run `Broker::poll` in the background and stop serving if it fails

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use url::form_urlencoded;

use crate::broker::Broker;
use crate::config::Settings;
use crate::session::Session;
use crate::utils::error::ServerError;

/// Bind the configured address and serve until `shutdown` fires.
pub async fn start_websocket_server(
    settings: Settings,
    broker: Arc<Broker>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("WebSocket server listening on ws://{addr}{}", settings.server.path);

    run_until(listener, broker, settings, shutdown).await
}

/// Serve connections from `listener` until `shutdown` fires.
///
/// Returns an error if the broker's poll loop stops on its own, since this
/// node can no longer deliver relay messages.
pub async fn run_until(
    listener: TcpListener,
    broker: Arc<Broker>,
    settings: Settings,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let settings = Arc::new(settings);
    let mut poll = {
        let broker = Arc::clone(&broker);
        let token = shutdown.child_token();
        tokio::spawn(async move { broker.poll(token).await })
    };

    let poll_ended = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break None,
            polled = &mut poll => break Some(polled),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&broker),
                        Arc::clone(&settings),
                    ));
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            },
        }
    };

    match poll_ended {
        None => {
            info!("shutdown requested, waiting for broker poll to stop");
            match poll.await {
                Ok(result) => result.map_err(ServerError::PollFailed),
                Err(e) => {
                    error!(error = %e, "broker poll task panicked");
                    Err(ServerError::PollStopped)
                }
            }
        }
        Some(Ok(Ok(()))) => {
            error!("broker poll returned before shutdown");
            Err(ServerError::PollStopped)
        }
        Some(Ok(Err(e))) => {
            error!(error = %e, "broker poll failed");
            Err(ServerError::PollFailed(e))
        }
        Some(Err(e)) => {
            error!(error = %e, "broker poll task panicked");
            Err(ServerError::PollStopped)
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    settings: Arc<Settings>,
) {
    let mut greeting = true;
    let path = settings.server.path.as_str();
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() != path {
            return Err(not_found());
        }
        greeting = wants_greeting(request.uri().query());
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(remote = %peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let mut session = Session::new(
        Arc::clone(&broker),
        settings.session.idle_timeout(),
        settings.session.queue_capacity,
    );
    if greeting {
        session.greet();
    }
    let handle = session.handle();
    broker.register(handle.clone());
    info!(client = %session.id(), remote = %peer, "client connected");

    let (ws_sender, ws_receiver) = ws_stream.split();
    let end = session.run(ws_sender, ws_receiver).await;

    broker.unregister(&handle);
    if let Some(end) = end {
        info!(client = %handle.id(), remote = %peer, reason = %end, "client disconnected");
    }
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("not found".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Greeting is on unless the query carries `greeting=false` (or `0`/`no`).
pub(crate) fn wants_greeting(query: Option<&str>) -> bool {
    let Some(query) = query else {
        return true;
    };
    !form_urlencoded::parse(query.as_bytes())
        .any(|(key, value)| key == "greeting" && matches!(value.as_ref(), "false" | "0" | "no"))
}
