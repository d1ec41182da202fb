use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::accept_hdr_async_with_config;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::WebSocketConfig;

use crate::config::HubSettings;
use crate::connection::{Connection, PumpSettings, read_pump, write_pump};
use crate::hub::Hub;
use crate::transport::message::SubscriptionRequest;
use crate::utils::shutdown;

/// Bind `addr` and serve viewer subscriptions until shutdown.
pub async fn start_websocket_server(
    addr: &str,
    hub: Arc<Hub>,
    settings: HubSettings,
    shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    serve(listener, hub, settings, shutdown_rx).await;
    Ok(())
}

/// Accept loop over an already bound listener.
///
/// Each accepted socket gets its own task; a failed accept is logged and the
/// loop keeps going.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<Hub>,
    settings: HubSettings,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown::signalled(&mut shutdown_rx) => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(handle_socket(stream, peer, hub.clone(), settings.clone()));
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
    info!("WebSocket server stopped accepting");
}

async fn handle_socket(stream: TcpStream, peer: SocketAddr, hub: Arc<Hub>, settings: HubSettings) {
    let mut subscription = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        match SubscriptionRequest::from_uri(req.uri()) {
            Ok(parsed) => {
                subscription = Some(parsed);
                Ok(resp)
            }
            Err(e) => {
                debug!(%peer, uri = %req.uri(), error = %e, "rejecting subscription");
                let mut rejection = ErrorResponse::new(Some(e.to_string()));
                *rejection.status_mut() = StatusCode::BAD_REQUEST;
                Err(rejection)
            }
        }
    };

    let config = WebSocketConfig::default()
        .max_message_size(Some(settings.max_message_size))
        .max_frame_size(Some(settings.max_message_size));

    let ws_stream = match accept_hdr_async_with_config(stream, callback, Some(config)).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let Some(request) = subscription else {
        return;
    };

    let (conn, queue) = Connection::new(request.match_id, request.viewer, settings.queue_capacity);
    if !hub.register(conn.clone()) {
        return;
    }

    let pump = PumpSettings::from(&settings);
    let (sink, stream) = ws_stream.split();
    tokio::spawn(write_pump(hub.clone(), conn.clone(), queue, sink, pump.clone()));
    read_pump(hub, conn, stream, pump).await;
}
