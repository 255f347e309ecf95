use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use huddle_collab::{Collab, Identity};
use log::{debug, error, info};
use serde::Deserialize;

use crate::{auth::bearer_token, context::ServerContext, errors::ServerError, Router};

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Upgrades to a real-time connection once the handshake token checks out.
/// Refused handshakes get a 401 with the reason code.
async fn gateway(
    State(context): State<ServerContext>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match authenticate(&context, query.token.as_deref(), &headers).await {
        Ok(identity) => identity,
        Err(error) => {
            info!("Refused gateway handshake: {}", error);
            return error.into_response();
        }
    };

    ws.on_upgrade(move |socket| run_connection(context.collab, identity, socket))
}

async fn authenticate(
    context: &ServerContext,
    query_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<Identity, ServerError> {
    let token = match query_token {
        Some(token) => Some(token),
        None => bearer_token(headers)?,
    };

    Ok(context.collab.authenticate(token).await?)
}

/// Pumps events both ways until either side goes away, then runs the disconnect cleanup
async fn run_connection(collab: Arc<Collab>, identity: Identity, socket: WebSocket) {
    let (connection, mut events) = collab.connect(identity);
    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };

                let text = match event.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Could not encode {} event: {}", event.name(), e);
                        continue;
                    }
                };

                if outgoing.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => match message {
                Some(Ok(Message::Text(text))) => collab.handle_text(&connection, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => collab.connections.touch(connection.id),
                Some(Err(e)) => {
                    debug!("Connection {} errored: {}", connection.id, e);
                    break;
                }
            }
        }
    }

    info!(
        "{} closed connection {}",
        connection.identity.display_name, connection.id
    );

    collab.disconnect(connection.id);
}

pub fn router() -> Router {
    Router::new().route("/", get(gateway))
}
