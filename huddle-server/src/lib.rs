use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use huddle_collab::Collab;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod context;
mod docs;
mod errors;
mod gateway;
mod meetings;
mod schemas;
mod serialized;
mod streams;

pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Builds every route, bound to the given collab instance
pub fn app(collab: Arc<Collab>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/gateway", gateway::router())
        .nest("/streams", streams::router())
        .nest(
            "/subscriptions/:subscription_id/meetings",
            meetings::router(),
        );

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(ServerContext { collab })
}

/// Starts the huddle server
pub async fn run_server(collab: Arc<Collab>, port: u16) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, app(collab).into_make_service()).await
}
