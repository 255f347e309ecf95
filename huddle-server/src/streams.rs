use axum::{extract::State, routing::get, Json};

use crate::{
    auth::Caller,
    context::ServerContext,
    serialized::{Stream, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/streams",
    tag = "streams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Stream>, description = "Public live streams, newest first")
    )
)]
async fn list_streams(_caller: Caller, State(context): State<ServerContext>) -> Json<Vec<Stream>> {
    Json(context.collab.active_streams().to_serialized())
}

pub fn router() -> Router {
    Router::new().route("/", get(list_streams))
}
