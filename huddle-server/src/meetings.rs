use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json,
};

use crate::{
    auth::Caller,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewMeetingSchema, UpdatePermissionsSchema, ValidatedJson},
    serialized::{ErrorBody, Meeting, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{subscription_id}/meetings",
    tag = "meetings",
    request_body = NewMeetingSchema,
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Meeting),
        (status = 409, body = ErrorBody, description = "The subscription already has an active meeting")
    )
)]
async fn create_meeting(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path(subscription_id): Path<String>,
    ValidatedJson(body): ValidatedJson<NewMeetingSchema>,
) -> ServerResult<(StatusCode, Json<Meeting>)> {
    let meeting = context
        .collab
        .create_meeting(&identity, &subscription_id, body.into())?;

    Ok((StatusCode::CREATED, Json(meeting.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/v1/subscriptions/{subscription_id}/meetings",
    tag = "meetings",
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Meeting>)
    )
)]
async fn list_meetings(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path(subscription_id): Path<String>,
) -> ServerResult<Json<Vec<Meeting>>> {
    let meetings = context.collab.list_meetings(&identity, &subscription_id)?;

    Ok(Json(meetings.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/subscriptions/{subscription_id}/meetings/{room_id}",
    tag = "meetings",
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings"),
        ("room_id" = String, Path, description = "The meeting's room id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Meeting),
        (status = 404, body = ErrorBody)
    )
)]
async fn meeting(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path((subscription_id, room_id)): Path<(String, String)>,
) -> ServerResult<Json<Meeting>> {
    let meeting = context
        .collab
        .get_meeting(&identity, &subscription_id, &room_id)?;

    Ok(Json(meeting.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{subscription_id}/meetings/{room_id}/join",
    tag = "meetings",
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings"),
        ("room_id" = String, Path, description = "The meeting's room id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Meeting),
        (status = 403, body = ErrorBody, description = "The meeting is limited to other groups")
    )
)]
async fn join_meeting(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path((subscription_id, room_id)): Path<(String, String)>,
) -> ServerResult<Json<Meeting>> {
    let meeting = context
        .collab
        .join_meeting(&identity, &room_id, Some(&subscription_id))?;

    Ok(Json(meeting.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{subscription_id}/meetings/{room_id}/leave",
    tag = "meetings",
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings"),
        ("room_id" = String, Path, description = "The meeting's room id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 204, description = "Left the meeting, ending it when the caller was the host"),
        (status = 404, body = ErrorBody)
    )
)]
async fn leave_meeting(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path((subscription_id, room_id)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .leave_meeting(&identity, &room_id, Some(&subscription_id))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/v1/subscriptions/{subscription_id}/meetings/{room_id}/permissions",
    tag = "meetings",
    request_body = UpdatePermissionsSchema,
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings"),
        ("room_id" = String, Path, description = "The meeting's room id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Meeting),
        (status = 403, body = ErrorBody)
    )
)]
async fn update_permissions(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path((subscription_id, room_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<UpdatePermissionsSchema>,
) -> ServerResult<Json<Meeting>> {
    let meeting = context.collab.update_permissions(
        &identity,
        &room_id,
        body.into(),
        Some(&subscription_id),
    )?;

    Ok(Json(meeting.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/subscriptions/{subscription_id}/meetings/{room_id}",
    tag = "meetings",
    params(
        ("subscription_id" = String, Path, description = "The subscription owning the meetings"),
        ("room_id" = String, Path, description = "The meeting's room id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Meeting, description = "The meeting as it was when it ended"),
        (status = 403, body = ErrorBody)
    )
)]
async fn end_meeting(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path((subscription_id, room_id)): Path<(String, String)>,
) -> ServerResult<Json<Meeting>> {
    let meeting = context
        .collab
        .end_meeting(&identity, &room_id, Some(&subscription_id))?;

    Ok(Json(meeting.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_meeting).get(list_meetings))
        .route("/:room_id", get(meeting).delete(end_meeting))
        .route("/:room_id/join", post(join_meeting))
        .route("/:room_id/leave", post(leave_meeting))
        .route("/:room_id/permissions", put(update_permissions))
}
