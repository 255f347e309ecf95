use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{meetings, schemas, serialized, streams};

#[derive(OpenApi)]
#[openapi(
    paths(
        meetings::create_meeting,
        meetings::list_meetings,
        meetings::meeting,
        meetings::join_meeting,
        meetings::leave_meeting,
        meetings::update_permissions,
        meetings::end_meeting,
        streams::list_streams,
    ),
    components(schemas(
        schemas::NewMeetingSchema,
        schemas::PermissionsSchema,
        schemas::UpdatePermissionsSchema,
        serialized::Meeting,
        serialized::Participant,
        serialized::ParticipantMediaState,
        serialized::Permissions,
        serialized::Stream,
        serialized::StreamMediaState,
        serialized::ErrorBody,
    )),
    modifiers(&Security),
    info(
        description = "huddle-server exposes the live meetings and streams of this huddle instance"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
