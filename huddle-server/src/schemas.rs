use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use huddle_collab::CreateMeeting;
use huddle_core::{AccessType, MediaToggle};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionsSchema {
    pub mic: Option<bool>,
    pub camera: Option<bool>,
    pub screen_share: Option<bool>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_group_access"))]
pub struct NewMeetingSchema {
    /// Generated when left out
    #[validate(length(min = 1, max = 128))]
    pub room_id: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    #[schema(value_type = String, example = "public")]
    pub access_type: AccessType,
    #[serde(default)]
    pub group_ids: Vec<String>,
    pub permissions: Option<PermissionsSchema>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_toggle"))]
pub struct UpdatePermissionsSchema {
    pub mic: Option<bool>,
    pub camera: Option<bool>,
    pub screen_share: Option<bool>,
}

fn validate_group_access(schema: &NewMeetingSchema) -> Result<(), ValidationError> {
    if schema.access_type == AccessType::Group && schema.group_ids.is_empty() {
        return Err(ValidationError::new("group_ids_required"));
    }

    Ok(())
}

fn validate_toggle(schema: &UpdatePermissionsSchema) -> Result<(), ValidationError> {
    if schema.mic.is_none() && schema.camera.is_none() && schema.screen_share.is_none() {
        return Err(ValidationError::new("empty_permissions"));
    }

    Ok(())
}

impl From<PermissionsSchema> for MediaToggle {
    fn from(value: PermissionsSchema) -> Self {
        Self {
            mic: value.mic,
            camera: value.camera,
            screen_share: value.screen_share,
        }
    }
}

impl From<UpdatePermissionsSchema> for MediaToggle {
    fn from(value: UpdatePermissionsSchema) -> Self {
        Self {
            mic: value.mic,
            camera: value.camera,
            screen_share: value.screen_share,
        }
    }
}

impl From<NewMeetingSchema> for CreateMeeting {
    fn from(value: NewMeetingSchema) -> Self {
        Self {
            room_id: value.room_id,
            title: value.title,
            access_type: value.access_type,
            group_ids: value.group_ids,
            permissions: value.permissions.map(Into::into).unwrap_or_default(),
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;

        extracted_json
            .0
            .validate()
            .map_err(|e| ServerError::BadRequest(format!("Request body is invalid: {e}")))?;

        Ok(Self(extracted_json.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group_meetings_need_groups() {
        let schema: NewMeetingSchema =
            serde_json::from_str(r#"{"accessType":"group","groupIds":[]}"#).unwrap();
        assert!(schema.validate().is_err());

        let schema: NewMeetingSchema =
            serde_json::from_str(r#"{"accessType":"group","groupIds":["class-7b"]}"#).unwrap();
        assert!(schema.validate().is_ok());

        let schema: NewMeetingSchema = serde_json::from_str(r#"{"roomId":""}"#).unwrap();
        assert!(schema.validate().is_err(), "an empty room id is not generated");
    }

    #[test]
    fn permission_updates_must_change_something() {
        let schema: UpdatePermissionsSchema = serde_json::from_str("{}").unwrap();
        assert!(schema.validate().is_err());

        let schema: UpdatePermissionsSchema = serde_json::from_str(r#"{"mic":false}"#).unwrap();
        assert!(schema.validate().is_ok());
        assert_eq!(MediaToggle::from(schema).mic, Some(false));
    }
}
