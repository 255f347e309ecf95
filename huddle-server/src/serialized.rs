//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, Utc};
use huddle_collab::{ErrorCode, MeetingView, ParticipantView, StreamView};
use huddle_core::{MediaPermissions, MeetingSession, ParticipantMedia, StreamMedia};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    mic: bool,
    camera: bool,
    screen_share: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMediaState {
    mic: bool,
    camera: bool,
    screen_share: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    user_id: String,
    name: String,
    email: String,
    is_host: bool,
    media: ParticipantMediaState,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    room_id: String,
    subscription_id: Option<String>,
    host_id: String,
    title: String,
    /// Either `public` or `group`
    access_type: String,
    group_ids: Vec<String>,
    permissions: Permissions,
    participants: Vec<Participant>,
    participant_count: usize,
    /// Either `active` or `ended`
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamMediaState {
    has_video: bool,
    has_audio: bool,
    has_screen_share: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    stream_id: String,
    host_id: String,
    host_name: String,
    title: String,
    description: Option<String>,
    is_public: bool,
    chat_enabled: bool,
    media: StreamMediaState,
    /// Viewers currently watching, the host is not counted
    viewer_count: usize,
    max_viewers: usize,
    started_at: DateTime<Utc>,
}

/// The body of every failed request
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[schema(value_type = String, example = "NOT_FOUND")]
    pub code: ErrorCode,
    pub message: String,
    /// Seconds to wait before retrying, only set for `COOLDOWN`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

/// Lowercase wire name of a unit enum, as serde would write it
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

impl ToSerialized<Permissions> for MediaPermissions {
    fn to_serialized(&self) -> Permissions {
        Permissions {
            mic: self.mic,
            camera: self.camera,
            screen_share: self.screen_share,
        }
    }
}

impl ToSerialized<ParticipantMediaState> for ParticipantMedia {
    fn to_serialized(&self) -> ParticipantMediaState {
        ParticipantMediaState {
            mic: self.mic,
            camera: self.camera,
            screen_share: self.screen_share,
        }
    }
}

impl ToSerialized<Participant> for ParticipantView {
    fn to_serialized(&self) -> Participant {
        Participant {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            is_host: self.is_host,
            media: self.media.to_serialized(),
        }
    }
}

impl ToSerialized<Meeting> for MeetingView {
    fn to_serialized(&self) -> Meeting {
        Meeting {
            room_id: self.room_id.clone(),
            subscription_id: self.subscription_id.clone(),
            host_id: self.host_id.clone(),
            title: self.title.clone(),
            access_type: wire_name(&self.access_type),
            group_ids: self.group_ids.clone(),
            permissions: self.permissions.to_serialized(),
            participants: self.participants.to_serialized(),
            participant_count: self.participant_count,
            status: wire_name(&self.status),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

impl ToSerialized<Meeting> for MeetingSession {
    fn to_serialized(&self) -> Meeting {
        MeetingView::from(self).to_serialized()
    }
}

impl ToSerialized<StreamMediaState> for StreamMedia {
    fn to_serialized(&self) -> StreamMediaState {
        StreamMediaState {
            has_video: self.has_video,
            has_audio: self.has_audio,
            has_screen_share: self.has_screen_share,
        }
    }
}

impl ToSerialized<Stream> for StreamView {
    fn to_serialized(&self) -> Stream {
        Stream {
            stream_id: self.stream_id.clone(),
            host_id: self.host_id.clone(),
            host_name: self.host_name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            is_public: self.is_public,
            chat_enabled: self.chat_enabled,
            media: self.media.to_serialized(),
            viewer_count: self.viewer_count,
            max_viewers: self.max_viewers,
            started_at: self.started_at,
        }
    }
}
