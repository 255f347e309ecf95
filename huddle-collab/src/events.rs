use chrono::{DateTime, Utc};
use huddle_core::{
    AccessType, EndCause, MediaPermissions, MediaToggle, MeetingSession, ParticipantMedia, RoomId,
    SessionStatus, StreamMedia, StreamMediaUpdate, StreamSession, SubscriptionId, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CollabError, ConnectionId, ErrorCode};

const MAX_ID_LENGTH: usize = 128;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Events sent by clients over a real-time connection.
///
/// On the wire each event is `{"event": "<name>", "data": <payload>}`,
/// and events without a payload may omit `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    GetActiveStreams,
    StartStream(StartStream),
    JoinStream(RoomId),
    LeaveStream(RoomId),
    EndStream(RoomId),
    UpdateStreamMedia(UpdateStreamMedia),
    StreamMessage(StreamMessage),
    StreamSignal(Signal),
    GetActiveMeetings,
    CreateMeeting(CreateMeeting),
    JoinMeeting(RoomId),
    LeaveMeeting(RoomId),
    EndMeeting(RoomId),
    UpdatePermissions(UpdateMedia),
    UpdateParticipantMedia(UpdateMedia),
    MeetingSignal(Signal),
    /// Answer to a heartbeat ping
    Pong,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStream {
    pub stream_id: RoomId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub chat_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStreamMedia {
    pub stream_id: RoomId,
    #[serde(flatten)]
    pub media: StreamMediaUpdate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub stream_id: RoomId,
    pub message: String,
}

/// An opaque WebRTC negotiation payload, relayed to one user or to a whole room
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    #[serde(alias = "streamId")]
    pub room_id: RoomId,
    pub signal: Value,
    #[serde(default)]
    pub target_user_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeeting {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub access_type: AccessType,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub permissions: MediaToggle,
}

/// Used both for meeting permissions and for a participant's own media flags
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMedia {
    pub room_id: RoomId,
    #[serde(flatten)]
    pub media: MediaToggle,
}

fn default_true() -> bool {
    true
}

fn require_id(field: &str, value: &str) -> Result<(), CollabError> {
    if value.trim().is_empty() {
        return Err(CollabError::Validation(format!("{field} is required")));
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(CollabError::Validation(format!(
            "{field} must be at most {MAX_ID_LENGTH} characters"
        )));
    }

    Ok(())
}

fn require_length(field: &str, value: &str, max: usize) -> Result<(), CollabError> {
    if value.chars().count() > max {
        return Err(CollabError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }

    Ok(())
}

impl ClientEvent {
    /// Parses and validates a raw frame. Nothing past this point sees a malformed payload.
    pub fn decode(text: &str) -> Result<Self, CollabError> {
        let event: Self = serde_json::from_str(text)
            .map_err(|e| CollabError::Validation(format!("Malformed event: {e}")))?;

        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), CollabError> {
        match self {
            Self::GetActiveStreams | Self::GetActiveMeetings | Self::Pong => Ok(()),
            Self::JoinStream(id) | Self::LeaveStream(id) | Self::EndStream(id) => {
                require_id("streamId", id)
            }
            Self::JoinMeeting(id) | Self::LeaveMeeting(id) | Self::EndMeeting(id) => {
                require_id("roomId", id)
            }
            Self::StartStream(start) => {
                require_id("streamId", &start.stream_id)?;

                if start.title.trim().is_empty() {
                    return Err(CollabError::Validation("title is required".to_string()));
                }

                require_length("title", &start.title, MAX_TITLE_LENGTH)?;
                require_length(
                    "description",
                    start.description.as_deref().unwrap_or_default(),
                    MAX_DESCRIPTION_LENGTH,
                )
            }
            Self::UpdateStreamMedia(update) => require_id("streamId", &update.stream_id),
            Self::StreamMessage(message) => require_id("streamId", &message.stream_id),
            Self::StreamSignal(signal) | Self::MeetingSignal(signal) => {
                require_id("roomId", &signal.room_id)?;

                if let Some(target) = &signal.target_user_id {
                    require_id("targetUserId", target)?;
                }

                Ok(())
            }
            Self::CreateMeeting(create) => create.validate(),
            Self::UpdatePermissions(update) | Self::UpdateParticipantMedia(update) => {
                require_id("roomId", &update.room_id)?;

                if update.media.is_empty() {
                    return Err(CollabError::Validation(
                        "at least one of mic, camera or screenShare is required".to_string(),
                    ));
                }

                Ok(())
            }
        }
    }
}

impl CreateMeeting {
    pub fn validate(&self) -> Result<(), CollabError> {
        if let Some(room_id) = &self.room_id {
            require_id("roomId", room_id)?;
        }

        require_length(
            "title",
            self.title.as_deref().unwrap_or_default(),
            MAX_TITLE_LENGTH,
        )?;

        if self.access_type == AccessType::Group && self.group_ids.is_empty() {
            return Err(CollabError::Validation(
                "group meetings need at least one group id".to_string(),
            ));
        }

        Ok(())
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    HostEnded,
    HostLeft,
    HostDisconnected,
    Empty,
}

impl EndReason {
    /// The reason for a session ended by someone leaving
    pub fn from_cause(cause: EndCause, disconnected: bool) -> Self {
        match cause {
            EndCause::HostLeft if disconnected => Self::HostDisconnected,
            EndCause::HostLeft => Self::HostLeft,
            EndCause::Empty => Self::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamView {
    pub stream_id: RoomId,
    pub host_id: UserId,
    pub host_name: String,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub chat_enabled: bool,
    pub media: StreamMedia,
    pub viewer_count: usize,
    pub max_viewers: usize,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

impl From<&StreamSession> for StreamView {
    fn from(value: &StreamSession) -> Self {
        Self {
            stream_id: value.room_id.clone(),
            host_id: value.host.clone(),
            host_name: value
                .member(&value.host)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            title: value.kind.title.clone(),
            description: value.kind.description.clone(),
            is_public: value.kind.is_public,
            chat_enabled: value.kind.chat_enabled,
            media: value.kind.media,
            viewer_count: value.viewer_count(),
            max_viewers: value.kind.max_viewers,
            status: value.status,
            started_at: value.started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub is_host: bool,
    pub media: ParticipantMedia,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingView {
    pub room_id: RoomId,
    pub subscription_id: Option<SubscriptionId>,
    pub host_id: UserId,
    pub title: String,
    pub access_type: AccessType,
    pub group_ids: Vec<String>,
    pub permissions: MediaPermissions,
    pub participants: Vec<ParticipantView>,
    pub participant_count: usize,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&MeetingSession> for MeetingView {
    fn from(value: &MeetingSession) -> Self {
        let participants = value
            .members()
            .into_iter()
            .map(|m| ParticipantView {
                user_id: m.user_id.clone(),
                name: m.name.clone(),
                email: m.email.clone(),
                is_host: value.is_host(&m.user_id),
                media: m.media,
            })
            .collect();

        Self {
            room_id: value.room_id.clone(),
            subscription_id: value.subscription.clone(),
            host_id: value.host.clone(),
            title: value.kind.title.clone(),
            access_type: value.kind.access,
            group_ids: value.kind.group_ids.clone(),
            permissions: value.kind.permissions,
            participants,
            participant_count: value.member_count(),
            status: value.status,
            started_at: value.started_at,
            ended_at: value.ended_at,
        }
    }
}

/// Events sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    ConnectionConfirmed {
        connection_id: ConnectionId,
        user_id: UserId,
        display_name: String,
    },
    ActiveStreams(Vec<StreamView>),
    StreamStarted(StreamView),
    NewStreamAvailable(StreamView),
    StreamJoined(StreamView),
    ViewerJoined {
        stream_id: RoomId,
        user_id: UserId,
        name: String,
        viewer_count: usize,
    },
    ViewerLeft {
        stream_id: RoomId,
        user_id: UserId,
        viewer_count: usize,
    },
    StreamEnded {
        stream_id: RoomId,
        reason: EndReason,
    },
    StreamMediaUpdated {
        stream_id: RoomId,
        media: StreamMedia,
    },
    StreamMessageReceived {
        stream_id: RoomId,
        user_id: UserId,
        user_name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    StreamSignal {
        stream_id: RoomId,
        from_user_id: UserId,
        signal: Value,
    },
    ActiveMeetings(Vec<MeetingView>),
    MeetingCreated(MeetingView),
    MeetingJoined(MeetingView),
    ParticipantJoined {
        room_id: RoomId,
        participant: ParticipantView,
        participant_count: usize,
    },
    ParticipantLeft {
        room_id: RoomId,
        user_id: UserId,
        participant_count: usize,
    },
    MeetingEnded {
        room_id: RoomId,
        reason: EndReason,
    },
    PermissionsUpdated {
        room_id: RoomId,
        permissions: MediaPermissions,
        participants: Vec<ParticipantView>,
    },
    ParticipantMediaUpdated {
        room_id: RoomId,
        user_id: UserId,
        media: ParticipantMedia,
    },
    MeetingSignal {
        room_id: RoomId,
        from_user_id: UserId,
        signal: Value,
    },
    Ping {
        timestamp: DateTime<Utc>,
    },
    Error {
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after: Option<u64>,
    },
}

impl ServerEvent {
    /// The wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionConfirmed { .. } => "connectionConfirmed",
            Self::ActiveStreams(_) => "activeStreams",
            Self::StreamStarted(_) => "streamStarted",
            Self::NewStreamAvailable(_) => "newStreamAvailable",
            Self::StreamJoined(_) => "streamJoined",
            Self::ViewerJoined { .. } => "viewerJoined",
            Self::ViewerLeft { .. } => "viewerLeft",
            Self::StreamEnded { .. } => "streamEnded",
            Self::StreamMediaUpdated { .. } => "streamMediaUpdated",
            Self::StreamMessageReceived { .. } => "streamMessageReceived",
            Self::StreamSignal { .. } => "streamSignal",
            Self::ActiveMeetings(_) => "activeMeetings",
            Self::MeetingCreated(_) => "meetingCreated",
            Self::MeetingJoined(_) => "meetingJoined",
            Self::ParticipantJoined { .. } => "participantJoined",
            Self::ParticipantLeft { .. } => "participantLeft",
            Self::MeetingEnded { .. } => "meetingEnded",
            Self::PermissionsUpdated { .. } => "permissionsUpdated",
            Self::ParticipantMediaUpdated { .. } => "participantMediaUpdated",
            Self::MeetingSignal { .. } => "meetingSignal",
            Self::Ping { .. } => "ping",
            Self::Error { .. } => "error",
        }
    }

    /// Serializes the event into a text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_tagged_events() {
        let event = ClientEvent::decode(r#"{"event":"getActiveStreams"}"#).unwrap();
        assert!(matches!(event, ClientEvent::GetActiveStreams));

        let event = ClientEvent::decode(r#"{"event":"joinStream","data":"live-1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::JoinStream(id) if id == "live-1"));

        let event = ClientEvent::decode(
            r#"{"event":"startStream","data":{"streamId":"live-1","title":"Office hours"}}"#,
        )
        .unwrap();

        let ClientEvent::StartStream(start) = event else {
            panic!("expected startStream");
        };

        assert!(start.is_public, "streams are public unless stated otherwise");
        assert!(start.chat_enabled);

        let event = ClientEvent::decode(
            r#"{"event":"updateStreamMedia","data":{"streamId":"live-1","hasVideo":true}}"#,
        )
        .unwrap();

        let ClientEvent::UpdateStreamMedia(update) = event else {
            panic!("expected updateStreamMedia");
        };

        assert_eq!(update.media.has_video, Some(true));
        assert_eq!(update.media.has_audio, None);

        let event = ClientEvent::decode(
            r#"{"event":"streamSignal","data":{"streamId":"live-1","signal":{"sdp":"x"},"targetUserId":"bob"}}"#,
        )
        .unwrap();

        assert!(matches!(event, ClientEvent::StreamSignal(s) if s.room_id == "live-1"));
    }

    #[test]
    fn rejects_malformed_payloads() {
        let code = |text: &str| ClientEvent::decode(text).unwrap_err().code();

        assert_eq!(code(r#"{"event":"danceParty"}"#), ErrorCode::ValidationError);
        assert_eq!(code(r#"{"event":"joinStream","data":""}"#), ErrorCode::ValidationError);
        assert_eq!(
            code(r#"{"event":"startStream","data":{"streamId":"live-1"}}"#),
            ErrorCode::ValidationError
        );
        assert_eq!(
            code(r#"{"event":"startStream","data":{"streamId":"live-1","title":"  "}}"#),
            ErrorCode::ValidationError
        );
        assert_eq!(
            code(r#"{"event":"updatePermissions","data":{"roomId":"room-a"}}"#),
            ErrorCode::ValidationError
        );
        assert_eq!(
            code(r#"{"event":"createMeeting","data":{"accessType":"group"}}"#),
            ErrorCode::ValidationError
        );
        assert_eq!(code("not json"), ErrorCode::ValidationError);
    }

    #[test]
    fn encodes_with_event_names() {
        let event = ServerEvent::StreamEnded {
            stream_id: "live-2".to_string(),
            reason: EndReason::HostDisconnected,
        };

        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();

        assert_eq!(value["event"], "streamEnded");
        assert_eq!(value["data"]["streamId"], "live-2");
        assert_eq!(value["data"]["reason"], "host-disconnected");
        assert_eq!(event.name(), "streamEnded");

        let error = ServerEvent::Error {
            code: ErrorCode::Cooldown,
            message: "wait".to_string(),
            retry_after: Some(12),
        };

        let value: Value = serde_json::from_str(&error.encode().unwrap()).unwrap();
        assert_eq!(value["data"]["code"], "COOLDOWN");
        assert_eq!(value["data"]["retryAfter"], 12);
    }
}
