use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RegistryError;

pub type UserId = String;
pub type RoomId = String;
pub type SubscriptionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Describes what differs between two kinds of live session.
///
/// The registry is generic over this, so membership and index
/// bookkeeping is written once for meetings and streams alike.
pub trait SessionKind: Debug + Clone + Send + Sync + 'static {
    /// Per-member state that only exists for this kind
    type Media: Debug + Clone + Default + Send + Sync;

    /// Used in errors and logs
    const NAME: &'static str;

    /// Whether a subscription may own at most one active session of this kind
    const EXCLUSIVE_PER_SUBSCRIPTION: bool;

    /// Runs inside the registry lock, right before a member is added.
    fn admit(session: &Session<Self>, user_id: &str) -> Result<(), RegistryError>;
}

/// A user inside a session
#[derive(Debug, Clone)]
pub struct Member<M> {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub media: M,
    pub joined_at: DateTime<Utc>,
}

impl<M: Default> Member<M> {
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: email.into(),
            media: M::default(),
            joined_at: Utc::now(),
        }
    }
}

/// A live session as stored in a registry.
///
/// Registries hand these out behind an [std::sync::Arc], so a snapshot can be
/// kept around and read freely without ever affecting the registry.
#[derive(Debug, Clone)]
pub struct Session<K: SessionKind> {
    pub room_id: RoomId,
    pub subscription: Option<SubscriptionId>,
    pub host: UserId,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub kind: K,
    pub(crate) members: HashMap<UserId, Member<K::Media>>,
}

/// Everything needed to open a session. The host becomes its first member.
#[derive(Debug, Clone)]
pub struct NewSession<K: SessionKind> {
    pub room_id: RoomId,
    pub subscription: Option<SubscriptionId>,
    pub host: Member<K::Media>,
    pub kind: K,
}

impl<K: SessionKind> Session<K> {
    pub(crate) fn open(new_session: NewSession<K>) -> Self {
        let host_id = new_session.host.user_id.clone();
        let mut members = HashMap::new();
        members.insert(host_id.clone(), new_session.host);

        Self {
            room_id: new_session.room_id,
            subscription: new_session.subscription,
            host: host_id,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            kind: new_session.kind,
            members,
        }
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host == user_id
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains_key(user_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn member(&self, user_id: &str) -> Option<&Member<K::Media>> {
        self.members.get(user_id)
    }

    /// Members ordered by the time they joined, host first
    pub fn members(&self) -> Vec<&Member<K::Media>> {
        let mut members: Vec<_> = self.members.values().collect();
        members.sort_by(|a, b| {
            (a.user_id != self.host, a.joined_at).cmp(&(b.user_id != self.host, b.joined_at))
        });
        members
    }

    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.keys().cloned().collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Public,
    Group,
}

/// Which media non-host participants of a meeting may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPermissions {
    pub mic: bool,
    pub camera: bool,
    pub screen_share: bool,
}

impl Default for MediaPermissions {
    fn default() -> Self {
        Self {
            mic: true,
            camera: true,
            screen_share: true,
        }
    }
}

/// The media a single meeting participant currently has on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMedia {
    pub mic: bool,
    pub camera: bool,
    pub screen_share: bool,
}

/// A partial change to mic/camera/screen-share flags, absent fields are left as they are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaToggle {
    pub mic: Option<bool>,
    pub camera: Option<bool>,
    pub screen_share: Option<bool>,
}

impl MediaToggle {
    pub fn is_empty(&self) -> bool {
        self.mic.is_none() && self.camera.is_none() && self.screen_share.is_none()
    }
}

impl MediaPermissions {
    pub fn apply(&mut self, toggle: MediaToggle) {
        self.mic = toggle.mic.unwrap_or(self.mic);
        self.camera = toggle.camera.unwrap_or(self.camera);
        self.screen_share = toggle.screen_share.unwrap_or(self.screen_share);
    }
}

impl ParticipantMedia {
    pub fn apply(&mut self, toggle: MediaToggle) {
        self.mic = toggle.mic.unwrap_or(self.mic);
        self.camera = toggle.camera.unwrap_or(self.camera);
        self.screen_share = toggle.screen_share.unwrap_or(self.screen_share);
    }

    /// Turns off every medium the permissions don't allow
    pub fn restrict_to(&mut self, permissions: &MediaPermissions) {
        self.mic &= permissions.mic;
        self.camera &= permissions.camera;
        self.screen_share &= permissions.screen_share;
    }

    /// Returns the first medium the toggle turns on that the permissions forbid
    pub fn forbidden_by(toggle: &MediaToggle, permissions: &MediaPermissions) -> Option<&'static str> {
        let wants = |flag: Option<bool>| flag == Some(true);

        if wants(toggle.mic) && !permissions.mic {
            Some("mic")
        } else if wants(toggle.camera) && !permissions.camera {
            Some("camera")
        } else if wants(toggle.screen_share) && !permissions.screen_share {
            Some("screen-share")
        } else {
            None
        }
    }
}

/// A scheduled classroom call, owned by a subscription
#[derive(Debug, Clone)]
pub struct Meeting {
    pub title: String,
    pub access: AccessType,
    /// Groups allowed in when access is [AccessType::Group]
    pub group_ids: Vec<String>,
    pub permissions: MediaPermissions,
}

impl SessionKind for Meeting {
    type Media = ParticipantMedia;

    const NAME: &'static str = "meeting";
    const EXCLUSIVE_PER_SUBSCRIPTION: bool = true;

    fn admit(_session: &Session<Self>, _user_id: &str) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// What a broadcaster is currently sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMedia {
    pub has_video: bool,
    pub has_audio: bool,
    pub has_screen_share: bool,
}

/// A partial change to [StreamMedia]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMediaUpdate {
    pub has_video: Option<bool>,
    pub has_audio: Option<bool>,
    pub has_screen_share: Option<bool>,
}

impl StreamMedia {
    pub fn apply(&mut self, update: StreamMediaUpdate) {
        self.has_video = update.has_video.unwrap_or(self.has_video);
        self.has_audio = update.has_audio.unwrap_or(self.has_audio);
        self.has_screen_share = update.has_screen_share.unwrap_or(self.has_screen_share);
    }
}

/// An ad-hoc one-to-many broadcast with chat
#[derive(Debug, Clone)]
pub struct Stream {
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub chat_enabled: bool,
    pub media: StreamMedia,
    pub max_viewers: usize,
}

impl SessionKind for Stream {
    type Media = ();

    const NAME: &'static str = "stream";
    const EXCLUSIVE_PER_SUBSCRIPTION: bool = false;

    fn admit(session: &Session<Self>, user_id: &str) -> Result<(), RegistryError> {
        // Re-joining only refreshes details, it never takes a new seat
        if session.is_member(user_id) {
            return Ok(());
        }

        if session.viewer_count() >= session.kind.max_viewers {
            return Err(RegistryError::Full {
                room_id: session.room_id.clone(),
                capacity: session.kind.max_viewers,
            });
        }

        Ok(())
    }
}

impl Session<Stream> {
    /// Members other than the host
    pub fn viewer_count(&self) -> usize {
        self.members
            .keys()
            .filter(|id| id.as_str() != self.host)
            .count()
    }
}

pub type MeetingSession = Session<Meeting>;
pub type StreamSession = Session<Stream>;
